//! Message type registries for both directions of the wire.
//!
//! The producer and consumer speak through the same envelope format
//! but with independent 16-bit type spaces:
//!
//! - `0x00xx` — client-originated input and control events
//! - `0x01xx` — server-originated drawing and update orders
//!
//! Discriminants are stable wire values; never renumber.

use crate::error::WireError;

// ── Client-originated events ─────────────────────────────────────

/// Input and control events sent by the protocol service to the
/// display side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventType {
    /// Lock-key state synchronization (caps/num/scroll/kana).
    Synchronize = 0x0001,
    /// Keyboard scancode press or release.
    Scancode = 0x0002,
    /// Virtual-key keyboard event.
    VirtualKey = 0x0003,
    /// Unicode character keyboard event.
    Unicode = 0x0004,
    /// Pointer motion, buttons, and wheel.
    Mouse = 0x0005,
    /// Extended pointer buttons (4/5).
    ExtendedMouse = 0x0006,
    /// Desktop geometry and color depth announcement.
    Capabilities = 0x0007,
    /// Request to repaint a set of screen rectangles.
    RefreshRect = 0x0008,
}

impl TryFrom<u16> for EventType {
    type Error = WireError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(EventType::Synchronize),
            0x0002 => Ok(EventType::Scancode),
            0x0003 => Ok(EventType::VirtualKey),
            0x0004 => Ok(EventType::Unicode),
            0x0005 => Ok(EventType::Mouse),
            0x0006 => Ok(EventType::ExtendedMouse),
            0x0007 => Ok(EventType::Capabilities),
            0x0008 => Ok(EventType::RefreshRect),
            other => Err(WireError::UnknownVariant {
                type_name: "EventType",
                value: other as u64,
            }),
        }
    }
}

impl From<EventType> for u16 {
    fn from(value: EventType) -> Self {
        value as u16
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ── Server-originated orders ─────────────────────────────────────

/// Drawing and update orders sent by the display side to the
/// protocol service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OrderType {
    // Batch brackets
    /// Opens an update batch. Empty body.
    BeginUpdate = 0x0101,
    /// Closes an update batch. Empty body.
    EndUpdate = 0x0102,

    // Primitive drawing orders
    /// Solid color rectangle fill.
    OpaqueRect = 0x0103,
    /// Screen-to-screen copy.
    ScreenBlt = 0x0104,
    /// Pattern fill with a raster operation.
    PatBlt = 0x0105,
    /// Destination-only raster operation.
    DstBlt = 0x0106,
    /// Bitmap paint, inline or from the shared framebuffer.
    PaintRect = 0x0107,
    /// Clipping region update (nullable).
    SetClip = 0x0108,
    /// Pen line between two points.
    LineTo = 0x0109,
    /// Pointer shape change.
    SetPointer = 0x010A,

    // Offscreen surface management
    CreateOffscreenSurface = 0x010B,
    SwitchOffscreenSurface = 0x010C,
    DeleteOffscreenSurface = 0x010D,
    PaintOffscreenSurface = 0x010E,

    // Window compositing
    /// Creates or updates a composited window.
    WindowNewUpdate = 0x010F,
    WindowDelete = 0x0110,

    // Session plumbing
    /// One-time shared framebuffer attachment notice.
    AttachFramebuffer = 0x0111,
}

impl TryFrom<u16> for OrderType {
    type Error = WireError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0101 => Ok(OrderType::BeginUpdate),
            0x0102 => Ok(OrderType::EndUpdate),
            0x0103 => Ok(OrderType::OpaqueRect),
            0x0104 => Ok(OrderType::ScreenBlt),
            0x0105 => Ok(OrderType::PatBlt),
            0x0106 => Ok(OrderType::DstBlt),
            0x0107 => Ok(OrderType::PaintRect),
            0x0108 => Ok(OrderType::SetClip),
            0x0109 => Ok(OrderType::LineTo),
            0x010A => Ok(OrderType::SetPointer),
            0x010B => Ok(OrderType::CreateOffscreenSurface),
            0x010C => Ok(OrderType::SwitchOffscreenSurface),
            0x010D => Ok(OrderType::DeleteOffscreenSurface),
            0x010E => Ok(OrderType::PaintOffscreenSurface),
            0x010F => Ok(OrderType::WindowNewUpdate),
            0x0110 => Ok(OrderType::WindowDelete),
            0x0111 => Ok(OrderType::AttachFramebuffer),
            other => Err(WireError::UnknownVariant {
                type_name: "OrderType",
                value: other as u64,
            }),
        }
    }
}

impl From<OrderType> for u16 {
    fn from(value: OrderType) -> Self {
        value as u16
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_EVENTS: [EventType; 8] = [
        EventType::Synchronize,
        EventType::Scancode,
        EventType::VirtualKey,
        EventType::Unicode,
        EventType::Mouse,
        EventType::ExtendedMouse,
        EventType::Capabilities,
        EventType::RefreshRect,
    ];

    const ALL_ORDERS: [OrderType; 17] = [
        OrderType::BeginUpdate,
        OrderType::EndUpdate,
        OrderType::OpaqueRect,
        OrderType::ScreenBlt,
        OrderType::PatBlt,
        OrderType::DstBlt,
        OrderType::PaintRect,
        OrderType::SetClip,
        OrderType::LineTo,
        OrderType::SetPointer,
        OrderType::CreateOffscreenSurface,
        OrderType::SwitchOffscreenSurface,
        OrderType::DeleteOffscreenSurface,
        OrderType::PaintOffscreenSurface,
        OrderType::WindowNewUpdate,
        OrderType::WindowDelete,
        OrderType::AttachFramebuffer,
    ];

    #[test]
    fn event_discriminant_roundtrip() {
        for event in ALL_EVENTS {
            let wire: u16 = event.into();
            assert_eq!(EventType::try_from(wire).unwrap(), event);
        }
    }

    #[test]
    fn order_discriminant_roundtrip() {
        for order in ALL_ORDERS {
            let wire: u16 = order.into();
            assert_eq!(OrderType::try_from(wire).unwrap(), order);
        }
    }

    #[test]
    fn unknown_discriminants_rejected() {
        let err = EventType::try_from(0x00FF).unwrap_err();
        assert!(matches!(
            err,
            WireError::UnknownVariant {
                type_name: "EventType",
                value: 0xFF
            }
        ));
        assert!(OrderType::try_from(0x0200).is_err());
        assert!(OrderType::try_from(0x0000).is_err());
    }

    #[test]
    fn type_spaces_do_not_overlap() {
        for event in ALL_EVENTS {
            assert!(u16::from(event) < 0x0100);
        }
        for order in ALL_ORDERS {
            assert!((0x0100..0x0200).contains(&u16::from(order)));
        }
    }
}
