//! Client-originated input and control events.
//!
//! These travel from the protocol service to the display side:
//! keyboard and pointer input injected into the session, plus the
//! control events that drive geometry (capabilities) and repaints
//! (refresh requests).
//!
//! Flag constants use the protocol's standard bit values; pointer
//! wheel events carry a 9-bit signed rotation in the low bits of the
//! flags field.

use bitflags::bitflags;
use serde::Serialize;

use crate::buffer::{WireBuffer, WireReader};
use crate::error::WireError;
use crate::message::EventType;
use crate::protocol::EdgeRect;

// ── Flag sets ────────────────────────────────────────────────────

bitflags! {
    /// Lock-key state carried by a synchronize event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct SyncFlags: u32 {
        const SCROLL_LOCK = 0x0001;
        const NUM_LOCK    = 0x0002;
        const CAPS_LOCK   = 0x0004;
        const KANA_LOCK   = 0x0008;
    }
}

bitflags! {
    /// Keyboard event flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct KeyboardFlags: u32 {
        /// Extended scancode (0xE0 prefix).
        const EXTENDED  = 0x0100;
        /// Second extension prefix (0xE1, pause key).
        const EXTENDED1 = 0x0200;
        const DOWN      = 0x4000;
        const RELEASE   = 0x8000;
    }
}

bitflags! {
    /// Pointer event flags. The low 9 bits double as the signed wheel
    /// rotation when `WHEEL` or `HWHEEL` is set; [`MouseEvent::wheel_rotation`]
    /// extracts it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct PointerFlags: u32 {
        const WHEEL_NEGATIVE = 0x0100;
        const WHEEL          = 0x0200;
        const HWHEEL         = 0x0400;
        const MOVE           = 0x0800;
        const BUTTON1        = 0x1000;
        const BUTTON2        = 0x2000;
        const BUTTON3        = 0x4000;
        const DOWN           = 0x8000;
    }
}

bitflags! {
    /// Extended pointer (button 4/5) event flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct ExtendedPointerFlags: u32 {
        const BUTTON1 = 0x0001;
        const BUTTON2 = 0x0002;
        const DOWN    = 0x8000;
    }
}

// ── Event records ────────────────────────────────────────────────

/// Lock-key synchronization. Body: `u32 flags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SynchronizeEvent {
    pub flags: SyncFlags,
}

impl SynchronizeEvent {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.flags.bits());
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            flags: SyncFlags::from_bits_retain(rd.read_u32()?),
        })
    }
}

/// Scancode keyboard event. Body: `u32 flags | u32 code | u32 keyboard_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScancodeEvent {
    pub flags: KeyboardFlags,
    pub code: u32,
    pub keyboard_type: u32,
}

impl ScancodeEvent {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.flags.bits());
        buf.write_u32(self.code);
        buf.write_u32(self.keyboard_type);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            flags: KeyboardFlags::from_bits_retain(rd.read_u32()?),
            code: rd.read_u32()?,
            keyboard_type: rd.read_u32()?,
        })
    }
}

/// Virtual-key keyboard event. Body: `u32 flags | u32 code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VirtualKeyEvent {
    pub flags: KeyboardFlags,
    pub code: u32,
}

impl VirtualKeyEvent {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.flags.bits());
        buf.write_u32(self.code);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            flags: KeyboardFlags::from_bits_retain(rd.read_u32()?),
            code: rd.read_u32()?,
        })
    }
}

/// Unicode keyboard event. Body: `u32 flags | u32 code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnicodeEvent {
    pub flags: KeyboardFlags,
    pub code: u32,
}

impl UnicodeEvent {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.flags.bits());
        buf.write_u32(self.code);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            flags: KeyboardFlags::from_bits_retain(rd.read_u32()?),
            code: rd.read_u32()?,
        })
    }
}

/// Pointer event. Body: `u32 flags | u16 x | u16 y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MouseEvent {
    pub flags: PointerFlags,
    pub x: u16,
    pub y: u16,
}

impl MouseEvent {
    /// Signed wheel rotation from the low 9 bits of the flags field.
    pub fn wheel_rotation(&self) -> i16 {
        let bits = (self.flags.bits() & 0x01FF) as u16;
        if bits & 0x0100 != 0 {
            (bits | 0xFE00) as i16
        } else {
            bits as i16
        }
    }

    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.flags.bits());
        buf.write_u16(self.x);
        buf.write_u16(self.y);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            flags: PointerFlags::from_bits_retain(rd.read_u32()?),
            x: rd.read_u16()?,
            y: rd.read_u16()?,
        })
    }
}

/// Extended pointer event (buttons 4/5). Body: `u32 flags | u16 x | u16 y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtendedMouseEvent {
    pub flags: ExtendedPointerFlags,
    pub x: u16,
    pub y: u16,
}

impl ExtendedMouseEvent {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.flags.bits());
        buf.write_u16(self.x);
        buf.write_u16(self.y);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            flags: ExtendedPointerFlags::from_bits_retain(rd.read_u32()?),
            x: rd.read_u16()?,
            y: rd.read_u16()?,
        })
    }
}

/// Desktop geometry announcement. Body: `u32 width | u32 height | u32 depth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilitiesEvent {
    pub desktop_width: u32,
    pub desktop_height: u32,
    pub color_depth: u32,
}

impl CapabilitiesEvent {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.desktop_width);
        buf.write_u32(self.desktop_height);
        buf.write_u32(self.color_depth);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            desktop_width: rd.read_u32()?,
            desktop_height: rd.read_u32()?,
            color_depth: rd.read_u32()?,
        })
    }
}

/// Repaint request for a set of screen areas.
/// Body: `u16 count | count × EdgeRect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshRectEvent {
    pub areas: Vec<EdgeRect>,
}

impl RefreshRectEvent {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) -> Result<(), WireError> {
        if self.areas.len() > u16::MAX as usize {
            return Err(WireError::Encoding(format!(
                "refresh rect count {} exceeds u16",
                self.areas.len()
            )));
        }
        buf.write_u16(self.areas.len() as u16);
        for area in &self.areas {
            area.encode(buf);
        }
        Ok(())
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        let count = rd.read_u16()?;
        let mut areas = Vec::with_capacity(count as usize);
        for _ in 0..count {
            areas.push(EdgeRect::decode(rd)?);
        }
        Ok(Self { areas })
    }
}

// ── Tagged sum ───────────────────────────────────────────────────

/// One decoded client-originated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InputEvent {
    Synchronize(SynchronizeEvent),
    Scancode(ScancodeEvent),
    VirtualKey(VirtualKeyEvent),
    Unicode(UnicodeEvent),
    Mouse(MouseEvent),
    ExtendedMouse(ExtendedMouseEvent),
    Capabilities(CapabilitiesEvent),
    RefreshRect(RefreshRectEvent),
}

impl InputEvent {
    /// Wire discriminant for this event.
    pub fn event_type(&self) -> EventType {
        match self {
            InputEvent::Synchronize(_) => EventType::Synchronize,
            InputEvent::Scancode(_) => EventType::Scancode,
            InputEvent::VirtualKey(_) => EventType::VirtualKey,
            InputEvent::Unicode(_) => EventType::Unicode,
            InputEvent::Mouse(_) => EventType::Mouse,
            InputEvent::ExtendedMouse(_) => EventType::ExtendedMouse,
            InputEvent::Capabilities(_) => EventType::Capabilities,
            InputEvent::RefreshRect(_) => EventType::RefreshRect,
        }
    }

    /// Decodes the body of a sub-message already routed by type.
    pub fn decode(kind: EventType, rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(match kind {
            EventType::Synchronize => InputEvent::Synchronize(SynchronizeEvent::decode(rd)?),
            EventType::Scancode => InputEvent::Scancode(ScancodeEvent::decode(rd)?),
            EventType::VirtualKey => InputEvent::VirtualKey(VirtualKeyEvent::decode(rd)?),
            EventType::Unicode => InputEvent::Unicode(UnicodeEvent::decode(rd)?),
            EventType::Mouse => InputEvent::Mouse(MouseEvent::decode(rd)?),
            EventType::ExtendedMouse => InputEvent::ExtendedMouse(ExtendedMouseEvent::decode(rd)?),
            EventType::Capabilities => InputEvent::Capabilities(CapabilitiesEvent::decode(rd)?),
            EventType::RefreshRect => InputEvent::RefreshRect(RefreshRectEvent::decode(rd)?),
        })
    }

    /// Writes the body fields (no sub-message header).
    pub fn encode_body(&self, buf: &mut WireBuffer) -> Result<(), WireError> {
        match self {
            InputEvent::Synchronize(e) => e.encode(buf),
            InputEvent::Scancode(e) => e.encode(buf),
            InputEvent::VirtualKey(e) => e.encode(buf),
            InputEvent::Unicode(e) => e.encode(buf),
            InputEvent::Mouse(e) => e.encode(buf),
            InputEvent::ExtendedMouse(e) => e.encode(buf),
            InputEvent::Capabilities(e) => e.encode(buf),
            InputEvent::RefreshRect(e) => return e.encode(buf),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(event: InputEvent) -> InputEvent {
        let mut buf = WireBuffer::with_capacity(64);
        event.encode_body(&mut buf).unwrap();
        let mut rd = WireReader::new(buf.as_slice());
        let decoded = InputEvent::decode(event.event_type(), &mut rd).unwrap();
        assert_eq!(rd.remaining(), 0, "body not fully consumed");
        decoded
    }

    #[test]
    fn scancode_roundtrip() {
        let event = InputEvent::Scancode(ScancodeEvent {
            flags: KeyboardFlags::DOWN | KeyboardFlags::EXTENDED,
            code: 0x1C,
            keyboard_type: 4,
        });
        assert_eq!(roundtrip(event.clone()), event);
    }

    #[test]
    fn mouse_roundtrip_keeps_wheel_bits() {
        let flags = PointerFlags::from_bits_retain(PointerFlags::WHEEL.bits() | 0x0078);
        let event = InputEvent::Mouse(MouseEvent {
            flags,
            x: 100,
            y: 200,
        });
        let decoded = roundtrip(event.clone());
        assert_eq!(decoded, event);
        if let InputEvent::Mouse(m) = decoded {
            assert_eq!(m.wheel_rotation(), 0x78);
        }
    }

    #[test]
    fn negative_wheel_rotation() {
        // 9-bit two's complement: 0x1F8 = -8.
        let flags = PointerFlags::from_bits_retain(
            PointerFlags::WHEEL.bits() | PointerFlags::WHEEL_NEGATIVE.bits() | 0x00F8,
        );
        let m = MouseEvent { flags, x: 0, y: 0 };
        assert_eq!(m.wheel_rotation(), -8);
    }

    #[test]
    fn refresh_rect_roundtrip() {
        let event = InputEvent::RefreshRect(RefreshRectEvent {
            areas: vec![
                EdgeRect::new(0, 0, 639, 479),
                EdgeRect::new(100, 100, 199, 149),
            ],
        });
        assert_eq!(roundtrip(event.clone()), event);
    }

    #[test]
    fn empty_refresh_rect_list() {
        let event = InputEvent::RefreshRect(RefreshRectEvent { areas: vec![] });
        assert_eq!(roundtrip(event.clone()), event);
    }

    #[test]
    fn synchronize_lock_bits() {
        let event = InputEvent::Synchronize(SynchronizeEvent {
            flags: SyncFlags::CAPS_LOCK | SyncFlags::NUM_LOCK,
        });
        let mut buf = WireBuffer::with_capacity(8);
        event.encode_body(&mut buf).unwrap();
        assert_eq!(buf.as_slice(), &[0x06, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn truncated_body_rejected() {
        let data = [0x00u8, 0x40]; // half a flags field
        let mut rd = WireReader::new(&data);
        let err = InputEvent::decode(EventType::VirtualKey, &mut rd).unwrap_err();
        assert!(matches!(err, WireError::ShortRead { .. }));
    }
}
