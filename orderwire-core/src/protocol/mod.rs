//! Typed wire records for both message directions.
//!
//! Records are plain data: decoding produces owned values, encoding
//! writes little-endian fields through a [`WireBuffer`]. The
//! `Serialize` derives exist for diagnostic output only; the wire
//! format never goes through serde.

pub mod input;
pub mod update;

use serde::Serialize;

use crate::buffer::{WireBuffer, WireReader};
use crate::error::WireError;

// ── Re-exports ───────────────────────────────────────────────────

pub use input::{
    CapabilitiesEvent, ExtendedMouseEvent, ExtendedPointerFlags, InputEvent, KeyboardFlags,
    MouseEvent, PointerFlags, RefreshRectEvent, ScancodeEvent, SyncFlags, SynchronizeEvent,
    UnicodeEvent, VirtualKeyEvent,
};
pub use update::{
    AttachFramebuffer, CreateOffscreenSurface, DeleteOffscreenSurface, DstBlt, LineTo, OpaqueRect,
    PaintOffscreenSurface, PaintRect, PatBlt, ScreenBlt, SetClip, SetPointer,
    SwitchOffscreenSurface, UpdateOrder, WindowDelete, WindowNewUpdate,
};

// ── Shared geometry ──────────────────────────────────────────────

/// Rectangle as origin plus extent, signed so off-screen origins are
/// representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_i32(self.x);
        buf.write_i32(self.y);
        buf.write_i32(self.width);
        buf.write_i32(self.height);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            x: rd.read_i32()?,
            y: rd.read_i32()?,
            width: rd.read_i32()?,
            height: rd.read_i32()?,
        })
    }
}

/// A point in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_i32(self.x);
        buf.write_i32(self.y);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            x: rd.read_i32()?,
            y: rd.read_i32()?,
        })
    }
}

/// Edge-form rectangle with inclusive bounds, used in rect lists
/// (refresh requests, window shapes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeRect {
    pub left: u16,
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
}

impl EdgeRect {
    pub fn new(left: u16, top: u16, right: u16, bottom: u16) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Width in pixels; bounds are inclusive.
    pub fn width(&self) -> u16 {
        self.right.saturating_sub(self.left).saturating_add(1)
    }

    pub fn height(&self) -> u16 {
        self.bottom.saturating_sub(self.top).saturating_add(1)
    }

    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u16(self.left);
        buf.write_u16(self.top);
        buf.write_u16(self.right);
        buf.write_u16(self.bottom);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            left: rd.read_u16()?,
            top: rd.read_u16()?,
            right: rd.read_u16()?,
            bottom: rd.read_u16()?,
        })
    }
}

/// 8x8 monochrome brush for pattern fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Brush {
    pub origin_x: i32,
    pub origin_y: i32,
    pub style: u8,
    pub pattern: [u8; 8],
}

impl Brush {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_i32(self.origin_x);
        buf.write_i32(self.origin_y);
        buf.write_u8(self.style);
        buf.write_bytes(&self.pattern);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        let origin_x = rd.read_i32()?;
        let origin_y = rd.read_i32()?;
        let style = rd.read_u8()?;
        let mut pattern = [0u8; 8];
        pattern.copy_from_slice(rd.read_bytes(8)?);
        Ok(Self {
            origin_x,
            origin_y,
            style,
            pattern,
        })
    }
}

/// Geometry of the shared framebuffer region, carried by the attach
/// notice and kept by the consumer for resolving paint orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FramebufferInfo {
    pub width: u32,
    pub height: u32,
    /// Bytes per scanline, padding included.
    pub scanline: u32,
    pub bits_per_pixel: u32,
    pub bytes_per_pixel: u32,
    /// Shared memory segment identifier. Never zero for a real
    /// attachment; zero marks inline bitmap data in paint orders.
    pub segment_id: u32,
}

impl FramebufferInfo {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.width);
        buf.write_u32(self.height);
        buf.write_u32(self.scanline);
        buf.write_u32(self.bits_per_pixel);
        buf.write_u32(self.bytes_per_pixel);
        buf.write_u32(self.segment_id);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            width: rd.read_u32()?,
            height: rd.read_u32()?,
            scanline: rd.read_u32()?,
            bits_per_pixel: rd.read_u32()?,
            bytes_per_pixel: rd.read_u32()?,
            segment_id: rd.read_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_roundtrip() {
        let rect = Rect::new(-10, 20, 640, 480);
        let mut buf = WireBuffer::with_capacity(16);
        rect.encode(&mut buf);
        assert_eq!(buf.sealed_len(), 16);
        let mut rd = WireReader::new(buf.as_slice());
        assert_eq!(Rect::decode(&mut rd).unwrap(), rect);
    }

    #[test]
    fn edge_rect_inclusive_extent() {
        let r = EdgeRect::new(0, 0, 639, 479);
        assert_eq!(r.width(), 640);
        assert_eq!(r.height(), 480);

        let mut buf = WireBuffer::with_capacity(8);
        r.encode(&mut buf);
        let mut rd = WireReader::new(buf.as_slice());
        assert_eq!(EdgeRect::decode(&mut rd).unwrap(), r);
    }

    #[test]
    fn brush_roundtrip() {
        let brush = Brush {
            origin_x: 3,
            origin_y: -1,
            style: 2,
            pattern: [0xAA, 0x55, 0xAA, 0x55, 0xAA, 0x55, 0xAA, 0x55],
        };
        let mut buf = WireBuffer::with_capacity(32);
        brush.encode(&mut buf);
        let mut rd = WireReader::new(buf.as_slice());
        assert_eq!(Brush::decode(&mut rd).unwrap(), brush);
    }

    #[test]
    fn framebuffer_info_roundtrip() {
        let info = FramebufferInfo {
            width: 1920,
            height: 1080,
            scanline: 7680,
            bits_per_pixel: 24,
            bytes_per_pixel: 4,
            segment_id: 77,
        };
        let mut buf = WireBuffer::with_capacity(24);
        info.encode(&mut buf);
        assert_eq!(buf.sealed_len(), 24);
        let mut rd = WireReader::new(buf.as_slice());
        assert_eq!(FramebufferInfo::decode(&mut rd).unwrap(), info);
    }
}
