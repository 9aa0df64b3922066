//! Server-originated drawing and update orders.
//!
//! These travel from the display side to the protocol service inside
//! batched envelopes: primitive drawing operations, pointer and clip
//! state, offscreen surface management, window compositing metadata,
//! and the one-time shared framebuffer attachment.
//!
//! Bitmap payloads are opaque to this layer and carried verbatim.

use bytes::Bytes;
use serde::Serialize;

use crate::buffer::{WireBuffer, WireReader};
use crate::error::WireError;
use crate::message::OrderType;
use crate::protocol::{Brush, EdgeRect, FramebufferInfo, Point, Rect};

// ── Order records ────────────────────────────────────────────────

/// Solid fill. Body: `Rect | u32 color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpaqueRect {
    pub rect: Rect,
    pub color: u32,
}

impl OpaqueRect {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        self.rect.encode(buf);
        buf.write_u32(self.color);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            rect: Rect::decode(rd)?,
            color: rd.read_u32()?,
        })
    }
}

/// Screen-to-screen copy. Body: `Rect | Point src`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScreenBlt {
    pub rect: Rect,
    pub src: Point,
}

impl ScreenBlt {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        self.rect.encode(buf);
        self.src.encode(buf);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            rect: Rect::decode(rd)?,
            src: Point::decode(rd)?,
        })
    }
}

/// Pattern fill. Body: `Rect | u32 rop | u32 back | u32 fore | Brush`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatBlt {
    pub rect: Rect,
    pub rop: u32,
    pub back_color: u32,
    pub fore_color: u32,
    pub brush: Brush,
}

impl PatBlt {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        self.rect.encode(buf);
        buf.write_u32(self.rop);
        buf.write_u32(self.back_color);
        buf.write_u32(self.fore_color);
        self.brush.encode(buf);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            rect: Rect::decode(rd)?,
            rop: rd.read_u32()?,
            back_color: rd.read_u32()?,
            fore_color: rd.read_u32()?,
            brush: Brush::decode(rd)?,
        })
    }
}

/// Destination-only raster operation. Body: `Rect | u32 rop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DstBlt {
    pub rect: Rect,
    pub rop: u32,
}

impl DstBlt {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        self.rect.encode(buf);
        buf.write_u32(self.rop);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            rect: Rect::decode(rd)?,
            rop: rd.read_u32()?,
        })
    }
}

/// Bitmap paint. Body: `Rect | Point src | u32 segment_id | u32 len | bytes`.
///
/// `segment_id == 0` means the pixel data rides inline in `bitmap`;
/// a nonzero id refers into the attached shared framebuffer and
/// `bitmap` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaintRect {
    pub rect: Rect,
    pub src: Point,
    pub segment_id: u32,
    pub bitmap: Bytes,
}

impl PaintRect {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        self.rect.encode(buf);
        self.src.encode(buf);
        buf.write_u32(self.segment_id);
        buf.write_u32(self.bitmap.len() as u32);
        buf.write_bytes(&self.bitmap);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        let rect = Rect::decode(rd)?;
        let src = Point::decode(rd)?;
        let segment_id = rd.read_u32()?;
        let len = rd.read_u32()? as usize;
        let bitmap = Bytes::copy_from_slice(rd.read_bytes(len)?);
        Ok(Self {
            rect,
            src,
            segment_id,
            bitmap,
        })
    }
}

/// Clip region update. Body: `u8 null_flag | Rect` (rect zeroed when null).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetClip {
    pub rect: Option<Rect>,
}

impl SetClip {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        match self.rect {
            Some(rect) => {
                buf.write_u8(0);
                rect.encode(buf);
            }
            None => {
                buf.write_u8(1);
                Rect::new(0, 0, 0, 0).encode(buf);
            }
        }
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        let null_region = rd.read_u8()?;
        let rect = Rect::decode(rd)?;
        Ok(Self {
            rect: (null_region == 0).then_some(rect),
        })
    }
}

/// Pen line. Body: `Point start | Point end | u32 rop2 | u32 color | u32 width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineTo {
    pub start: Point,
    pub end: Point,
    pub rop2: u32,
    pub pen_color: u32,
    pub pen_width: u32,
}

impl LineTo {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        self.start.encode(buf);
        self.end.encode(buf);
        buf.write_u32(self.rop2);
        buf.write_u32(self.pen_color);
        buf.write_u32(self.pen_width);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            start: Point::decode(rd)?,
            end: Point::decode(rd)?,
            rop2: rd.read_u32()?,
            pen_color: rd.read_u32()?,
            pen_width: rd.read_u32()?,
        })
    }
}

/// Pointer shape change. Body: `u32 hotspot_x | u32 hotspot_y |
/// u32 xor_bpp | u32 len | xor bytes | u32 len | and bytes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetPointer {
    pub hotspot_x: u32,
    pub hotspot_y: u32,
    pub xor_bpp: u32,
    pub xor_mask: Bytes,
    pub and_mask: Bytes,
}

impl SetPointer {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.hotspot_x);
        buf.write_u32(self.hotspot_y);
        buf.write_u32(self.xor_bpp);
        buf.write_u32(self.xor_mask.len() as u32);
        buf.write_bytes(&self.xor_mask);
        buf.write_u32(self.and_mask.len() as u32);
        buf.write_bytes(&self.and_mask);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        let hotspot_x = rd.read_u32()?;
        let hotspot_y = rd.read_u32()?;
        let xor_bpp = rd.read_u32()?;
        let xor_len = rd.read_u32()? as usize;
        let xor_mask = Bytes::copy_from_slice(rd.read_bytes(xor_len)?);
        let and_len = rd.read_u32()? as usize;
        let and_mask = Bytes::copy_from_slice(rd.read_bytes(and_len)?);
        Ok(Self {
            hotspot_x,
            hotspot_y,
            xor_bpp,
            xor_mask,
            and_mask,
        })
    }
}

/// Offscreen surface creation. Body: `u32 id | u32 width | u32 height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreateOffscreenSurface {
    pub surface_id: u32,
    pub width: u32,
    pub height: u32,
}

impl CreateOffscreenSurface {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.surface_id);
        buf.write_u32(self.width);
        buf.write_u32(self.height);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            surface_id: rd.read_u32()?,
            width: rd.read_u32()?,
            height: rd.read_u32()?,
        })
    }
}

/// Redirects subsequent drawing to a surface; id 0 is the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwitchOffscreenSurface {
    pub surface_id: u32,
}

impl SwitchOffscreenSurface {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.surface_id);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            surface_id: rd.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOffscreenSurface {
    pub surface_id: u32,
}

impl DeleteOffscreenSurface {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.surface_id);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            surface_id: rd.read_u32()?,
        })
    }
}

/// Copies a surface region to the screen. Body: `u32 id | Rect | Point src`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaintOffscreenSurface {
    pub surface_id: u32,
    pub rect: Rect,
    pub src: Point,
}

impl PaintOffscreenSurface {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.surface_id);
        self.rect.encode(buf);
        self.src.encode(buf);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            surface_id: rd.read_u32()?,
            rect: Rect::decode(rd)?,
            src: Point::decode(rd)?,
        })
    }
}

/// Creates or updates a composited window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowNewUpdate {
    pub window_id: u32,
    pub owner_id: u32,
    pub style: u32,
    pub extended_style: u32,
    pub title: String,
    pub client_offset_x: i32,
    pub client_offset_y: i32,
    pub client_area_width: u32,
    pub client_area_height: u32,
    pub window_offset_x: i32,
    pub window_offset_y: i32,
    pub window_width: u32,
    pub window_height: u32,
    pub visible_offset_x: i32,
    pub visible_offset_y: i32,
    pub window_rects: Vec<EdgeRect>,
    pub visibility_rects: Vec<EdgeRect>,
}

fn write_rect_list(buf: &mut WireBuffer, rects: &[EdgeRect]) -> Result<(), WireError> {
    if rects.len() > u16::MAX as usize {
        return Err(WireError::Encoding(format!(
            "rect list count {} exceeds u16",
            rects.len()
        )));
    }
    buf.write_u16(rects.len() as u16);
    for rect in rects {
        rect.encode(buf);
    }
    Ok(())
}

fn read_rect_list(rd: &mut WireReader) -> Result<Vec<EdgeRect>, WireError> {
    let count = rd.read_u16()?;
    let mut rects = Vec::with_capacity(count as usize);
    for _ in 0..count {
        rects.push(EdgeRect::decode(rd)?);
    }
    Ok(rects)
}

impl WindowNewUpdate {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) -> Result<(), WireError> {
        if self.title.len() > u16::MAX as usize {
            return Err(WireError::Encoding(format!(
                "window title length {} exceeds u16",
                self.title.len()
            )));
        }
        buf.write_u32(self.window_id);
        buf.write_u32(self.owner_id);
        buf.write_u32(self.style);
        buf.write_u32(self.extended_style);
        buf.write_u16(self.title.len() as u16);
        buf.write_bytes(self.title.as_bytes());
        buf.write_i32(self.client_offset_x);
        buf.write_i32(self.client_offset_y);
        buf.write_u32(self.client_area_width);
        buf.write_u32(self.client_area_height);
        buf.write_i32(self.window_offset_x);
        buf.write_i32(self.window_offset_y);
        buf.write_u32(self.window_width);
        buf.write_u32(self.window_height);
        buf.write_i32(self.visible_offset_x);
        buf.write_i32(self.visible_offset_y);
        write_rect_list(buf, &self.window_rects)?;
        write_rect_list(buf, &self.visibility_rects)?;
        Ok(())
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        let window_id = rd.read_u32()?;
        let owner_id = rd.read_u32()?;
        let style = rd.read_u32()?;
        let extended_style = rd.read_u32()?;
        let title_len = rd.read_u16()? as usize;
        let title = String::from_utf8(rd.read_bytes(title_len)?.to_vec())?;
        Ok(Self {
            window_id,
            owner_id,
            style,
            extended_style,
            title,
            client_offset_x: rd.read_i32()?,
            client_offset_y: rd.read_i32()?,
            client_area_width: rd.read_u32()?,
            client_area_height: rd.read_u32()?,
            window_offset_x: rd.read_i32()?,
            window_offset_y: rd.read_i32()?,
            window_width: rd.read_u32()?,
            window_height: rd.read_u32()?,
            visible_offset_x: rd.read_i32()?,
            visible_offset_y: rd.read_i32()?,
            window_rects: read_rect_list(rd)?,
            visibility_rects: read_rect_list(rd)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowDelete {
    pub window_id: u32,
}

impl WindowDelete {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.window_id);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            window_id: rd.read_u32()?,
        })
    }
}

/// Shared framebuffer attach/detach notice.
/// Body: `u32 attach | FramebufferInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttachFramebuffer {
    pub attach: bool,
    pub info: FramebufferInfo,
}

impl AttachFramebuffer {
    pub(crate) fn encode(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.attach as u32);
        self.info.encode(buf);
    }

    pub(crate) fn decode(rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(Self {
            attach: rd.read_u32()? != 0,
            info: FramebufferInfo::decode(rd)?,
        })
    }
}

// ── Tagged sum ───────────────────────────────────────────────────

/// One decoded server-originated order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UpdateOrder {
    BeginUpdate,
    EndUpdate,
    OpaqueRect(OpaqueRect),
    ScreenBlt(ScreenBlt),
    PatBlt(PatBlt),
    DstBlt(DstBlt),
    PaintRect(PaintRect),
    SetClip(SetClip),
    LineTo(LineTo),
    SetPointer(SetPointer),
    CreateOffscreenSurface(CreateOffscreenSurface),
    SwitchOffscreenSurface(SwitchOffscreenSurface),
    DeleteOffscreenSurface(DeleteOffscreenSurface),
    PaintOffscreenSurface(PaintOffscreenSurface),
    WindowNewUpdate(WindowNewUpdate),
    WindowDelete(WindowDelete),
    AttachFramebuffer(AttachFramebuffer),
}

impl UpdateOrder {
    /// Wire discriminant for this order.
    pub fn order_type(&self) -> OrderType {
        match self {
            UpdateOrder::BeginUpdate => OrderType::BeginUpdate,
            UpdateOrder::EndUpdate => OrderType::EndUpdate,
            UpdateOrder::OpaqueRect(_) => OrderType::OpaqueRect,
            UpdateOrder::ScreenBlt(_) => OrderType::ScreenBlt,
            UpdateOrder::PatBlt(_) => OrderType::PatBlt,
            UpdateOrder::DstBlt(_) => OrderType::DstBlt,
            UpdateOrder::PaintRect(_) => OrderType::PaintRect,
            UpdateOrder::SetClip(_) => OrderType::SetClip,
            UpdateOrder::LineTo(_) => OrderType::LineTo,
            UpdateOrder::SetPointer(_) => OrderType::SetPointer,
            UpdateOrder::CreateOffscreenSurface(_) => OrderType::CreateOffscreenSurface,
            UpdateOrder::SwitchOffscreenSurface(_) => OrderType::SwitchOffscreenSurface,
            UpdateOrder::DeleteOffscreenSurface(_) => OrderType::DeleteOffscreenSurface,
            UpdateOrder::PaintOffscreenSurface(_) => OrderType::PaintOffscreenSurface,
            UpdateOrder::WindowNewUpdate(_) => OrderType::WindowNewUpdate,
            UpdateOrder::WindowDelete(_) => OrderType::WindowDelete,
            UpdateOrder::AttachFramebuffer(_) => OrderType::AttachFramebuffer,
        }
    }

    /// True for orders that read pixels out of the shared framebuffer
    /// and therefore require the attachment to precede them.
    pub fn is_framebuffer_relative(&self) -> bool {
        matches!(
            self,
            UpdateOrder::OpaqueRect(_)
                | UpdateOrder::ScreenBlt(_)
                | UpdateOrder::PatBlt(_)
                | UpdateOrder::DstBlt(_)
                | UpdateOrder::PaintRect(_)
        )
    }

    /// Decodes the body of a sub-message already routed by type.
    pub fn decode(kind: OrderType, rd: &mut WireReader) -> Result<Self, WireError> {
        Ok(match kind {
            OrderType::BeginUpdate => UpdateOrder::BeginUpdate,
            OrderType::EndUpdate => UpdateOrder::EndUpdate,
            OrderType::OpaqueRect => UpdateOrder::OpaqueRect(OpaqueRect::decode(rd)?),
            OrderType::ScreenBlt => UpdateOrder::ScreenBlt(ScreenBlt::decode(rd)?),
            OrderType::PatBlt => UpdateOrder::PatBlt(PatBlt::decode(rd)?),
            OrderType::DstBlt => UpdateOrder::DstBlt(DstBlt::decode(rd)?),
            OrderType::PaintRect => UpdateOrder::PaintRect(PaintRect::decode(rd)?),
            OrderType::SetClip => UpdateOrder::SetClip(SetClip::decode(rd)?),
            OrderType::LineTo => UpdateOrder::LineTo(LineTo::decode(rd)?),
            OrderType::SetPointer => UpdateOrder::SetPointer(SetPointer::decode(rd)?),
            OrderType::CreateOffscreenSurface => {
                UpdateOrder::CreateOffscreenSurface(CreateOffscreenSurface::decode(rd)?)
            }
            OrderType::SwitchOffscreenSurface => {
                UpdateOrder::SwitchOffscreenSurface(SwitchOffscreenSurface::decode(rd)?)
            }
            OrderType::DeleteOffscreenSurface => {
                UpdateOrder::DeleteOffscreenSurface(DeleteOffscreenSurface::decode(rd)?)
            }
            OrderType::PaintOffscreenSurface => {
                UpdateOrder::PaintOffscreenSurface(PaintOffscreenSurface::decode(rd)?)
            }
            OrderType::WindowNewUpdate => UpdateOrder::WindowNewUpdate(WindowNewUpdate::decode(rd)?),
            OrderType::WindowDelete => UpdateOrder::WindowDelete(WindowDelete::decode(rd)?),
            OrderType::AttachFramebuffer => {
                UpdateOrder::AttachFramebuffer(AttachFramebuffer::decode(rd)?)
            }
        })
    }

    /// Writes the body fields (no sub-message header). Begin/end
    /// markers have empty bodies.
    pub fn encode_body(&self, buf: &mut WireBuffer) -> Result<(), WireError> {
        match self {
            UpdateOrder::BeginUpdate | UpdateOrder::EndUpdate => {}
            UpdateOrder::OpaqueRect(o) => o.encode(buf),
            UpdateOrder::ScreenBlt(o) => o.encode(buf),
            UpdateOrder::PatBlt(o) => o.encode(buf),
            UpdateOrder::DstBlt(o) => o.encode(buf),
            UpdateOrder::PaintRect(o) => o.encode(buf),
            UpdateOrder::SetClip(o) => o.encode(buf),
            UpdateOrder::LineTo(o) => o.encode(buf),
            UpdateOrder::SetPointer(o) => o.encode(buf),
            UpdateOrder::CreateOffscreenSurface(o) => o.encode(buf),
            UpdateOrder::SwitchOffscreenSurface(o) => o.encode(buf),
            UpdateOrder::DeleteOffscreenSurface(o) => o.encode(buf),
            UpdateOrder::PaintOffscreenSurface(o) => o.encode(buf),
            UpdateOrder::WindowNewUpdate(o) => return o.encode(buf),
            UpdateOrder::WindowDelete(o) => o.encode(buf),
            UpdateOrder::AttachFramebuffer(o) => o.encode(buf),
        }
        Ok(())
    }
}
