//! Session objects for the two channel roles.
//!
//! [`DisplayService`] owns the listening endpoint on the display side
//! and hands out one [`DisplayChannel`] per accepted peer: the
//! producer of update orders and consumer of input events.
//! [`ServiceChannel`] is the connecting side: the consumer of update
//! orders and producer of input events.
//!
//! All per-connection state (batch buffer, attachment flag, pending
//! count) lives on the session object and resets on disconnect. While
//! disconnected the display side silently discards drawing calls; the
//! next peer starts from a clean slate and re-attaches the shared
//! framebuffer on first use.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::batch::{BatchState, DEFAULT_BATCH_CAPACITY};
use crate::buffer::WireBuffer;
use crate::channel::{self, ChannelConnection, ChannelId, ChannelListener, LinkState};
use crate::dispatch::{dispatch_events, dispatch_updates, DispatchSummary, InputHandler, UpdateHandler};
use crate::envelope::{begin_envelope, finish_envelope, write_message};
use crate::error::WireError;
use crate::protocol::{
    AttachFramebuffer, Brush, FramebufferInfo, InputEvent, LineTo, PaintRect, Point, Rect,
    SetPointer, UpdateOrder, WindowDelete, WindowNewUpdate,
};

// ── Lifecycle hooks ──────────────────────────────────────────────

/// Callbacks around connection lifecycle on the serving side.
/// `on_accept` runs once per new peer before any message flows;
/// `on_disconnect` once per teardown.
#[allow(unused_variables)]
pub trait ChannelHooks {
    fn on_accept(&mut self) {}
    fn on_disconnect(&mut self) {}
}

/// Hook implementation that does nothing.
pub struct NoHooks;

impl ChannelHooks for NoHooks {}

// ── DisplayService ───────────────────────────────────────────────

/// The display side's listening endpoint.
///
/// Serves at most one peer at a time: the caller drops the previous
/// [`DisplayChannel`] before accepting the next, which is exactly what
/// [`DisplayService::serve`] does after each disconnect.
#[derive(Debug)]
pub struct DisplayService {
    listener: ChannelListener,
}

impl DisplayService {
    /// Binds the endpoint under the default base directory.
    pub fn bind(id: &ChannelId) -> Result<Self, WireError> {
        Ok(Self {
            listener: ChannelListener::bind(id)?,
        })
    }

    pub fn bind_at(id: &ChannelId, base: &Path) -> Result<Self, WireError> {
        Ok(Self {
            listener: ChannelListener::bind_at(id, base)?,
        })
    }

    pub fn local_path(&self) -> &Path {
        self.listener.local_path()
    }

    /// Waits for the next peer and wraps it in a fresh session with
    /// reset batch state and a cleared attachment flag.
    pub async fn accept(&self) -> Result<DisplayChannel, WireError> {
        let conn = self.listener.accept().await?;
        Ok(DisplayChannel::new(conn))
    }

    /// Accept loop for consume-only embedders: accepts a peer, fires
    /// `on_accept`, pumps input events until disconnect, fires
    /// `on_disconnect`, then listens again. Producers that also draw
    /// drive [`DisplayService::accept`] themselves instead.
    pub async fn serve<H, K>(&self, handler: &mut H, hooks: &mut K) -> Result<(), WireError>
    where
        H: InputHandler,
        K: ChannelHooks,
    {
        loop {
            let mut session = self.accept().await?;
            hooks.on_accept();
            if let Err(e) = session.pump_events(handler).await {
                warn!(error = %e, "session ended with protocol error");
            }
            hooks.on_disconnect();
        }
    }
}

// ── DisplayChannel ───────────────────────────────────────────────

/// One accepted peer on the display side: produces update orders,
/// consumes input events.
#[derive(Debug)]
pub struct DisplayChannel {
    conn: ChannelConnection,
    batch: BatchState,
    link: LinkState,
    attached: bool,
    framebuffer: Option<FramebufferInfo>,
}

impl DisplayChannel {
    fn new(conn: ChannelConnection) -> Self {
        Self {
            conn,
            batch: BatchState::new(DEFAULT_BATCH_CAPACITY),
            link: LinkState::connected_now(),
            attached: false,
            framebuffer: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Soft ceiling for the accumulating batch; applies from the next
    /// enqueued order.
    pub fn set_batch_capacity(&mut self, capacity: usize) {
        self.batch.set_capacity(capacity);
    }

    /// Registers the shared framebuffer geometry without announcing
    /// it. The attach notice is injected lazily before the first
    /// framebuffer-relative order; calling this again (e.g. after a
    /// resize) re-arms the notice so the new geometry is announced.
    pub fn set_framebuffer(&mut self, info: FramebufferInfo) {
        self.framebuffer = Some(info);
        self.attached = false;
    }

    /// Registers and immediately announces the shared framebuffer.
    pub async fn attach_framebuffer(&mut self, info: FramebufferInfo) -> Result<(), WireError> {
        self.set_framebuffer(info);
        if !self.link.is_connected() {
            return Ok(());
        }
        let attach = UpdateOrder::AttachFramebuffer(AttachFramebuffer { attach: true, info });
        if let Some(frame) = self.batch.push(&attach)? {
            self.transmit(&frame).await?;
        }
        self.attached = true;
        Ok(())
    }

    /// Opens an update batch. Idempotent while one is open; a no-op
    /// while disconnected.
    pub fn begin_update(&mut self) -> Result<(), WireError> {
        if !self.link.is_connected() {
            return Ok(());
        }
        self.batch.begin()
    }

    /// Closes the current batch and transmits it. A no-op when no
    /// batch is open or the peer is gone.
    pub async fn end_update(&mut self) -> Result<(), WireError> {
        if !self.link.is_connected() {
            return Ok(());
        }
        if let Some(frame) = self.batch.finish()? {
            self.transmit(&frame).await?;
        }
        Ok(())
    }

    /// Appends one order to the current batch, opening a batch first
    /// if none is active and injecting the one-time framebuffer attach
    /// notice ahead of the first framebuffer-relative order.
    ///
    /// Silently discards the order while disconnected; the content is
    /// repainted on the next refresh anyway. Returns `Disconnected`
    /// exactly once, on the call whose transmit hits the dead peer.
    pub async fn enqueue(&mut self, order: UpdateOrder) -> Result<(), WireError> {
        if !self.link.is_connected() {
            trace!(kind = %order.order_type(), "discarding order while disconnected");
            return Ok(());
        }

        if order.is_framebuffer_relative() && !self.attached {
            if let Some(info) = self.framebuffer {
                let attach =
                    UpdateOrder::AttachFramebuffer(AttachFramebuffer { attach: true, info });
                if let Some(frame) = self.batch.push(&attach)? {
                    self.transmit(&frame).await?;
                }
                self.attached = true;
            }
        }

        if let Some(frame) = self.batch.push(&order)? {
            self.transmit(&frame).await?;
        }
        Ok(())
    }

    // ── Drawing interface ────────────────────────────────────────

    pub async fn opaque_rect(&mut self, rect: Rect, color: u32) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::OpaqueRect(crate::protocol::OpaqueRect {
            rect,
            color,
        }))
        .await
    }

    pub async fn screen_blt(&mut self, rect: Rect, src: Point) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::ScreenBlt(crate::protocol::ScreenBlt {
            rect,
            src,
        }))
        .await
    }

    pub async fn pat_blt(
        &mut self,
        rect: Rect,
        rop: u32,
        back_color: u32,
        fore_color: u32,
        brush: Brush,
    ) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::PatBlt(crate::protocol::PatBlt {
            rect,
            rop,
            back_color,
            fore_color,
            brush,
        }))
        .await
    }

    pub async fn dst_blt(&mut self, rect: Rect, rop: u32) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::DstBlt(crate::protocol::DstBlt { rect, rop }))
            .await
    }

    /// Paints a rectangle either from inline bitmap data
    /// (`segment_id == 0`) or out of the attached shared framebuffer.
    pub async fn paint_rect(
        &mut self,
        rect: Rect,
        src: Point,
        segment_id: u32,
        bitmap: Bytes,
    ) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::PaintRect(PaintRect {
            rect,
            src,
            segment_id,
            bitmap,
        }))
        .await
    }

    /// Sets the clip rectangle; `None` clears it.
    pub async fn set_clip(&mut self, rect: Option<Rect>) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::SetClip(crate::protocol::SetClip { rect }))
            .await
    }

    pub async fn line_to(&mut self, line: LineTo) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::LineTo(line)).await
    }

    pub async fn set_pointer(&mut self, pointer: SetPointer) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::SetPointer(pointer)).await
    }

    pub async fn create_offscreen_surface(
        &mut self,
        surface_id: u32,
        width: u32,
        height: u32,
    ) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::CreateOffscreenSurface(
            crate::protocol::CreateOffscreenSurface {
                surface_id,
                width,
                height,
            },
        ))
        .await
    }

    pub async fn switch_offscreen_surface(&mut self, surface_id: u32) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::SwitchOffscreenSurface(
            crate::protocol::SwitchOffscreenSurface { surface_id },
        ))
        .await
    }

    pub async fn delete_offscreen_surface(&mut self, surface_id: u32) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::DeleteOffscreenSurface(
            crate::protocol::DeleteOffscreenSurface { surface_id },
        ))
        .await
    }

    pub async fn paint_offscreen_surface(
        &mut self,
        surface_id: u32,
        rect: Rect,
        src: Point,
    ) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::PaintOffscreenSurface(
            crate::protocol::PaintOffscreenSurface {
                surface_id,
                rect,
                src,
            },
        ))
        .await
    }

    pub async fn window_new_update(&mut self, window: WindowNewUpdate) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::WindowNewUpdate(window)).await
    }

    pub async fn window_delete(&mut self, window_id: u32) -> Result<(), WireError> {
        self.enqueue(UpdateOrder::WindowDelete(WindowDelete { window_id }))
            .await
    }

    // ── Inbound events ───────────────────────────────────────────

    /// Receives one envelope of input events and dispatches it.
    /// Structural errors and disconnects reset the session state.
    pub async fn recv_events<H: InputHandler>(
        &mut self,
        handler: &mut H,
    ) -> Result<DispatchSummary, WireError> {
        let envelope = match self.conn.recv().await {
            Ok(envelope) => envelope,
            Err(e) => {
                self.mark_disconnected();
                return Err(if e.is_disconnect() {
                    WireError::Disconnected
                } else {
                    e
                });
            }
        };
        match dispatch_events(&envelope, handler) {
            Ok(summary) => Ok(summary),
            Err(e) => {
                self.mark_disconnected();
                Err(e)
            }
        }
    }

    /// Dispatches input events until the peer goes away. A clean
    /// disconnect returns `Ok`; malformed traffic returns the error.
    pub async fn pump_events<H: InputHandler>(&mut self, handler: &mut H) -> Result<(), WireError> {
        loop {
            match self.recv_events(handler).await {
                Ok(_) => {}
                Err(WireError::Disconnected) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Tears the connection down. Idempotent.
    pub async fn close(&mut self) {
        self.conn.close().await;
        self.mark_disconnected();
    }

    async fn transmit(&mut self, frame: &[u8]) -> Result<(), WireError> {
        match self.conn.send(frame).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_disconnect() => {
                self.mark_disconnected();
                Err(WireError::Disconnected)
            }
            Err(e) => Err(e),
        }
    }

    fn mark_disconnected(&mut self) {
        if self.link.is_connected() {
            debug!("display channel disconnected, resetting session state");
        }
        self.link = LinkState::Disconnected;
        self.batch.reset();
        self.attached = false;
    }
}

// ── ServiceChannel ───────────────────────────────────────────────

/// The connecting side: consumes update orders, produces input
/// events, and tracks the current shared framebuffer attachment so
/// segment-referencing paint orders resolve before the handler runs.
#[derive(Debug)]
pub struct ServiceChannel {
    conn: ChannelConnection,
    link: LinkState,
    attachment: Option<FramebufferInfo>,
    scratch: WireBuffer,
}

impl ServiceChannel {
    /// Connects under the default base directory, waiting up to
    /// `timeout` for the endpoint to appear.
    pub async fn connect(id: &ChannelId, timeout: Duration) -> Result<Self, WireError> {
        let conn = channel::connect(id, timeout).await?;
        Ok(Self::new(conn))
    }

    pub async fn connect_at(
        id: &ChannelId,
        base: &Path,
        timeout: Duration,
    ) -> Result<Self, WireError> {
        let conn = channel::connect_at(id, base, timeout).await?;
        Ok(Self::new(conn))
    }

    fn new(conn: ChannelConnection) -> Self {
        Self {
            conn,
            link: LinkState::connected_now(),
            attachment: None,
            scratch: WireBuffer::with_capacity(512),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// The shared framebuffer geometry from the most recent attach
    /// notice, if any.
    pub fn attachment(&self) -> Option<&FramebufferInfo> {
        self.attachment.as_ref()
    }

    pub async fn send_event(&mut self, event: &InputEvent) -> Result<(), WireError> {
        self.send_events(std::slice::from_ref(event)).await
    }

    /// Packs the events into one envelope and sends it. An empty
    /// slice is a no-op.
    pub async fn send_events(&mut self, events: &[InputEvent]) -> Result<(), WireError> {
        if events.is_empty() {
            return Ok(());
        }
        if !self.link.is_connected() {
            return Err(WireError::Disconnected);
        }

        begin_envelope(&mut self.scratch);
        for event in events {
            write_message(&mut self.scratch, event.event_type().into(), |b| {
                event.encode_body(b)
            })?;
        }
        finish_envelope(&mut self.scratch, events.len() as u32)?;

        match self.conn.send(self.scratch.as_slice()).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_disconnect() => {
                self.mark_disconnected();
                Err(WireError::Disconnected)
            }
            Err(e) => Err(e),
        }
    }

    /// Receives one envelope of update orders and dispatches it,
    /// resolving paint orders against the tracked attachment.
    pub async fn recv_updates<H: UpdateHandler>(
        &mut self,
        handler: &mut H,
    ) -> Result<DispatchSummary, WireError> {
        let envelope = match self.conn.recv().await {
            Ok(envelope) => envelope,
            Err(e) => {
                self.mark_disconnected();
                return Err(if e.is_disconnect() {
                    WireError::Disconnected
                } else {
                    e
                });
            }
        };
        match dispatch_updates(&envelope, handler, &mut self.attachment) {
            Ok(summary) => Ok(summary),
            Err(e) => {
                self.mark_disconnected();
                Err(e)
            }
        }
    }

    /// Dispatches update orders until the peer goes away.
    pub async fn pump_updates<H: UpdateHandler>(
        &mut self,
        handler: &mut H,
    ) -> Result<(), WireError> {
        loop {
            match self.recv_updates(handler).await {
                Ok(_) => {}
                Err(WireError::Disconnected) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Tears the connection down. Idempotent.
    pub async fn close(&mut self) {
        self.conn.close().await;
        self.mark_disconnected();
    }

    fn mark_disconnected(&mut self) {
        if self.link.is_connected() {
            debug!("service channel disconnected");
        }
        self.link = LinkState::Disconnected;
        self.attachment = None;
    }
}
