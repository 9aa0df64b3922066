//! Dump session core logic.
//!
//! Connects to the display endpoint, announces the configured desktop
//! geometry, requests one full-screen refresh, then drains the update
//! order stream into a per-kind tally until the peer disconnects or
//! the tool is stopped.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{error, info, warn};

use orderwire_core::channel::ChannelId;
use orderwire_core::dispatch::{DispatchSummary, UpdateHandler};
use orderwire_core::protocol::{
    AttachFramebuffer, CapabilitiesEvent, CreateOffscreenSurface, DeleteOffscreenSurface, DstBlt,
    FramebufferInfo, InputEvent, LineTo, OpaqueRect, PaintOffscreenSurface, PaintRect, PatBlt,
    RefreshRectEvent, ScreenBlt, SetClip, SetPointer, SwitchOffscreenSurface, WindowDelete,
    WindowNewUpdate,
};
use orderwire_core::service::ServiceChannel;
use orderwire_core::{OrderType, WireError};

use crate::config::DumpConfig;

// ── OrderTally ───────────────────────────────────────────────────

/// Update handler that counts every order kind and optionally prints
/// each order as one JSON line on stdout.
pub struct OrderTally {
    json: bool,
    counts: HashMap<OrderType, u64>,
    envelopes: u64,
    orders: u64,
    skipped: u64,
}

impl OrderTally {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            counts: HashMap::new(),
            envelopes: 0,
            orders: 0,
            skipped: 0,
        }
    }

    pub fn orders_seen(&self) -> u64 {
        self.orders
    }

    pub fn count_of(&self, kind: OrderType) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Folds one envelope's dispatch outcome into the tally.
    pub fn envelope(&mut self, summary: &DispatchSummary) {
        self.envelopes += 1;
        self.skipped += summary.skipped as u64;
        if let Some(abort) = &summary.abort {
            warn!(
                index = abort.index,
                kind = abort.kind,
                error = %abort.error,
                "envelope aborted mid-dispatch"
            );
        }
    }

    /// Logs the per-kind counters, lowest type value first.
    pub fn report(&self) {
        info!(
            envelopes = self.envelopes,
            orders = self.orders,
            skipped = self.skipped,
            "order stream summary"
        );
        let mut kinds: Vec<_> = self.counts.iter().collect();
        kinds.sort_by_key(|(kind, _)| u16::from(**kind));
        for (kind, count) in kinds {
            info!("  {kind:<24} {count}");
        }
    }

    fn seen(&mut self, kind: OrderType) {
        *self.counts.entry(kind).or_default() += 1;
        self.orders += 1;
    }

    fn emit(&self, line: serde_json::Value) {
        if self.json {
            println!("{line}");
        }
    }
}

impl UpdateHandler for OrderTally {
    fn begin_update(&mut self) -> Result<(), WireError> {
        self.seen(OrderType::BeginUpdate);
        self.emit(json!({"kind": "BeginUpdate"}));
        Ok(())
    }

    fn end_update(&mut self) -> Result<(), WireError> {
        self.seen(OrderType::EndUpdate);
        self.emit(json!({"kind": "EndUpdate"}));
        Ok(())
    }

    fn opaque_rect(&mut self, order: OpaqueRect) -> Result<(), WireError> {
        self.seen(OrderType::OpaqueRect);
        self.emit(json!({"kind": "OpaqueRect", "order": order}));
        Ok(())
    }

    fn screen_blt(&mut self, order: ScreenBlt) -> Result<(), WireError> {
        self.seen(OrderType::ScreenBlt);
        self.emit(json!({"kind": "ScreenBlt", "order": order}));
        Ok(())
    }

    fn pat_blt(&mut self, order: PatBlt) -> Result<(), WireError> {
        self.seen(OrderType::PatBlt);
        self.emit(json!({"kind": "PatBlt", "order": order}));
        Ok(())
    }

    fn dst_blt(&mut self, order: DstBlt) -> Result<(), WireError> {
        self.seen(OrderType::DstBlt);
        self.emit(json!({"kind": "DstBlt", "order": order}));
        Ok(())
    }

    fn paint_rect(
        &mut self,
        order: PaintRect,
        framebuffer: Option<&FramebufferInfo>,
    ) -> Result<(), WireError> {
        self.seen(OrderType::PaintRect);
        // The bitmap itself is summarized by length; dumping megabytes
        // of pixel data as a JSON array helps nobody.
        self.emit(json!({
            "kind": "PaintRect",
            "order": {
                "rect": order.rect,
                "src": order.src,
                "segment_id": order.segment_id,
                "bitmap_len": order.bitmap.len(),
                "resolved": framebuffer.is_some(),
            },
        }));
        Ok(())
    }

    fn set_clip(&mut self, order: SetClip) -> Result<(), WireError> {
        self.seen(OrderType::SetClip);
        self.emit(json!({"kind": "SetClip", "order": order}));
        Ok(())
    }

    fn line_to(&mut self, order: LineTo) -> Result<(), WireError> {
        self.seen(OrderType::LineTo);
        self.emit(json!({"kind": "LineTo", "order": order}));
        Ok(())
    }

    fn set_pointer(&mut self, order: SetPointer) -> Result<(), WireError> {
        self.seen(OrderType::SetPointer);
        self.emit(json!({
            "kind": "SetPointer",
            "order": {
                "hotspot_x": order.hotspot_x,
                "hotspot_y": order.hotspot_y,
                "xor_bpp": order.xor_bpp,
                "xor_len": order.xor_mask.len(),
                "and_len": order.and_mask.len(),
            },
        }));
        Ok(())
    }

    fn create_offscreen_surface(&mut self, order: CreateOffscreenSurface) -> Result<(), WireError> {
        self.seen(OrderType::CreateOffscreenSurface);
        self.emit(json!({"kind": "CreateOffscreenSurface", "order": order}));
        Ok(())
    }

    fn switch_offscreen_surface(&mut self, order: SwitchOffscreenSurface) -> Result<(), WireError> {
        self.seen(OrderType::SwitchOffscreenSurface);
        self.emit(json!({"kind": "SwitchOffscreenSurface", "order": order}));
        Ok(())
    }

    fn delete_offscreen_surface(&mut self, order: DeleteOffscreenSurface) -> Result<(), WireError> {
        self.seen(OrderType::DeleteOffscreenSurface);
        self.emit(json!({"kind": "DeleteOffscreenSurface", "order": order}));
        Ok(())
    }

    fn paint_offscreen_surface(&mut self, order: PaintOffscreenSurface) -> Result<(), WireError> {
        self.seen(OrderType::PaintOffscreenSurface);
        self.emit(json!({"kind": "PaintOffscreenSurface", "order": order}));
        Ok(())
    }

    fn window_new_update(&mut self, order: WindowNewUpdate) -> Result<(), WireError> {
        self.seen(OrderType::WindowNewUpdate);
        self.emit(json!({"kind": "WindowNewUpdate", "order": order}));
        Ok(())
    }

    fn window_delete(&mut self, order: WindowDelete) -> Result<(), WireError> {
        self.seen(OrderType::WindowDelete);
        self.emit(json!({"kind": "WindowDelete", "order": order}));
        Ok(())
    }

    fn attach_framebuffer(&mut self, order: AttachFramebuffer) -> Result<(), WireError> {
        self.seen(OrderType::AttachFramebuffer);
        self.emit(json!({"kind": "AttachFramebuffer", "order": order}));
        Ok(())
    }
}

// ── OrderDump ────────────────────────────────────────────────────

/// The top-level dump session.
pub struct OrderDump {
    config: DumpConfig,
    running: Arc<AtomicBool>,
}

impl OrderDump {
    pub fn new(config: DumpConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the session from
    /// another task, e.g. a Ctrl-C handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the session until the peer disconnects or the tool is
    /// stopped.
    ///
    /// 1. Connects to the configured display endpoint.
    /// 2. Announces the configured desktop capabilities.
    /// 3. Requests a full-screen refresh.
    /// 4. Tallies update orders until disconnect or stop.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.running.store(true, Ordering::SeqCst);

        let id = ChannelId::new(
            self.config.channel.session_id,
            self.config.channel.name.clone(),
        );
        let timeout = Duration::from_secs(self.config.channel.connect_timeout_secs);
        let mut client = if self.config.channel.base_dir.is_empty() {
            ServiceChannel::connect(&id, timeout).await?
        } else {
            ServiceChannel::connect_at(&id, Path::new(&self.config.channel.base_dir), timeout)
                .await?
        };
        info!("connected to display endpoint {id}");

        client
            .send_event(&InputEvent::Capabilities(CapabilitiesEvent {
                desktop_width: self.config.display.width,
                desktop_height: self.config.display.height,
                color_depth: self.config.display.color_depth,
            }))
            .await?;
        client
            .send_event(&InputEvent::RefreshRect(RefreshRectEvent {
                areas: vec![self.config.full_screen_area()],
            }))
            .await?;
        info!("requested full-screen refresh");

        let mut tally = OrderTally::new(self.config.output.json);
        while self.running.load(Ordering::SeqCst) {
            let received = tokio::select! {
                result = client.recv_updates(&mut tally) => result,
                _ = Self::wait_for_stop(&self.running) => break,
            };
            match received {
                Ok(summary) => tally.envelope(&summary),
                Err(WireError::Disconnected) => {
                    info!("display endpoint disconnected");
                    break;
                }
                Err(e) => {
                    error!("order stream error: {e}");
                    break;
                }
            }
        }

        client.close().await;
        self.running.store(false, Ordering::SeqCst);
        tally.report();
        Ok(())
    }

    /// Async helper: resolves when `running` becomes false.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use orderwire_core::protocol::Rect;

    #[test]
    fn dump_creates_with_defaults() {
        let dump = OrderDump::new(DumpConfig::default());
        assert!(!dump.is_running());
    }

    #[test]
    fn stop_handle_works() {
        let dump = OrderDump::new(DumpConfig::default());
        let handle = dump.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(dump.is_running());
        dump.stop();
        assert!(!dump.is_running());
    }

    #[test]
    fn tally_counts_each_kind() {
        let mut tally = OrderTally::new(false);
        tally.begin_update().unwrap();
        tally
            .opaque_rect(OpaqueRect {
                rect: Rect::new(0, 0, 4, 4),
                color: 0xFF,
            })
            .unwrap();
        tally
            .opaque_rect(OpaqueRect {
                rect: Rect::new(4, 0, 4, 4),
                color: 0xFF,
            })
            .unwrap();
        tally.end_update().unwrap();

        assert_eq!(tally.orders_seen(), 4);
        assert_eq!(tally.count_of(OrderType::OpaqueRect), 2);
        assert_eq!(tally.count_of(OrderType::BeginUpdate), 1);
        assert_eq!(tally.count_of(OrderType::LineTo), 0);
    }

    #[test]
    fn abort_folds_into_tally() {
        let mut tally = OrderTally::new(false);
        let summary = DispatchSummary {
            dispatched: 2,
            skipped: 1,
            abort: None,
        };
        tally.envelope(&summary);
        tally.envelope(&summary);
        assert_eq!(tally.skipped, 2);
        assert_eq!(tally.envelopes, 2);
    }
}
