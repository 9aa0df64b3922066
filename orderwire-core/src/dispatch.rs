//! Routes decoded sub-messages to handler callbacks.
//!
//! One handler trait per direction, with a default no-op body per
//! message kind so consumers implement only what they care about; an
//! unimplemented kind is decoded and silently discarded.
//!
//! Error surface: structural problems (malformed envelope, a known
//! type with a truncated body) are returned as `Err` and are fatal to
//! the connection. A handler failure aborts the remaining messages of
//! the envelope only, recorded in the returned [`DispatchSummary`];
//! the connection stays up. Unknown message types are logged, counted,
//! and skipped via their declared length.

use tracing::{debug, trace, warn};

use crate::buffer::WireReader;
use crate::envelope::Envelope;
use crate::error::WireError;
use crate::message::{EventType, OrderType};
use crate::protocol::input::*;
use crate::protocol::update::*;
use crate::protocol::FramebufferInfo;

// ── Handler traits ───────────────────────────────────────────────

/// Consumer callbacks for client-originated input events.
#[allow(unused_variables)]
pub trait InputHandler {
    fn synchronize(&mut self, event: SynchronizeEvent) -> Result<(), WireError> {
        Ok(())
    }
    fn scancode(&mut self, event: ScancodeEvent) -> Result<(), WireError> {
        Ok(())
    }
    fn virtual_key(&mut self, event: VirtualKeyEvent) -> Result<(), WireError> {
        Ok(())
    }
    fn unicode(&mut self, event: UnicodeEvent) -> Result<(), WireError> {
        Ok(())
    }
    fn mouse(&mut self, event: MouseEvent) -> Result<(), WireError> {
        Ok(())
    }
    fn extended_mouse(&mut self, event: ExtendedMouseEvent) -> Result<(), WireError> {
        Ok(())
    }
    fn capabilities(&mut self, event: CapabilitiesEvent) -> Result<(), WireError> {
        Ok(())
    }
    fn refresh_rect(&mut self, event: RefreshRectEvent) -> Result<(), WireError> {
        Ok(())
    }
}

/// Consumer callbacks for server-originated update orders.
///
/// `paint_rect` additionally receives the shared framebuffer geometry
/// when the order references a segment; the dispatcher resolves it
/// against the most recent attachment on this connection.
#[allow(unused_variables)]
pub trait UpdateHandler {
    fn begin_update(&mut self) -> Result<(), WireError> {
        Ok(())
    }
    fn end_update(&mut self) -> Result<(), WireError> {
        Ok(())
    }
    fn opaque_rect(&mut self, order: OpaqueRect) -> Result<(), WireError> {
        Ok(())
    }
    fn screen_blt(&mut self, order: ScreenBlt) -> Result<(), WireError> {
        Ok(())
    }
    fn pat_blt(&mut self, order: PatBlt) -> Result<(), WireError> {
        Ok(())
    }
    fn dst_blt(&mut self, order: DstBlt) -> Result<(), WireError> {
        Ok(())
    }
    fn paint_rect(
        &mut self,
        order: PaintRect,
        framebuffer: Option<&FramebufferInfo>,
    ) -> Result<(), WireError> {
        Ok(())
    }
    fn set_clip(&mut self, order: SetClip) -> Result<(), WireError> {
        Ok(())
    }
    fn line_to(&mut self, order: LineTo) -> Result<(), WireError> {
        Ok(())
    }
    fn set_pointer(&mut self, order: SetPointer) -> Result<(), WireError> {
        Ok(())
    }
    fn create_offscreen_surface(&mut self, order: CreateOffscreenSurface) -> Result<(), WireError> {
        Ok(())
    }
    fn switch_offscreen_surface(&mut self, order: SwitchOffscreenSurface) -> Result<(), WireError> {
        Ok(())
    }
    fn delete_offscreen_surface(&mut self, order: DeleteOffscreenSurface) -> Result<(), WireError> {
        Ok(())
    }
    fn paint_offscreen_surface(&mut self, order: PaintOffscreenSurface) -> Result<(), WireError> {
        Ok(())
    }
    fn window_new_update(&mut self, order: WindowNewUpdate) -> Result<(), WireError> {
        Ok(())
    }
    fn window_delete(&mut self, order: WindowDelete) -> Result<(), WireError> {
        Ok(())
    }
    fn attach_framebuffer(&mut self, order: AttachFramebuffer) -> Result<(), WireError> {
        Ok(())
    }
}

// ── Dispatch result ──────────────────────────────────────────────

/// Why dispatch stopped early.
#[derive(Debug)]
pub struct DispatchAbort {
    /// Zero-based position of the failing message in the envelope.
    pub index: usize,
    /// Raw wire discriminant of the failing message.
    pub kind: u16,
    pub error: WireError,
}

/// Outcome of dispatching one envelope.
#[derive(Debug, Default)]
pub struct DispatchSummary {
    /// Messages decoded and handled.
    pub dispatched: usize,
    /// Unknown-type messages skipped by declared length.
    pub skipped: usize,
    /// Set when a handler failure aborted the rest of the envelope.
    pub abort: Option<DispatchAbort>,
}

impl DispatchSummary {
    pub fn is_clean(&self) -> bool {
        self.abort.is_none()
    }
}

// ── Dispatch loops ───────────────────────────────────────────────

/// Dispatches every client-originated event in the envelope.
pub fn dispatch_events<H: InputHandler>(
    envelope: &Envelope,
    handler: &mut H,
) -> Result<DispatchSummary, WireError> {
    let mut summary = DispatchSummary::default();

    for (index, msg) in envelope.messages().enumerate() {
        let msg = msg?;
        let kind = match EventType::try_from(msg.kind) {
            Ok(kind) => kind,
            Err(_) => {
                warn!(kind = msg.kind, "skipping unknown event type");
                summary.skipped += 1;
                continue;
            }
        };

        let mut rd = WireReader::new(&msg.body);
        let event = InputEvent::decode(kind, &mut rd)?;

        let result = match event {
            InputEvent::Synchronize(e) => handler.synchronize(e),
            InputEvent::Scancode(e) => handler.scancode(e),
            InputEvent::VirtualKey(e) => handler.virtual_key(e),
            InputEvent::Unicode(e) => handler.unicode(e),
            InputEvent::Mouse(e) => handler.mouse(e),
            InputEvent::ExtendedMouse(e) => handler.extended_mouse(e),
            InputEvent::Capabilities(e) => handler.capabilities(e),
            InputEvent::RefreshRect(e) => handler.refresh_rect(e),
        };

        if let Err(error) = result {
            warn!(index, %kind, %error, "event handler failed, aborting envelope");
            summary.abort = Some(DispatchAbort {
                index,
                kind: msg.kind,
                error,
            });
            break;
        }
        summary.dispatched += 1;
    }

    trace!(
        dispatched = summary.dispatched,
        skipped = summary.skipped,
        "event envelope dispatched"
    );
    Ok(summary)
}

/// Dispatches every server-originated order in the envelope.
///
/// `attachment` is the connection's current shared framebuffer state:
/// updated in place when an attach notice arrives and consulted to
/// resolve segment-referencing paint orders.
pub fn dispatch_updates<H: UpdateHandler>(
    envelope: &Envelope,
    handler: &mut H,
    attachment: &mut Option<FramebufferInfo>,
) -> Result<DispatchSummary, WireError> {
    let mut summary = DispatchSummary::default();

    for (index, msg) in envelope.messages().enumerate() {
        let msg = msg?;
        let kind = match OrderType::try_from(msg.kind) {
            Ok(kind) => kind,
            Err(_) => {
                warn!(kind = msg.kind, "skipping unknown order type");
                summary.skipped += 1;
                continue;
            }
        };

        let mut rd = WireReader::new(&msg.body);
        let order = UpdateOrder::decode(kind, &mut rd)?;

        let result = match order {
            UpdateOrder::BeginUpdate => handler.begin_update(),
            UpdateOrder::EndUpdate => handler.end_update(),
            UpdateOrder::OpaqueRect(o) => handler.opaque_rect(o),
            UpdateOrder::ScreenBlt(o) => handler.screen_blt(o),
            UpdateOrder::PatBlt(o) => handler.pat_blt(o),
            UpdateOrder::DstBlt(o) => handler.dst_blt(o),
            UpdateOrder::PaintRect(o) => {
                let framebuffer = if o.segment_id != 0 {
                    attachment.as_ref()
                } else {
                    None
                };
                handler.paint_rect(o, framebuffer)
            }
            UpdateOrder::SetClip(o) => handler.set_clip(o),
            UpdateOrder::LineTo(o) => handler.line_to(o),
            UpdateOrder::SetPointer(o) => handler.set_pointer(o),
            UpdateOrder::CreateOffscreenSurface(o) => handler.create_offscreen_surface(o),
            UpdateOrder::SwitchOffscreenSurface(o) => handler.switch_offscreen_surface(o),
            UpdateOrder::DeleteOffscreenSurface(o) => handler.delete_offscreen_surface(o),
            UpdateOrder::PaintOffscreenSurface(o) => handler.paint_offscreen_surface(o),
            UpdateOrder::WindowNewUpdate(o) => handler.window_new_update(o),
            UpdateOrder::WindowDelete(o) => handler.window_delete(o),
            UpdateOrder::AttachFramebuffer(o) => {
                *attachment = o.attach.then_some(o.info);
                debug!(
                    attach = o.attach,
                    segment_id = o.info.segment_id,
                    "framebuffer attachment changed"
                );
                handler.attach_framebuffer(o)
            }
        };

        if let Err(error) = result {
            warn!(index, %kind, %error, "order handler failed, aborting envelope");
            summary.abort = Some(DispatchAbort {
                index,
                kind: msg.kind,
                error,
            });
            break;
        }
        summary.dispatched += 1;
    }

    trace!(
        dispatched = summary.dispatched,
        skipped = summary.skipped,
        "update envelope dispatched"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::WireBuffer;
    use crate::envelope::{begin_envelope, finish_envelope, write_message};
    use crate::protocol::{Point, Rect};
    use bytes::Bytes;

    fn event_envelope(events: &[InputEvent]) -> Envelope {
        let mut buf = WireBuffer::with_capacity(256);
        begin_envelope(&mut buf);
        for event in events {
            write_message(&mut buf, event.event_type().into(), |b| {
                event.encode_body(b)
            })
            .unwrap();
        }
        finish_envelope(&mut buf, events.len() as u32).unwrap();
        Envelope::parse(buf.as_slice()).unwrap()
    }

    fn order_envelope(orders: &[UpdateOrder]) -> Envelope {
        let mut buf = WireBuffer::with_capacity(256);
        begin_envelope(&mut buf);
        for order in orders {
            write_message(&mut buf, order.order_type().into(), |b| {
                order.encode_body(b)
            })
            .unwrap();
        }
        finish_envelope(&mut buf, orders.len() as u32).unwrap();
        Envelope::parse(buf.as_slice()).unwrap()
    }

    #[derive(Default)]
    struct RecordingInput {
        events: Vec<InputEvent>,
        fail_on: Option<usize>,
    }

    impl RecordingInput {
        fn record(&mut self, event: InputEvent) -> Result<(), WireError> {
            if self.fail_on == Some(self.events.len()) {
                return Err(WireError::Handler("injected failure".into()));
            }
            self.events.push(event);
            Ok(())
        }
    }

    impl InputHandler for RecordingInput {
        fn scancode(&mut self, e: ScancodeEvent) -> Result<(), WireError> {
            self.record(InputEvent::Scancode(e))
        }
        fn mouse(&mut self, e: MouseEvent) -> Result<(), WireError> {
            self.record(InputEvent::Mouse(e))
        }
        fn capabilities(&mut self, e: CapabilitiesEvent) -> Result<(), WireError> {
            self.record(InputEvent::Capabilities(e))
        }
        fn refresh_rect(&mut self, e: RefreshRectEvent) -> Result<(), WireError> {
            self.record(InputEvent::RefreshRect(e))
        }
    }

    #[derive(Default)]
    struct RecordingUpdates {
        orders: Vec<String>,
        paint_framebuffers: Vec<Option<FramebufferInfo>>,
    }

    impl UpdateHandler for RecordingUpdates {
        fn begin_update(&mut self) -> Result<(), WireError> {
            self.orders.push("begin".into());
            Ok(())
        }
        fn end_update(&mut self) -> Result<(), WireError> {
            self.orders.push("end".into());
            Ok(())
        }
        fn opaque_rect(&mut self, o: OpaqueRect) -> Result<(), WireError> {
            self.orders.push(format!("opaque:{}", o.color));
            Ok(())
        }
        fn paint_rect(
            &mut self,
            o: PaintRect,
            fb: Option<&FramebufferInfo>,
        ) -> Result<(), WireError> {
            self.orders.push(format!("paint:{}", o.segment_id));
            self.paint_framebuffers.push(fb.copied());
            Ok(())
        }
    }

    fn sample_fb(segment_id: u32) -> FramebufferInfo {
        FramebufferInfo {
            width: 800,
            height: 600,
            scanline: 3200,
            bits_per_pixel: 24,
            bytes_per_pixel: 4,
            segment_id,
        }
    }

    #[test]
    fn events_dispatch_in_order() {
        let events = vec![
            InputEvent::Mouse(MouseEvent {
                flags: PointerFlags::MOVE,
                x: 10,
                y: 20,
            }),
            InputEvent::Scancode(ScancodeEvent {
                flags: KeyboardFlags::DOWN,
                code: 0x1C,
                keyboard_type: 4,
            }),
        ];
        let mut handler = RecordingInput::default();
        let summary = dispatch_events(&event_envelope(&events), &mut handler).unwrap();

        assert_eq!(summary.dispatched, 2);
        assert_eq!(summary.skipped, 0);
        assert!(summary.is_clean());
        assert_eq!(handler.events, events);
    }

    #[test]
    fn unknown_type_skipped_known_dispatched() {
        let mut buf = WireBuffer::with_capacity(128);
        begin_envelope(&mut buf);
        write_message(&mut buf, 0x00EE, |b| {
            b.write_bytes(&[1, 2, 3, 4, 5]);
            Ok(())
        })
        .unwrap();
        let known = InputEvent::Capabilities(CapabilitiesEvent {
            desktop_width: 1024,
            desktop_height: 768,
            color_depth: 24,
        });
        write_message(&mut buf, known.event_type().into(), |b| known.encode_body(b)).unwrap();
        finish_envelope(&mut buf, 2).unwrap();
        let envelope = Envelope::parse(buf.as_slice()).unwrap();

        let mut handler = RecordingInput::default();
        let summary = dispatch_events(&envelope, &mut handler).unwrap();

        assert_eq!(summary.dispatched, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(handler.events, vec![known]);
    }

    #[test]
    fn under_reading_handler_stays_aligned() {
        // First message carries 6 bytes of padding past the decoded
        // fields; the declared length must carry the cursor over it.
        let padded = InputEvent::VirtualKey(VirtualKeyEvent {
            flags: KeyboardFlags::RELEASE,
            code: 0x41,
        });
        let follow = InputEvent::Mouse(MouseEvent {
            flags: PointerFlags::BUTTON1 | PointerFlags::DOWN,
            x: 5,
            y: 6,
        });

        let mut buf = WireBuffer::with_capacity(128);
        begin_envelope(&mut buf);
        write_message(&mut buf, padded.event_type().into(), |b| {
            padded.encode_body(b)?;
            b.write_bytes(&[0u8; 6]);
            Ok(())
        })
        .unwrap();
        write_message(&mut buf, follow.event_type().into(), |b| {
            follow.encode_body(b)
        })
        .unwrap();
        finish_envelope(&mut buf, 2).unwrap();
        let envelope = Envelope::parse(buf.as_slice()).unwrap();

        let mut handler = RecordingInput::default();
        let summary = dispatch_events(&envelope, &mut handler).unwrap();
        assert_eq!(summary.dispatched, 2);
        assert_eq!(handler.events[0], follow);
    }

    #[test]
    fn handler_failure_aborts_remaining() {
        let events = vec![
            InputEvent::Mouse(MouseEvent {
                flags: PointerFlags::MOVE,
                x: 1,
                y: 1,
            }),
            InputEvent::Mouse(MouseEvent {
                flags: PointerFlags::MOVE,
                x: 2,
                y: 2,
            }),
            InputEvent::Mouse(MouseEvent {
                flags: PointerFlags::MOVE,
                x: 3,
                y: 3,
            }),
        ];
        let mut handler = RecordingInput {
            fail_on: Some(1),
            ..Default::default()
        };
        let summary = dispatch_events(&event_envelope(&events), &mut handler).unwrap();

        assert_eq!(summary.dispatched, 1);
        let abort = summary.abort.expect("abort record");
        assert_eq!(abort.index, 1);
        assert_eq!(abort.kind, u16::from(EventType::Mouse));
        assert!(matches!(abort.error, WireError::Handler(_)));
        assert_eq!(handler.events.len(), 1);
    }

    #[test]
    fn truncated_known_body_is_fatal() {
        let mut buf = WireBuffer::with_capacity(64);
        begin_envelope(&mut buf);
        write_message(&mut buf, u16::from(EventType::Mouse), |b| {
            b.write_u16(0); // 2 bytes where the record needs 8
            Ok(())
        })
        .unwrap();
        finish_envelope(&mut buf, 1).unwrap();
        let envelope = Envelope::parse(buf.as_slice()).unwrap();

        let err = dispatch_events(&envelope, &mut RecordingInput::default()).unwrap_err();
        assert!(matches!(err, WireError::ShortRead { .. }));
    }

    #[test]
    fn update_markers_and_orders() {
        let orders = vec![
            UpdateOrder::BeginUpdate,
            UpdateOrder::OpaqueRect(OpaqueRect {
                rect: Rect::new(0, 0, 10, 10),
                color: 7,
            }),
            UpdateOrder::EndUpdate,
        ];
        let mut handler = RecordingUpdates::default();
        let mut attachment = None;
        let summary =
            dispatch_updates(&order_envelope(&orders), &mut handler, &mut attachment).unwrap();

        assert_eq!(summary.dispatched, 3);
        assert_eq!(handler.orders, vec!["begin", "opaque:7", "end"]);
    }

    #[test]
    fn paint_rect_resolves_attachment() {
        let fb = sample_fb(42);
        let orders = vec![
            // Segment reference before any attach: unresolved.
            UpdateOrder::PaintRect(PaintRect {
                rect: Rect::new(0, 0, 4, 4),
                src: Point::new(0, 0),
                segment_id: 42,
                bitmap: Bytes::new(),
            }),
            UpdateOrder::AttachFramebuffer(AttachFramebuffer {
                attach: true,
                info: fb,
            }),
            UpdateOrder::PaintRect(PaintRect {
                rect: Rect::new(0, 0, 4, 4),
                src: Point::new(0, 0),
                segment_id: 42,
                bitmap: Bytes::new(),
            }),
            // Inline bitmap ignores the attachment.
            UpdateOrder::PaintRect(PaintRect {
                rect: Rect::new(0, 0, 1, 1),
                src: Point::new(0, 0),
                segment_id: 0,
                bitmap: Bytes::from_static(&[0; 4]),
            }),
        ];
        let mut handler = RecordingUpdates::default();
        let mut attachment = None;
        dispatch_updates(&order_envelope(&orders), &mut handler, &mut attachment).unwrap();

        assert_eq!(
            handler.paint_framebuffers,
            vec![None, Some(fb), None]
        );
        assert_eq!(attachment, Some(fb));
    }

    #[test]
    fn detach_clears_attachment() {
        let fb = sample_fb(9);
        let orders = vec![
            UpdateOrder::AttachFramebuffer(AttachFramebuffer {
                attach: true,
                info: fb,
            }),
            UpdateOrder::AttachFramebuffer(AttachFramebuffer {
                attach: false,
                info: fb,
            }),
        ];
        let mut attachment = None;
        dispatch_updates(
            &order_envelope(&orders),
            &mut RecordingUpdates::default(),
            &mut attachment,
        )
        .unwrap();
        assert_eq!(attachment, None);
    }

    #[test]
    fn default_handler_discards_everything() {
        struct Discard;
        impl UpdateHandler for Discard {}

        let orders = vec![
            UpdateOrder::BeginUpdate,
            UpdateOrder::SetClip(SetClip { rect: None }),
            UpdateOrder::WindowDelete(WindowDelete { window_id: 3 }),
            UpdateOrder::EndUpdate,
        ];
        let mut attachment = None;
        let summary = dispatch_updates(
            &order_envelope(&orders),
            &mut Discard,
            &mut attachment,
        )
        .unwrap();
        assert_eq!(summary.dispatched, 4);
        assert!(summary.is_clean());
    }
}
