//! # orderwire-core
//!
//! Inter-process transport between a display driver and the session
//! service of a remote-desktop stack. The two sides talk over a duplex
//! byte channel carrying length-prefixed envelopes, each holding a run
//! of typed sub-messages: input events flowing toward the display,
//! update orders flowing toward the service.
//!
//! This crate contains:
//! - **Buffer**: `WireBuffer` / `WireReader` for little-endian wire I/O
//!   with seek-back header patching
//! - **Envelope**: the outer framing (total length + message count) and
//!   the per-message kind/length headers
//! - **Codec**: `EnvelopeCodec` for framed stream I/O via `tokio_util`
//! - **Protocol**: the typed input event and update order records
//! - **Dispatch**: handler traits plus the realigning per-envelope
//!   dispatch loop
//! - **Batch**: `BatchState`, the bracketed accumulator that seals
//!   update runs into transmit-ready envelopes
//! - **Channel**: socket naming, listen/connect endpoints, and the
//!   framed connection
//! - **Service**: `DisplayService` / `DisplayChannel` / `ServiceChannel`
//!   session objects tying the layers together
//! - **Error**: `WireError` — typed, `thiserror`-based error hierarchy

pub mod batch;
pub mod buffer;
pub mod channel;
pub mod codec;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod message;
pub mod protocol;
pub mod service;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use batch::{BatchState, DEFAULT_BATCH_CAPACITY};
pub use buffer::{WireBuffer, WireReader};
pub use channel::{ChannelConnection, ChannelId, ChannelListener, LinkState};
pub use codec::EnvelopeCodec;
pub use dispatch::{DispatchAbort, DispatchSummary, InputHandler, UpdateHandler};
pub use envelope::{Envelope, RawMessage, ENVELOPE_HEADER_SIZE, MAX_ENVELOPE_SIZE, MESSAGE_HEADER_SIZE};
pub use error::WireError;
pub use message::{EventType, OrderType};
pub use protocol::{FramebufferInfo, InputEvent, UpdateOrder};
pub use service::{ChannelHooks, DisplayChannel, DisplayService, NoHooks, ServiceChannel};
