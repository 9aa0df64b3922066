//! Update batching: accumulates drawing orders between begin/end
//! brackets into a single outbound envelope.
//!
//! ```text
//!          begin / push              finish
//!   Idle ───────────────▶ Active ────────────▶ Idle
//!                           │   ▲
//!                           └───┘
//!                     push under capacity pressure:
//!                     seal current batch, open a fresh one
//! ```
//!
//! The state machine is synchronous and performs no I/O. Sealed
//! frames are returned to the caller, which owns transmission; a
//! `push` that triggers an early flush returns the sealed previous
//! batch while the new order rides the fresh one. Begin and end
//! markers count toward the envelope's message count like any other
//! sub-message.

use tracing::trace;

use crate::buffer::WireBuffer;
use crate::envelope::{begin_envelope, finish_envelope, write_message};
use crate::error::WireError;
use crate::message::OrderType;
use crate::protocol::UpdateOrder;

/// Default soft ceiling on an accumulating batch, in bytes.
pub const DEFAULT_BATCH_CAPACITY: usize = 64 * 1024;

/// Producer-side accumulation state, one per channel.
#[derive(Debug)]
pub struct BatchState {
    buf: WireBuffer,
    scratch: WireBuffer,
    active: bool,
    pending: u32,
    soft_capacity: usize,
}

impl BatchState {
    pub fn new(soft_capacity: usize) -> Self {
        Self {
            buf: WireBuffer::with_capacity(soft_capacity),
            scratch: WireBuffer::with_capacity(256),
            active: false,
            pending: 0,
            soft_capacity,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Sub-messages accumulated so far, markers included. Zero
    /// whenever the batch is idle.
    pub fn pending_count(&self) -> u32 {
        self.pending
    }

    /// Adjusts the soft ceiling; applies from the next `push`.
    pub fn set_capacity(&mut self, soft_capacity: usize) {
        self.soft_capacity = soft_capacity;
    }

    /// Opens a batch. A second call while one is open is a no-op.
    pub fn begin(&mut self) -> Result<(), WireError> {
        if self.active {
            return Ok(());
        }
        self.start()
    }

    /// Appends one order, opening a batch first if none is active.
    ///
    /// When appending would push the accumulated batch past the soft
    /// capacity, the current batch is sealed and returned for
    /// transmission and the order is written into a fresh batch. A
    /// batch holding nothing but its begin marker never flushes early;
    /// a single oversized order grows the buffer instead.
    pub fn push(&mut self, order: &UpdateOrder) -> Result<Option<Vec<u8>>, WireError> {
        if !self.active {
            self.start()?;
        }

        self.scratch.reset();
        write_message(&mut self.scratch, order.order_type().into(), |b| {
            order.encode_body(b)
        })?;
        let encoded = self.scratch.sealed_len();

        let mut flushed = None;
        if self.pending > 1 && self.buf.sealed_len() + encoded > self.soft_capacity {
            flushed = Some(self.seal()?);
            self.start()?;
        }

        self.buf.write_bytes(self.scratch.as_slice());
        self.pending += 1;
        Ok(flushed)
    }

    /// Closes the batch: appends the end marker, patches the envelope
    /// header, and returns the sealed frame. `None` when no batch is
    /// open.
    pub fn finish(&mut self) -> Result<Option<Vec<u8>>, WireError> {
        if !self.active {
            return Ok(None);
        }
        let frame = self.seal()?;
        self.active = false;
        self.pending = 0;
        Ok(Some(frame))
    }

    /// Drops any accumulated batch without transmitting, e.g. on
    /// disconnect. Partial batches are never sent.
    pub fn reset(&mut self) {
        self.active = false;
        self.pending = 0;
        self.buf.reset();
    }

    fn start(&mut self) -> Result<(), WireError> {
        begin_envelope(&mut self.buf);
        write_message(&mut self.buf, OrderType::BeginUpdate.into(), |_| Ok(()))?;
        self.active = true;
        self.pending = 1;
        trace!("update batch opened");
        Ok(())
    }

    fn seal(&mut self) -> Result<Vec<u8>, WireError> {
        write_message(&mut self.buf, OrderType::EndUpdate.into(), |_| Ok(()))?;
        let count = self.pending + 1;
        let total = finish_envelope(&mut self.buf, count)?;
        trace!(messages = count, bytes = total, "update batch sealed");
        Ok(self.buf.as_slice().to_vec())
    }
}
