//! Envelope framing: the outer container every transmission uses.
//!
//! An envelope carries one or more sub-messages between the producer
//! and consumer endpoints. Both headers use little-endian integers.
//!
//! Envelope header (8 bytes), followed by the payload:
//!
//! | Offset | Size | Field           | Notes                          |
//! |--------|------|-----------------|--------------------------------|
//! | 0      | 4    | `total_length`  | Whole frame, header included   |
//! | 4      | 4    | `message_count` | Sub-messages in the payload    |
//!
//! Sub-message header (6 bytes), followed by the message body:
//!
//! | Offset | Size | Field    | Notes                               |
//! |--------|------|----------|-------------------------------------|
//! | 0      | 2    | `kind`   | Message type discriminant           |
//! | 2      | 4    | `length` | Header + body, so body = length - 6 |
//!
//! Sub-message lengths are authoritative: the reader always advances
//! to the declared boundary, so a handler that leaves part of a body
//! unread (or a type nobody recognizes) never desynchronizes the
//! stream.

use bytes::Bytes;

use crate::buffer::WireBuffer;
use crate::error::WireError;

/// Envelope header length in bytes.
pub const ENVELOPE_HEADER_SIZE: usize = 8;

/// Sub-message header length in bytes.
pub const MESSAGE_HEADER_SIZE: usize = 6;

/// Hard upper bound on a single envelope. A declared length beyond
/// this is treated as corruption rather than a request for memory.
pub const MAX_ENVELOPE_SIZE: usize = 16 * 1024 * 1024;

// ── Headers ──────────────────────────────────────────────────────

/// The fixed-size header that opens every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    /// Total frame length including these 8 bytes.
    pub total_length: u32,
    /// Number of sub-messages in the payload.
    pub message_count: u32,
}

impl EnvelopeHeader {
    pub const SIZE: usize = ENVELOPE_HEADER_SIZE;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.total_length.to_le_bytes());
        buf[4..8].copy_from_slice(&self.message_count.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < Self::SIZE {
            return Err(WireError::ShortHeader {
                needed: Self::SIZE,
                available: data.len(),
            });
        }
        Ok(Self {
            total_length: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            message_count: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
        })
    }
}

/// The fixed-size header that opens every sub-message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Message type discriminant.
    pub kind: u16,
    /// Sub-message length including these 6 bytes.
    pub length: u32,
}

impl MessageHeader {
    pub const SIZE: usize = MESSAGE_HEADER_SIZE;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..2].copy_from_slice(&self.kind.to_le_bytes());
        buf[2..6].copy_from_slice(&self.length.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < Self::SIZE {
            return Err(WireError::ShortHeader {
                needed: Self::SIZE,
                available: data.len(),
            });
        }
        Ok(Self {
            kind: u16::from_le_bytes([data[0], data[1]]),
            length: u32::from_le_bytes([data[2], data[3], data[4], data[5]]),
        })
    }
}

// ── Envelope ─────────────────────────────────────────────────────

/// A received frame: declared message count plus the raw payload
/// (everything after the 8-byte envelope header).
#[derive(Debug, Clone)]
pub struct Envelope {
    message_count: u32,
    body: Bytes,
}

impl Envelope {
    /// Assembles an envelope from an already-validated header and
    /// payload. The codec uses this after length-checking the frame.
    pub(crate) fn from_parts(message_count: u32, body: Bytes) -> Self {
        Self {
            message_count,
            body,
        }
    }

    /// Parses a complete frame, header included, validating that the
    /// declared total length matches the bytes actually present.
    pub fn parse(frame: &[u8]) -> Result<Self, WireError> {
        let header = EnvelopeHeader::decode(frame)?;
        if header.total_length as usize != frame.len() {
            return Err(WireError::MalformedEnvelope(
                "declared total length does not match frame size",
            ));
        }
        Ok(Self {
            message_count: header.message_count,
            body: Bytes::copy_from_slice(&frame[ENVELOPE_HEADER_SIZE..]),
        })
    }

    pub fn message_count(&self) -> u32 {
        self.message_count
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Iterates the sub-messages in wire order.
    pub fn messages(&self) -> MessageIter {
        MessageIter {
            body: self.body.clone(),
            count: self.message_count,
            offset: 0,
            yielded: 0,
            done: false,
        }
    }
}

/// One sub-message lifted out of an envelope. `body` excludes the
/// 6-byte header.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub kind: u16,
    pub body: Bytes,
}

/// Walks an envelope payload, advancing by each declared length.
///
/// Yields an error and then fuses when the payload is inconsistent
/// with the declared count or lengths. Structural problems here are
/// fatal to the connection; the dispatcher surfaces them as such.
pub struct MessageIter {
    body: Bytes,
    count: u32,
    offset: usize,
    yielded: u32,
    done: bool,
}

impl Iterator for MessageIter {
    type Item = Result<RawMessage, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.yielded == self.count {
            if self.offset < self.body.len() {
                self.done = true;
                return Some(Err(WireError::MalformedEnvelope(
                    "trailing bytes after final message",
                )));
            }
            return None;
        }
        let header = match MessageHeader::decode(&self.body[self.offset..]) {
            Ok(h) => h,
            Err(_) => {
                self.done = true;
                return Some(Err(WireError::MalformedEnvelope(
                    "truncated message header",
                )));
            }
        };
        let length = header.length as usize;
        if length < MESSAGE_HEADER_SIZE {
            self.done = true;
            return Some(Err(WireError::MalformedEnvelope(
                "message length smaller than its own header",
            )));
        }
        let end = self.offset + length;
        if end > self.body.len() {
            self.done = true;
            return Some(Err(WireError::MalformedEnvelope(
                "message length exceeds envelope payload",
            )));
        }
        let body = self.body.slice(self.offset + MESSAGE_HEADER_SIZE..end);
        self.offset = end;
        self.yielded += 1;
        Some(Ok(RawMessage {
            kind: header.kind,
            body,
        }))
    }
}

// ── Writer-side assembly ─────────────────────────────────────────

/// Starts a fresh envelope: clears the buffer and reserves the 8-byte
/// header as a placeholder to be patched by [`finish_envelope`].
pub fn begin_envelope(buf: &mut WireBuffer) {
    buf.reset();
    buf.write_u32(0); // total_length, patched on finish
    buf.write_u32(0); // message_count, patched on finish
}

/// Seals the envelope: patches the header with the final length and
/// message count, restores the cursor, and returns the frame length.
pub fn finish_envelope(buf: &mut WireBuffer, message_count: u32) -> Result<usize, WireError> {
    let total = buf.seal();
    buf.seek(0)?;
    buf.write_u32(total as u32);
    buf.write_u32(message_count);
    buf.seek(total)?;
    Ok(total)
}

/// Appends one sub-message: writes the 6-byte header with a length
/// placeholder, lets `body` fill in the payload, then rewinds and
/// patches the real length.
pub fn write_message<F>(buf: &mut WireBuffer, kind: u16, body: F) -> Result<(), WireError>
where
    F: FnOnce(&mut WireBuffer) -> Result<(), WireError>,
{
    let start = buf.position();
    buf.write_u16(kind);
    buf.write_u32(0); // length, patched below
    body(buf)?;
    let end = buf.position();
    buf.seek(start + 2)?;
    buf.write_u32((end - start) as u32);
    buf.seek(end)?;
    Ok(())
}
