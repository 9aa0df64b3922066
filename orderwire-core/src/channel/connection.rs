//! One established duplex connection.
//!
//! The read half runs through [`EnvelopeCodec`] so receives always
//! surface complete envelopes; the write half sends whole frames,
//! looping internally until every byte is accepted. Partial transfers
//! are invisible to callers in both directions. End-of-stream on an
//! open connection is a disconnect, never a retryable condition.

use std::io;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio_util::codec::FramedRead;
use tracing::trace;

use crate::codec::EnvelopeCodec;
use crate::envelope::Envelope;
use crate::error::WireError;

/// A connected channel endpoint.
#[derive(Debug)]
pub struct ChannelConnection {
    reader: FramedRead<OwnedReadHalf, EnvelopeCodec>,
    writer: OwnedWriteHalf,
}

impl ChannelConnection {
    pub(crate) fn new(stream: UnixStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: FramedRead::new(read_half, EnvelopeCodec::new()),
            writer: write_half,
        }
    }

    /// Awaits the next complete envelope.
    ///
    /// Disconnect-shaped I/O errors and end-of-stream both normalize
    /// to [`WireError::Disconnected`]; framing errors pass through and
    /// are fatal to the connection.
    pub async fn recv(&mut self) -> Result<Envelope, WireError> {
        match self.reader.next().await {
            Some(Ok(envelope)) => {
                trace!(
                    messages = envelope.message_count(),
                    bytes = envelope.body().len(),
                    "envelope received"
                );
                Ok(envelope)
            }
            Some(Err(e)) if e.is_disconnect() => Err(WireError::Disconnected),
            Some(Err(e)) => Err(e),
            None => Err(WireError::Disconnected),
        }
    }

    /// Sends one complete frame; all-or-error.
    pub async fn send(&mut self, frame: &[u8]) -> Result<(), WireError> {
        self.writer
            .write_all(frame)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::WriteZero
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted => WireError::Disconnected,
                _ => WireError::Io(e),
            })?;
        trace!(bytes = frame.len(), "frame sent");
        Ok(())
    }

    /// Half-closes the write side. Idempotent; safe after the peer is
    /// already gone.
    pub async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}
