//! Stream decoder that reassembles envelopes from arbitrary read
//! boundaries.
//!
//! The duplex pipe delivers bytes, not frames: a single `read` may
//! return half a header, three envelopes, or anything in between.
//! [`EnvelopeCodec`] buffers until the declared `total_length` is
//! present, then hands the complete [`Envelope`] up. Used through
//! `tokio_util::codec::FramedRead` on the read half of a connection.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::envelope::{Envelope, EnvelopeHeader, ENVELOPE_HEADER_SIZE, MAX_ENVELOPE_SIZE};
use crate::error::WireError;

/// Length-prefixed envelope decoder.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    max_envelope: usize,
}

impl EnvelopeCodec {
    pub fn new() -> Self {
        Self {
            max_envelope: MAX_ENVELOPE_SIZE,
        }
    }

    /// Overrides the size ceiling, mainly for tests.
    pub fn with_max_envelope(max_envelope: usize) -> Self {
        Self { max_envelope }
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>, WireError> {
        if src.len() < ENVELOPE_HEADER_SIZE {
            // Keep accumulating until the header is complete.
            return Ok(None);
        }

        let header = EnvelopeHeader::decode(&src[..ENVELOPE_HEADER_SIZE])?;
        let total = header.total_length as usize;

        if total < ENVELOPE_HEADER_SIZE {
            return Err(WireError::MalformedEnvelope(
                "total length smaller than the envelope header",
            ));
        }
        if total > self.max_envelope {
            return Err(WireError::EnvelopeTooLarge {
                size: total,
                max: self.max_envelope,
            });
        }
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total).freeze();
        Ok(Some(Envelope::from_parts(
            header.message_count,
            frame.slice(ENVELOPE_HEADER_SIZE..),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::WireBuffer;
    use crate::envelope::{begin_envelope, finish_envelope, write_message};
    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    fn sample_frame() -> Vec<u8> {
        let mut buf = WireBuffer::with_capacity(64);
        begin_envelope(&mut buf);
        write_message(&mut buf, 0x0001, |b| {
            b.write_u32(0xCAFE_F00D);
            Ok(())
        })
        .unwrap();
        write_message(&mut buf, 0x0105, |b| {
            b.write_bytes(b"rect");
            Ok(())
        })
        .unwrap();
        finish_envelope(&mut buf, 2).unwrap();
        buf.as_slice().to_vec()
    }

    #[test]
    fn decodes_complete_frame() {
        let frame = sample_frame();
        let mut codec = EnvelopeCodec::new();
        let mut src = BytesMut::from(&frame[..]);

        let env = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(env.message_count(), 2);
        assert!(src.is_empty());
    }

    #[test]
    fn accumulates_across_every_split_point() {
        let frame = sample_frame();
        let mut codec = EnvelopeCodec::new();

        // Feed the frame split at every possible boundary; the codec
        // must return None until the last byte lands.
        for split in 1..frame.len() {
            let mut src = BytesMut::from(&frame[..split]);
            assert!(
                codec.decode(&mut src).unwrap().is_none(),
                "premature decode at split {split}"
            );
            src.extend_from_slice(&frame[split..]);
            let env = codec.decode(&mut src).unwrap().unwrap();
            assert_eq!(env.message_count(), 2);
        }
    }

    #[test]
    fn decodes_back_to_back_frames() {
        let frame = sample_frame();
        let mut codec = EnvelopeCodec::new();
        let mut src = BytesMut::new();
        src.extend_from_slice(&frame);
        src.extend_from_slice(&frame);

        assert!(codec.decode(&mut src).unwrap().is_some());
        assert!(codec.decode(&mut src).unwrap().is_some());
        assert!(codec.decode(&mut src).unwrap().is_none());
        assert!(src.is_empty());
    }

    #[test]
    fn rejects_undersized_total_length() {
        let mut src = BytesMut::new();
        src.extend_from_slice(&4u32.to_le_bytes());
        src.extend_from_slice(&0u32.to_le_bytes());
        let err = EnvelopeCodec::new().decode(&mut src).unwrap_err();
        assert!(matches!(err, WireError::MalformedEnvelope(_)));
    }

    #[test]
    fn rejects_oversized_total_length() {
        let mut src = BytesMut::new();
        src.extend_from_slice(&1024u32.to_le_bytes());
        src.extend_from_slice(&1u32.to_le_bytes());
        let err = EnvelopeCodec::with_max_envelope(512)
            .decode(&mut src)
            .unwrap_err();
        assert!(matches!(
            err,
            WireError::EnvelopeTooLarge {
                size: 1024,
                max: 512
            }
        ));
    }

    #[tokio::test]
    async fn framed_read_over_fragmented_stream() {
        let frame = sample_frame();
        // Deliver the frame in three uneven chunks.
        let mock = tokio_test::io::Builder::new()
            .read(&frame[..3])
            .read(&frame[3..10])
            .read(&frame[10..])
            .build();

        let mut framed = FramedRead::new(mock, EnvelopeCodec::new());
        let env = framed.next().await.unwrap().unwrap();
        assert_eq!(env.message_count(), 2);

        let kinds: Vec<u16> = env
            .messages()
            .map(|m| m.map(|m| m.kind))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(kinds, vec![0x0001, 0x0105]);
    }
}
