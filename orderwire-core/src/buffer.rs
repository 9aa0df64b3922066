//! Cursor-addressed scratch buffer for assembling wire frames.
//!
//! [`WireBuffer`] supports the rewind-and-patch pattern the envelope
//! layer depends on: headers are written as placeholders first, the
//! body is appended behind them, then the cursor seeks back and
//! overwrites the placeholder with the now-known lengths.
//!
//! The buffer tracks two positions:
//!
//! ```text
//!   0          pos              end        capacity
//!   |-----------|----------------|------------|
//!    written     written          uninitialized
//!    (behind     (ahead of
//!     cursor)     cursor)
//! ```
//!
//! `pos` is the write cursor; `end` is the sealed high-water mark.
//! Writing past `end` extends it, writing behind it (after a seek)
//! patches in place. All integers are little-endian on the wire.
//!
//! [`WireReader`] is the borrowing counterpart: bounds-checked reads
//! over a received frame, used by decoders and handlers.

use crate::error::WireError;

// ── WireBuffer ───────────────────────────────────────────────────

/// Growable write buffer with a seekable cursor.
#[derive(Debug, Default)]
pub struct WireBuffer {
    data: Vec<u8>,
    pos: usize,
    end: usize,
}

impl WireBuffer {
    /// Creates an empty buffer that can hold `capacity` bytes before
    /// reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            pos: 0,
            end: 0,
        }
    }

    /// Current write cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// High-water mark: the number of valid bytes written so far.
    pub fn sealed_len(&self) -> usize {
        self.end
    }

    /// Bytes the buffer can hold before growing.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Rewinds the cursor to zero and forgets all written content.
    /// Capacity is retained.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.end = 0;
    }

    /// Grows the backing store so at least `additional` bytes can be
    /// written at the current cursor without reallocating again.
    pub fn ensure_capacity(&mut self, additional: usize) {
        let needed = self.pos + additional;
        if needed > self.data.len() {
            // Double-or-fit keeps repeated small appends amortized.
            let target = needed.max(self.data.len() * 2);
            self.data.resize(target, 0);
        }
    }

    /// Moves the cursor to an absolute offset inside the written
    /// region. Seeking past the sealed end is rejected so a patch can
    /// never target uninitialized bytes.
    pub fn seek(&mut self, pos: usize) -> Result<(), WireError> {
        if pos > self.end {
            return Err(WireError::SeekOutOfBounds {
                target: pos,
                end: self.end,
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Marks everything up to the cursor as valid and returns the
    /// sealed length.
    pub fn seal(&mut self) -> usize {
        self.end = self.end.max(self.pos);
        self.end
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
        self.end = self.end.max(self.pos);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.ensure_capacity(1);
        self.data[self.pos] = v;
        self.advance(1);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.ensure_capacity(2);
        self.data[self.pos..self.pos + 2].copy_from_slice(&v.to_le_bytes());
        self.advance(2);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.ensure_capacity(4);
        self.data[self.pos..self.pos + 4].copy_from_slice(&v.to_le_bytes());
        self.advance(4);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.ensure_capacity(4);
        self.data[self.pos..self.pos + 4].copy_from_slice(&v.to_le_bytes());
        self.advance(4);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.ensure_capacity(bytes.len());
        self.data[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.advance(bytes.len());
    }

    /// The sealed content as a contiguous slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.end]
    }
}

// ── WireReader ───────────────────────────────────────────────────

/// Bounds-checked little-endian reader over a received frame.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes left between the cursor and the end of the frame.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn check(&self, needed: usize) -> Result<(), WireError> {
        if self.remaining() < needed {
            return Err(WireError::ShortRead {
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        self.check(1)?;
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        self.check(2)?;
        let v = u16::from_le_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        self.check(4)?;
        let v = u32::from_le_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        Ok(self.read_u32()? as i32)
    }

    /// Borrows the next `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        self.check(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Skips `n` bytes, e.g. the unread tail of a padded message.
    pub fn skip(&mut self, n: usize) -> Result<(), WireError> {
        self.check(n)?;
        self.pos += n;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let mut buf = WireBuffer::with_capacity(16);
        buf.write_u8(0xAB);
        buf.write_u16(0x1234);
        buf.write_u32(0xDEADBEEF);
        buf.write_i32(-7);
        assert_eq!(buf.sealed_len(), 11);

        let mut rd = WireReader::new(buf.as_slice());
        assert_eq!(rd.read_u8().unwrap(), 0xAB);
        assert_eq!(rd.read_u16().unwrap(), 0x1234);
        assert_eq!(rd.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(rd.read_i32().unwrap(), -7);
        assert_eq!(rd.remaining(), 0);
    }

    #[test]
    fn little_endian_layout() {
        let mut buf = WireBuffer::with_capacity(4);
        buf.write_u32(0x0403_0201);
        assert_eq!(buf.as_slice(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn seek_and_patch() {
        let mut buf = WireBuffer::with_capacity(16);
        buf.write_u32(0); // placeholder
        buf.write_bytes(b"payload");
        let total = buf.seal() as u32;

        buf.seek(0).unwrap();
        buf.write_u32(total);
        buf.seek(total as usize).unwrap();

        let mut rd = WireReader::new(buf.as_slice());
        assert_eq!(rd.read_u32().unwrap(), 11);
        assert_eq!(rd.read_bytes(7).unwrap(), b"payload");
    }

    #[test]
    fn seek_past_sealed_end_rejected() {
        let mut buf = WireBuffer::with_capacity(8);
        buf.write_u32(1);
        let err = buf.seek(5).unwrap_err();
        assert!(matches!(
            err,
            WireError::SeekOutOfBounds { target: 5, end: 4 }
        ));
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut buf = WireBuffer::with_capacity(2);
        buf.write_bytes(&[0u8; 100]);
        assert_eq!(buf.sealed_len(), 100);
        assert!(buf.capacity() >= 100);
    }

    #[test]
    fn patch_does_not_shrink_sealed_end() {
        let mut buf = WireBuffer::with_capacity(16);
        buf.write_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);
        buf.seek(2).unwrap();
        buf.write_u16(0xFFFF);
        assert_eq!(buf.sealed_len(), 8);
        assert_eq!(buf.position(), 4);
    }

    #[test]
    fn reader_short_read() {
        let data = [1u8, 2];
        let mut rd = WireReader::new(&data);
        let err = rd.read_u32().unwrap_err();
        assert!(matches!(
            err,
            WireError::ShortRead {
                needed: 4,
                available: 2
            }
        ));
        // Failed read leaves the cursor where it was.
        assert_eq!(rd.read_u16().unwrap(), 0x0201);
    }

    #[test]
    fn reset_retains_capacity() {
        let mut buf = WireBuffer::with_capacity(4);
        buf.write_bytes(&[0u8; 64]);
        let cap = buf.capacity();
        buf.reset();
        assert_eq!(buf.sealed_len(), 0);
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.capacity(), cap);
    }
}
