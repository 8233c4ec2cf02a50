//! The growable read-ahead buffer shared by the client-source leaf and by
//! every codec filter above it (spec.md §4.1 "Zero-copy rule").
//!
//! A `BlockBuffer` holds one filter's output. As long as a caller's
//! `read_ahead(min)` request is already satisfied by bytes sitting in the
//! buffer, the caller gets a pointer straight into it — no allocation,
//! no copy. Only when a request would need bytes not yet pulled in does
//! the buffer grow (and compact its unconsumed tail to the front) to
//! fetch more. The buffer never shrinks, which bounds the total copying
//! done across a stream's lifetime to O(stream length) even against an
//! adversarial sequence of `min` values, per spec.md §4.1.

use std::io;

pub struct BlockBuffer {
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    eof: bool,
    consumed_total: u64,
}

/// Default chunk size pulled from upstream on each fill attempt.
const FILL_CHUNK: usize = 64 * 1024;

impl BlockBuffer {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            filled: 0,
            eof: false,
            consumed_total: 0,
        }
    }

    pub fn available(&self) -> usize {
        self.filled - self.pos
    }

    pub fn data(&self) -> &[u8] {
        &self.buf[self.pos..self.filled]
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.consumed_total
    }

    /// Advances the logical position by `n` bytes (n must be `<=
    /// available()`).
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.available());
        self.pos += n;
        self.consumed_total += n as u64;
        n
    }

    /// Ensures at least `min` bytes are available (or EOF is reached),
    /// pulling more data through `fill` as needed. `fill` receives a
    /// mutable slice to write into and returns the number of bytes
    /// written, with `0` meaning EOF — the same convention as
    /// [`crate::transfer::ReadSource::read`].
    pub fn ensure(
        &mut self,
        min: usize,
        mut fill: impl FnMut(&mut [u8]) -> io::Result<usize>,
    ) -> io::Result<()> {
        if self.available() >= min || self.eof {
            return Ok(());
        }

        // Compact: slide the unconsumed tail to the front so we don't
        // grow the buffer for bytes the caller has already consumed.
        if self.pos > 0 {
            self.buf.copy_within(self.pos..self.filled, 0);
            self.filled -= self.pos;
            self.pos = 0;
        }

        if self.buf.len() < min {
            self.buf.resize(min.max(FILL_CHUNK), 0);
        }

        while self.filled < min && !self.eof {
            if self.filled == self.buf.len() {
                let grow_to = (self.buf.len() * 2).max(min);
                self.buf.resize(grow_to, 0);
            }
            let n = fill(&mut self.buf[self.filled..])?;
            if n == 0 {
                self.eof = true;
                break;
            }
            self.filled += n;
        }
        Ok(())
    }

    pub fn is_eof_and_empty(&self) -> bool {
        self.eof && self.available() == 0
    }
}

impl Default for BlockBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_copy_when_already_buffered() {
        let mut b = BlockBuffer::new();
        let src = b"hello, world!".to_vec();
        let mut cursor = 0usize;
        b.ensure(5, |dst| {
            let n = (src.len() - cursor).min(dst.len());
            dst[..n].copy_from_slice(&src[cursor..cursor + n]);
            cursor += n;
            Ok(n)
        })
        .unwrap();
        assert!(b.available() >= 5);
        assert_eq!(&b.data()[..5], b"hello");
        b.consume(5);
        assert_eq!(b.data(), b", world!");
    }

    #[test]
    fn grows_monotonically_across_straddling_requests() {
        let mut b = BlockBuffer::new();
        let src: Vec<u8> = (0..200u16).map(|i| (i % 256) as u8).collect();
        let mut cursor = 0usize;
        let mut fill = |dst: &mut [u8]| -> io::Result<usize> {
            let n = (src.len() - cursor).min(dst.len()).min(10);
            dst[..n].copy_from_slice(&src[cursor..cursor + n]);
            cursor += n;
            Ok(n)
        };
        b.ensure(150, &mut fill).unwrap();
        assert!(b.available() >= 150);
        b.consume(150);
        b.ensure(40, &mut fill).unwrap();
        assert!(b.available() >= 40);
    }

    #[test]
    fn eof_short_read() {
        let mut b = BlockBuffer::new();
        b.ensure(100, |_| Ok(0)).unwrap();
        assert_eq!(b.available(), 0);
        assert!(b.is_eof_and_empty());
    }
}
