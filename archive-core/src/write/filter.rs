//! One link in the write pipeline (spec.md §4.2). Mirror of the read
//! side: the leaf wraps the client sink, everything above it is a codec.

use crate::error::Result;
use crate::transfer::WriteSink;

/// A single link in the write pipeline.
pub trait WriteFilter {
    fn name(&self) -> &str;

    /// Accepts a batch of bytes; may buffer, compress, or split them.
    /// Returns the number of bytes accepted (always `buf.len()` on
    /// success — filters buffer internally rather than ever reporting a
    /// short write).
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Forces any internal buffer downstream without closing the codec.
    fn flush(&mut self) -> Result<()>;

    /// Final flush, writes codec trailers if any, propagates close to
    /// upstream.
    fn close(&mut self) -> Result<()>;

    fn bytes_written(&self) -> u64;
}

/// Filter 0 on the write side: wraps the client's byte sink directly.
pub struct IdentityWriter<W> {
    sink: W,
    opened: bool,
    written: u64,
}

impl<W: WriteSink> IdentityWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            opened: false,
            written: 0,
        }
    }

    fn ensure_open(&mut self) -> Result<()> {
        if !self.opened {
            self.sink.open()?;
            self.opened = true;
        }
        Ok(())
    }
}

impl<W: WriteSink> WriteFilter for IdentityWriter<W> {
    fn name(&self) -> &str {
        "none"
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let mut total = 0;
        while total < buf.len() {
            let n = self.sink.write(&buf[total..])?;
            if n == 0 {
                return Err(crate::error::Error::fatal(
                    "client sink accepted zero bytes; cannot make progress",
                ));
            }
            total += n;
        }
        self.written += total as u64;
        Ok(total)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        Ok(self.sink.close()?)
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}
