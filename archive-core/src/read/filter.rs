//! One link in the read pipeline (spec.md §4.1).
//!
//! Filter 0 is the client-callback leaf ([`IdentityReader`]); everything
//! above it is a codec pushed on by [`crate::read::autodetect`] or added
//! explicitly by a caller. Each element owns its upstream outright:
//! closing the top cascades through every filter beneath it.

use crate::error::Result;
use crate::transfer::{ReadSource, SeekableReadSource};

use super::buffer::BlockBuffer;

/// A single link in the read pipeline.
pub trait ReadFilter {
    /// Human-readable name, used in filter listing / error messages.
    fn name(&self) -> &str;

    /// Returns a contiguous buffer holding at least `min` bytes from the
    /// current position, or fewer only at end-of-stream. Does not
    /// advance position.
    fn read_ahead(&mut self, min: usize) -> Result<&[u8]>;

    /// Advances the logical position by `n` bytes (`n <=` bytes last
    /// returned by `read_ahead`). Returns the amount actually consumed.
    fn consume(&mut self, n: usize) -> Result<usize>;

    /// Skips `n` bytes, possibly via a faster mechanism than
    /// read+discard. Returns `0` if not supported (caller falls back to
    /// read+discard via `read_ahead`/`consume`), otherwise the number of
    /// bytes actually skipped.
    fn skip(&mut self, n: u64) -> Result<u64> {
        let _ = n;
        Ok(0)
    }

    fn close(&mut self) -> Result<()>;

    /// Monotonic count of bytes this filter has produced (consumed at
    /// its output), for `archive_filter_bytes`-style reporting.
    fn bytes_consumed(&self) -> u64;
}

/// Filter 0: wraps the client's byte source directly.
pub struct IdentityReader<S> {
    source: S,
    buffer: BlockBuffer,
    opened: bool,
    /// Set only by [`Self::new_seekable`]: a real seek-based skip instead
    /// of `S::skip`'s default no-op.
    seek_skip: Option<fn(&mut S, u64) -> std::io::Result<u64>>,
}

impl<S: ReadSource> IdentityReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffer: BlockBuffer::new(),
            opened: false,
            seek_skip: None,
        }
    }

    fn ensure_open(&mut self) -> Result<()> {
        if !self.opened {
            self.source.open()?;
            self.opened = true;
        }
        Ok(())
    }
}

impl<S: SeekableReadSource> IdentityReader<S> {
    /// Wraps a source whose `skip` can go through a real seek (e.g. a
    /// regular file) instead of the read+discard fallback.
    pub fn new_seekable(source: S) -> Self {
        Self {
            source,
            buffer: BlockBuffer::new(),
            opened: false,
            seek_skip: Some(S::skip_via_seek),
        }
    }
}

impl<S: ReadSource> ReadFilter for IdentityReader<S> {
    fn name(&self) -> &str {
        "none"
    }

    fn read_ahead(&mut self, min: usize) -> Result<&[u8]> {
        self.ensure_open()?;
        let source = &mut self.source;
        self.buffer.ensure(min, |dst| source.read(dst))?;
        Ok(self.buffer.data())
    }

    fn consume(&mut self, n: usize) -> Result<usize> {
        Ok(self.buffer.consume(n))
    }

    fn skip(&mut self, n: u64) -> Result<u64> {
        self.ensure_open()?;
        if let Some(skip_via_seek) = self.seek_skip {
            return Ok(skip_via_seek(&mut self.source, n)?);
        }
        Ok(self.source.skip(n)?)
    }

    fn close(&mut self) -> Result<()> {
        Ok(self.source.close()?)
    }

    fn bytes_consumed(&self) -> u64 {
        self.buffer.bytes_consumed()
    }
}

/// Reads and discards exactly `n` bytes from `filter`, preferring a
/// fast `skip` and falling back to read+discard. Shared by format
/// plug-ins implementing inter-record alignment and by
/// `read_data_skip`.
pub fn skip_exact(filter: &mut dyn ReadFilter, mut n: u64) -> Result<()> {
    while n > 0 {
        let skipped = filter.skip(n)?;
        if skipped > 0 {
            n -= skipped;
            continue;
        }
        let want = n.min(64 * 1024) as usize;
        let avail = filter.read_ahead(want)?.len();
        if avail == 0 {
            return Err(crate::error::Error::fatal("unexpected end of stream while skipping"));
        }
        let take = avail.min(n as usize);
        filter.consume(take)?;
        n -= take as u64;
    }
    Ok(())
}
