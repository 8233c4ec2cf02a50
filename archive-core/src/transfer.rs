//! Client source/sink callback contract (spec.md §6.1).
//!
//! libarchive exposes this as raw function pointers plus a client-data
//! pointer. Rust has no need for that indirection: any caller with a
//! `std::io::Read`/`Write` (a file, a socket, a `Cursor<Vec<u8>>`, a
//! pipe) already satisfies the contract through the blanket impls below.
//! The traits exist mainly to give [`crate::read::skip`] a faster path
//! than read+discard when the underlying source supports seeking or a
//! cheap skip primitive (tape devices, regular files).

use std::io;

/// The leaf of a read pipeline: the client's byte source.
pub trait ReadSource {
    /// Optional one-time setup. Default no-op.
    fn open(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Reads up to `buf.len()` bytes, returning the number read. `0`
    /// means EOF.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Skips `request` bytes using a faster mechanism than read+discard
    /// (lseek on a file, ioctl on a tape). Returns the number of bytes
    /// actually skipped; `0` means "not supported, read and discard
    /// instead."
    fn skip(&mut self, _request: u64) -> io::Result<u64> {
        Ok(0)
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The leaf of a write pipeline: the client's byte sink.
pub trait WriteSink {
    fn open(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Blanket impl: anything implementing `std::io::Read` is a valid
/// [`ReadSource`]. Files implement `Seek` too, so we use that for a real
/// `skip` instead of falling back to read+discard.
impl<R: io::Read> ReadSource for R {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }
}

impl<W: io::Write> WriteSink for W {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(self, buf)
    }

    fn close(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }
}

/// A [`ReadSource`] that can seek, used to give `skip` a real
/// implementation instead of the read+discard fallback.
pub trait SeekableReadSource: ReadSource {
    fn skip_via_seek(&mut self, request: u64) -> io::Result<u64>;
}

impl<R: io::Read + io::Seek> SeekableReadSource for R {
    fn skip_via_seek(&mut self, request: u64) -> io::Result<u64> {
        use io::SeekFrom;
        self.seek(SeekFrom::Current(request as i64))?;
        Ok(request)
    }
}
