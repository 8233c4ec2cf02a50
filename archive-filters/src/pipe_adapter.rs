//! Adapts the core's [`ReadFilter`]/[`WriteFilter`] trait objects to
//! `std::io::Read`/`Write` so upstream compression crates (`flate2`,
//! `bzip2`, `xz2`) can sit directly on top of a pipeline element without
//! this crate re-implementing their codecs.

use std::io;

use archive_core::read::ReadFilter;
use archive_core::write::WriteFilter;

/// Presents a boxed [`ReadFilter`] as `std::io::Read`.
pub(crate) struct UpstreamReader {
    upstream: Box<dyn ReadFilter>,
}

impl UpstreamReader {
    pub(crate) fn new(upstream: Box<dyn ReadFilter>) -> Self {
        Self { upstream }
    }

    pub(crate) fn into_inner(self) -> Box<dyn ReadFilter> {
        self.upstream
    }

    pub(crate) fn bytes_consumed(&self) -> u64 {
        self.upstream.bytes_consumed()
    }
}

impl io::Read for UpstreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let avail = self
            .upstream
            .read_ahead(1)
            .map_err(|e| io::Error::other(e.to_string()))?;
        if avail.is_empty() {
            return Ok(0);
        }
        let n = avail.len().min(buf.len());
        buf[..n].copy_from_slice(&avail[..n]);
        self.upstream
            .consume(n)
            .map_err(|e| io::Error::other(e.to_string()))?;
        Ok(n)
    }
}

/// Presents a boxed [`WriteFilter`] as `std::io::Write`.
pub(crate) struct UpstreamWriter {
    upstream: Box<dyn WriteFilter>,
}

impl UpstreamWriter {
    pub(crate) fn new(upstream: Box<dyn WriteFilter>) -> Self {
        Self { upstream }
    }

    pub(crate) fn into_inner(self) -> Box<dyn WriteFilter> {
        self.upstream
    }
}

impl io::Write for UpstreamWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.upstream
            .write(buf)
            .map_err(|e| io::Error::other(e.to_string()))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.upstream
            .flush()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}
