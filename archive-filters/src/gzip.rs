//! The `gzip` codec (RFC 1952 magic `1f 8b`).
//!
//! Uses `flate2::read::MultiGzDecoder` rather than the single-stream
//! `GzDecoder`: gzip tools (and libarchive's own gzip filter) treat a
//! concatenation of multiple gzip members as one logical stream, and a
//! client piping several gzipped files together expects that to just
//! work.

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use archive_core::error::Result;
use archive_core::read::buffer::BlockBuffer;
use archive_core::read::{FilterBidder, ReadFilter};
use archive_core::write::WriteFilter;

use crate::error::FilterError;
use crate::pipe_adapter::{UpstreamReader, UpstreamWriter};

const MAGIC: [u8; 2] = [0x1f, 0x8b];

pub struct Bidder;

impl FilterBidder for Bidder {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn bid(&self, prefix: &[u8]) -> Result<i64> {
        Ok(if prefix.starts_with(&MAGIC) { 50 } else { 0 })
    }

    fn wrap(&self, upstream: Box<dyn ReadFilter>) -> Result<Box<dyn ReadFilter>> {
        Ok(Box::new(GzipReadFilter::new(upstream)))
    }
}

struct GzipReadFilter {
    decoder: Option<MultiGzDecoder<UpstreamReader>>,
    buffer: BlockBuffer,
}

impl GzipReadFilter {
    fn new(upstream: Box<dyn ReadFilter>) -> Self {
        Self {
            decoder: Some(MultiGzDecoder::new(UpstreamReader::new(upstream))),
            buffer: BlockBuffer::new(),
        }
    }
}

impl ReadFilter for GzipReadFilter {
    fn name(&self) -> &str {
        "gzip"
    }

    fn read_ahead(&mut self, min: usize) -> Result<&[u8]> {
        let decoder = self
            .decoder
            .as_mut()
            .expect("read_ahead called after close");
        self.buffer
            .ensure(min, |dst| std::io::Read::read(decoder, dst))
            .map_err(FilterError::from)?;
        Ok(self.buffer.data())
    }

    fn consume(&mut self, n: usize) -> Result<usize> {
        Ok(self.buffer.consume(n))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(decoder) = self.decoder.take() {
            let mut upstream = decoder.into_inner().into_inner();
            upstream.close()?;
        }
        Ok(())
    }

    fn bytes_consumed(&self) -> u64 {
        self.buffer.bytes_consumed()
    }
}

pub fn writer(upstream: Box<dyn WriteFilter>) -> Box<dyn WriteFilter> {
    Box::new(GzipWriteFilter {
        encoder: Some(GzEncoder::new(UpstreamWriter::new(upstream), Compression::default())),
        written: 0,
    })
}

struct GzipWriteFilter {
    encoder: Option<GzEncoder<UpstreamWriter>>,
    written: u64,
}

impl WriteFilter for GzipWriteFilter {
    fn name(&self) -> &str {
        "gzip"
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let encoder = self.encoder.as_mut().expect("write called after close");
        std::io::Write::write_all(encoder, buf).map_err(FilterError::from)?;
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        let encoder = self.encoder.as_mut().expect("flush called after close");
        std::io::Write::flush(encoder).map_err(FilterError::from)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            let upstream = encoder.finish().map_err(FilterError::from)?;
            let mut upstream = upstream.into_inner();
            upstream.close()?;
        }
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}
