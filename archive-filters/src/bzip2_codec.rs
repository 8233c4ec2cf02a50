//! The `bzip2` codec (magic `BZh`, stream version `1`).
//!
//! Like gzip, bzip2 tools happily decode a concatenation of independent
//! bzip2 streams as one logical stream (`bunzip2`'s documented
//! behavior, exercised by libarchive's own bzip2 compat tests) — we use
//! `MultiBzDecoder` for the same reason `gzip.rs` uses `MultiGzDecoder`.

use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;

use archive_core::error::Result;
use archive_core::read::buffer::BlockBuffer;
use archive_core::read::{FilterBidder, ReadFilter};
use archive_core::write::WriteFilter;

use crate::error::FilterError;
use crate::pipe_adapter::{UpstreamReader, UpstreamWriter};

const MAGIC: [u8; 3] = *b"BZh";

pub struct Bidder;

impl FilterBidder for Bidder {
    fn name(&self) -> &'static str {
        "bzip2"
    }

    fn bid(&self, prefix: &[u8]) -> Result<i64> {
        let looks_like_bzip2 = prefix.starts_with(&MAGIC)
            && prefix.get(3).is_some_and(|b| (b'1'..=b'9').contains(b));
        Ok(if looks_like_bzip2 { 50 } else { 0 })
    }

    fn wrap(&self, upstream: Box<dyn ReadFilter>) -> Result<Box<dyn ReadFilter>> {
        Ok(Box::new(Bzip2ReadFilter::new(upstream)))
    }
}

struct Bzip2ReadFilter {
    decoder: Option<MultiBzDecoder<UpstreamReader>>,
    buffer: BlockBuffer,
}

impl Bzip2ReadFilter {
    fn new(upstream: Box<dyn ReadFilter>) -> Self {
        Self {
            decoder: Some(MultiBzDecoder::new(UpstreamReader::new(upstream))),
            buffer: BlockBuffer::new(),
        }
    }
}

impl ReadFilter for Bzip2ReadFilter {
    fn name(&self) -> &str {
        "bzip2"
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
    Box::new(Bzip2WriteFilter {
        encoder: Some(BzEncoder::new(UpstreamWriter::new(upstream), Compression::default())),
        written: 0,
    })
}

struct Bzip2WriteFilter {
    encoder: Option<BzEncoder<UpstreamWriter>>,
    written: u64,
}

impl WriteFilter for Bzip2WriteFilter {
    fn name(&self) -> &str {
        "bzip2"
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
