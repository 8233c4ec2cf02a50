//! Output block aggregator (spec.md §4.2).
//!
//! Sits at the bottom of the write pipeline, adjacent to the client
//! sink. Accumulates bytes into a fixed block size and emits whole
//! blocks downstream; on close, pads the remainder with zero to a
//! (possibly distinct) final block size, matching tar's "last block may
//! be smaller than the regular block size" convention.

use crate::error::Result;

use super::filter::WriteFilter;

/// Tar-style default: 20 × 512-byte physical blocks (10 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 10 * 1024;

pub struct BlockWriter {
    upstream: Box<dyn WriteFilter>,
    block_size: usize,
    final_block_size: usize,
    buf: Vec<u8>,
    bytes_in: u64,
    bytes_out: u64,
    closed: bool,
}

impl BlockWriter {
    pub fn new(upstream: Box<dyn WriteFilter>, block_size: usize, final_block_size: usize) -> Self {
        Self {
            upstream,
            block_size: block_size.max(1),
            final_block_size: final_block_size.max(1),
            buf: Vec::new(),
            bytes_in: 0,
            bytes_out: 0,
            closed: false,
        }
    }

    pub fn with_default_block_size(upstream: Box<dyn WriteFilter>) -> Self {
        Self::new(upstream, DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_SIZE)
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.bytes_in += data.len() as u64;
        self.buf.extend_from_slice(data);
        while self.buf.len() >= self.block_size {
            let block: Vec<u8> = self.buf.drain(..self.block_size).collect();
            self.upstream.write(&block)?;
            self.bytes_out += block.len() as u64;
        }
        Ok(data.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.upstream.flush()
    }

    /// Final flush: pads the remaining bytes to `final_block_size` with
    /// zero and emits them, then closes upstream.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if !self.buf.is_empty() {
            let padded_len = self.final_block_size.max(
                self.buf
                    .len()
                    .div_ceil(self.final_block_size)
                    * self.final_block_size,
            );
            self.buf.resize(padded_len, 0);
            let block = std::mem::take(&mut self.buf);
            self.upstream.write(&block)?;
            self.bytes_out += block.len() as u64;
        }
        self.upstream.close()
    }

    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::filter::IdentityWriter;

    #[test]
    fn pads_final_block() {
        let sink: Vec<u8> = Vec::new();
        let identity = Box::new(IdentityWriter::new(sink));
        let mut agg = BlockWriter::new(identity, 512, 512);
        agg.write(b"hello").unwrap();
        agg.close().unwrap();
        assert_eq!(agg.bytes_out(), 512);
        assert_eq!(agg.bytes_in(), 5);
    }

    #[test]
    fn emits_whole_blocks_as_they_fill() {
        let sink: Vec<u8> = Vec::new();
        let identity = Box::new(IdentityWriter::new(sink));
        let mut agg = BlockWriter::new(identity, 4, 4);
        agg.write(b"abcdefgh").unwrap();
        assert_eq!(agg.bytes_out(), 8);
        agg.close().unwrap();
        assert_eq!(agg.bytes_out(), 8);
    }
}
