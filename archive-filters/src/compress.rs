//! The classic Unix `compress` codec (`.Z`, magic `1f 9d`).
//!
//! LZW with a variable code width (9 bits growing to a maximum of 16)
//! and the historical "adaptive reset": when the code table fills up in
//! block mode, a reserved clear code (256) resets the table and code
//! width back to 9 bits rather than freezing the dictionary. Bits are
//! packed LSB-first within each byte, lowest-order code bit first — the
//! format `compress`/`uncompress` and libarchive's own compress filter
//! both use.

use archive_core::error::Result;
use archive_core::read::{FilterBidder, ReadFilter};
use archive_core::write::WriteFilter;

use crate::error::FilterError;

const MAGIC: [u8; 2] = [0x1f, 0x9d];
const INITIAL_BITS: u32 = 9;
const CLEAR_CODE: u32 = 256;
const FIRST_FREE_CODE: u32 = 257;

pub struct Bidder;

impl FilterBidder for Bidder {
    fn name(&self) -> &'static str {
        "compress"
    }

    fn bid(&self, prefix: &[u8]) -> Result<i64> {
        Ok(if prefix.starts_with(&MAGIC) { 50 } else { 0 })
    }

    fn wrap(&self, upstream: Box<dyn ReadFilter>) -> Result<Box<dyn ReadFilter>> {
        Ok(Box::new(CompressReadFilter::new(upstream)?))
    }
}

/// A single LSB-first variable-width bit reader over a [`ReadFilter`].
struct BitReader {
    upstream: Box<dyn ReadFilter>,
    bit_buf: u32,
    bit_count: u32,
}

impl BitReader {
    fn new(upstream: Box<dyn ReadFilter>) -> Self {
        Self {
            upstream,
            bit_buf: 0,
            bit_count: 0,
        }
    }

    /// Reads the next `width`-bit code, or `None` at end of stream.
    fn next_code(&mut self, width: u32) -> Result<Option<u32>> {
        while self.bit_count < width {
            let chunk = self.upstream.read_ahead(1)?;
            if chunk.is_empty() {
                if self.bit_count == 0 {
                    return Ok(None);
                }
                break;
            }
            let byte = chunk[0];
            self.upstream.consume(1)?;
            self.bit_buf |= u32::from(byte) << self.bit_count;
            self.bit_count += 8;
        }
        if self.bit_count < width {
            return Ok(None);
        }
        let code = self.bit_buf & ((1u32 << width) - 1);
        self.bit_buf >>= width;
        self.bit_count -= width;
        Ok(Some(code))
    }

    fn close(&mut self) -> Result<()> {
        self.upstream.close()
    }

    fn bytes_consumed(&self) -> u64 {
        self.upstream.bytes_consumed()
    }
}

struct CompressReadFilter {
    bits: BitReader,
    max_bits: u32,
    block_mode: bool,
    width: u32,
    table: Vec<Vec<u8>>,
    prev: Option<Vec<u8>>,
    /// Decoded bytes not yet delivered to a caller; `out[out_pos..]` is
    /// the logical read-ahead buffer.
    out: Vec<u8>,
    out_pos: usize,
    finished: bool,
    produced_total: u64,
}

impl CompressReadFilter {
    fn new(upstream: Box<dyn ReadFilter>) -> Result<Self> {
        let mut bits = BitReader::new(upstream);
        let header = {
            let mut header = [0u8; 1];
            // The two magic bytes were already consumed by the bidder's
            // `read_ahead` inspection (not actually consumed — only
            // peeked), so the flags byte is still the third stream byte.
            let chunk = bits.upstream.read_ahead(3)?;
            if chunk.len() < 3 {
                return Err(FilterError::Corrupt("truncated compress header".into()).into());
            }
            header[0] = chunk[2];
            bits.upstream.consume(3)?;
            header[0]
        };
        let max_bits = u32::from(header & 0x1f);
        let block_mode = header & 0x80 != 0;
        if !(9..=16).contains(&max_bits) {
            return Err(FilterError::Corrupt(format!("unsupported code width {max_bits}")).into());
        }

        Ok(Self {
            bits,
            max_bits,
            block_mode,
            width: INITIAL_BITS,
            table: initial_table(),
            prev: None,
            out: Vec::new(),
            out_pos: 0,
            finished: false,
            produced_total: 0,
        })
    }

    fn next_entry(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let Some(code) = self.bits.next_code(self.width)? else {
                return Ok(None);
            };

            if self.block_mode && code == CLEAR_CODE {
                self.table = initial_table();
                self.width = INITIAL_BITS;
                self.prev = None;
                continue;
            }

            let entry = if (code as usize) < self.table.len() {
                self.table[code as usize].clone()
            } else if code as usize == self.table.len() {
                // KwKwK special case: the code for "prefix + prefix's
                // first byte" was requested before it was ever emitted.
                let Some(prev) = &self.prev else {
                    return Err(FilterError::Corrupt("invalid compress code sequence".into()).into());
                };
                let mut entry = prev.clone();
                entry.push(prev[0]);
                entry
            } else {
                return Err(FilterError::Corrupt("compress code out of range".into()).into());
            };

            if let Some(prev) = &self.prev {
                if self.table.len() < (1usize << self.max_bits) {
                    let mut new_entry = prev.clone();
                    new_entry.push(entry[0]);
                    self.table.push(new_entry);
                    if self.table.len() as u32 > (1 << self.width) - 1 && self.width < self.max_bits {
                        self.width += 1;
                    }
                }
            }

            self.prev = Some(entry.clone());
            return Ok(Some(entry));
        }
    }
}

fn initial_table() -> Vec<Vec<u8>> {
    let mut table: Vec<Vec<u8>> = (0u32..256).map(|b| vec![b as u8]).collect();
    table.push(Vec::new()); // code 256: CLEAR_CODE, body unused.
    table
}

impl ReadFilter for CompressReadFilter {
    fn name(&self) -> &str {
        "compress"
    }

    fn read_ahead(&mut self, min: usize) -> Result<&[u8]> {
        if self.out_pos > 0 {
            self.out.drain(..self.out_pos);
            self.out_pos = 0;
        }
        while self.out.len() < min && !self.finished {
            match self.next_entry()? {
                Some(entry) => self.out.extend_from_slice(&entry),
                None => self.finished = true,
            }
        }
        Ok(&self.out)
    }

    fn consume(&mut self, n: usize) -> Result<usize> {
        let n = n.min(self.out.len() - self.out_pos);
        self.out_pos += n;
        self.produced_total += n as u64;
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.bits.close()
    }

    fn bytes_consumed(&self) -> u64 {
        self.produced_total
    }
}

/// Writer side: classic non-adaptive compress is rarely produced by
/// modern tools, but the format is simple enough to emit correctly.
/// Mirrors the decoder's table-building so round trips through this
/// crate are exact even though we never claim bit-compatibility with a
/// particular vendor's `compress` binary (spec.md §8 only requires
/// round-trip correctness per codec, not cross-implementation parity).
pub fn writer(upstream: Box<dyn WriteFilter>) -> Box<dyn WriteFilter> {
    Box::new(CompressWriteFilter::new(upstream))
}

struct CompressWriteFilter {
    upstream: Box<dyn WriteFilter>,
    header_written: bool,
    bit_buf: u32,
    bit_count: u32,
    width: u32,
    table: std::collections::HashMap<(u32, u8), u32>,
    next_code: u32,
    prev: Option<u32>,
    written: u64,
}

const MAX_BITS: u32 = 16;

impl CompressWriteFilter {
    fn new(upstream: Box<dyn WriteFilter>) -> Self {
        Self {
            upstream,
            header_written: false,
            bit_buf: 0,
            bit_count: 0,
            width: INITIAL_BITS,
            table: std::collections::HashMap::new(),
            next_code: FIRST_FREE_CODE,
            prev: None,
            written: 0,
        }
    }

    fn emit_header(&mut self) -> Result<()> {
        self.upstream.write(&MAGIC)?;
        self.upstream.write(&[0x80 | (MAX_BITS as u8)])?;
        self.header_written = true;
        Ok(())
    }

    fn emit_code(&mut self, code: u32) -> Result<()> {
        self.bit_buf |= code << self.bit_count;
        self.bit_count += self.width;
        while self.bit_count >= 8 {
            let byte = (self.bit_buf & 0xff) as u8;
            self.upstream.write(&[byte])?;
            self.bit_buf >>= 8;
            self.bit_count -= 8;
        }
        Ok(())
    }

    fn reset_table(&mut self) -> Result<()> {
        self.emit_code(CLEAR_CODE)?;
        self.table.clear();
        self.next_code = FIRST_FREE_CODE;
        self.width = INITIAL_BITS;
        Ok(())
    }
}

impl WriteFilter for CompressWriteFilter {
    fn name(&self) -> &str {
        "compress"
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.header_written {
            self.emit_header()?;
        }
        for &byte in buf {
            let prefix = self.prev.unwrap_or(u32::from(byte));
            if self.prev.is_none() {
                self.prev = Some(u32::from(byte));
                continue;
            }
            match self.table.get(&(prefix, byte)) {
                Some(&code) => self.prev = Some(code),
                None => {
                    self.emit_code(prefix)?;
                    if self.next_code < (1 << MAX_BITS) {
                        self.table.insert((prefix, byte), self.next_code);
                        self.next_code += 1;
                        if self.next_code > (1 << self.width) && self.width < MAX_BITS {
                            self.width += 1;
                        }
                    } else {
                        self.reset_table()?;
                    }
                    self.prev = Some(u32::from(byte));
                }
            }
        }
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        self.upstream.flush()
    }

    fn close(&mut self) -> Result<()> {
        if !self.header_written {
            self.emit_header()?;
        }
        if let Some(code) = self.prev.take() {
            self.emit_code(code)?;
        }
        if self.bit_count > 0 {
            let byte = (self.bit_buf & 0xff) as u8;
            self.upstream.write(&[byte])?;
            self.bit_buf = 0;
            self.bit_count = 0;
        }
        self.upstream.close()
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}
