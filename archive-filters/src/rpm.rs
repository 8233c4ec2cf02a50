//! The `rpm` pseudo-codec: not a compressor, a passthrough that skips
//! past an RPM package's lead, signature header, and main header to
//! expose the embedded cpio payload (itself usually gzip-compressed) to
//! whichever bidder claims it next. Does not parse or expose RPM tags —
//! spec.md §1 scopes this crate to the archive/compression layer, not
//! package metadata.

use archive_core::error::Result;
use archive_core::read::{FilterBidder, ReadFilter};

use crate::error::FilterError;

const MAGIC: [u8; 4] = [0xed, 0xab, 0xee, 0xdb];
const LEAD_LEN: u64 = 96;
const HEADER_MAGIC: [u8; 3] = [0x8e, 0xad, 0xe8];

pub struct Bidder;

impl FilterBidder for Bidder {
    fn name(&self) -> &'static str {
        "rpm"
    }

    fn bid(&self, prefix: &[u8]) -> Result<i64> {
        Ok(if prefix.starts_with(&MAGIC) { 40 } else { 0 })
    }

    fn wrap(&self, upstream: Box<dyn ReadFilter>) -> Result<Box<dyn ReadFilter>> {
        RpmReadFilter::new(upstream).map(|f| Box::new(f) as Box<dyn ReadFilter>)
    }
}

struct RpmReadFilter {
    upstream: Box<dyn ReadFilter>,
}

impl RpmReadFilter {
    fn new(mut upstream: Box<dyn ReadFilter>) -> Result<Self> {
        skip_exact(upstream.as_mut(), LEAD_LEN)?;
        skip_header_section(upstream.as_mut(), true)?;
        skip_header_section(upstream.as_mut(), false)?;
        Ok(Self { upstream })
    }
}

fn skip_exact(pipe: &mut dyn ReadFilter, n: u64) -> Result<()> {
    archive_core::read::filter::skip_exact(pipe, n)
}

/// Reads one "header structure" (RPM's shared format for both the
/// signature and the main header): a fixed 16-byte intro (3-byte magic,
/// 1-byte version, 4 reserved, 4-byte big-endian index count, 4-byte
/// big-endian data-store size), followed by `index_count * 16` bytes of
/// index entries and `data_size` bytes of the data store. The signature
/// section alone is padded up to the next 8-byte boundary afterward.
fn skip_header_section(pipe: &mut dyn ReadFilter, pad_to_8: bool) -> Result<()> {
    let intro = pipe.read_ahead(16)?;
    if intro.len() < 16 || intro[..3] != HEADER_MAGIC {
        return Err(FilterError::Corrupt("missing RPM header magic".into()).into());
    }
    let index_count = u32::from_be_bytes(intro[8..12].try_into().unwrap()) as u64;
    let data_size = u32::from_be_bytes(intro[12..16].try_into().unwrap()) as u64;
    pipe.consume(16)?;

    let body_len = index_count * 16 + data_size;
    skip_exact(pipe, body_len)?;

    if pad_to_8 {
        let consumed_since_lead = 16 + body_len;
        let padding = (8 - (consumed_since_lead % 8)) % 8;
        skip_exact(pipe, padding)?;
    }
    Ok(())
}

impl ReadFilter for RpmReadFilter {
    fn name(&self) -> &str {
        "rpm"
    }

    fn read_ahead(&mut self, min: usize) -> Result<&[u8]> {
        self.upstream.read_ahead(min)
    }

    fn consume(&mut self, n: usize) -> Result<usize> {
        self.upstream.consume(n)
    }

    fn close(&mut self) -> Result<()> {
        self.upstream.close()
    }

    fn bytes_consumed(&self) -> u64 {
        self.upstream.bytes_consumed()
    }
}
