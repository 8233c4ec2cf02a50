//! Old-style (V7) tar: no `ustar`/GNU magic at all, just the first six
//! header fields plus a checksum. Read-only — nothing produces V7
//! archives deliberately anymore, and [`super::ustar`]'s writer already
//! covers the "broadest compatibility" use case. Every hardlink sighting
//! is emitted as a full entry (no "first sighting wins" convention,
//! since V7 predates the whole notion of a reference-only hardlink
//! record in the format).

use archive_core::entry::{Entry, FileType};
use archive_core::error::Result;
use archive_core::read::{DataBlock, FormatReader, HeaderOutcome, ReadFilter};

use super::header::RawHeader;
use super::{data_padding, read_block};
use crate::error::FormatError;

const FORMAT_NAME: &str = "oldtar";

#[derive(Default)]
pub struct Reader {
    remaining: u64,
    delivered: u64,
    pad: u64,
}

impl FormatReader for Reader {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn bid(&mut self, pipe: &mut dyn ReadFilter) -> Result<i64> {
        let avail = pipe.read_ahead(512)?;
        if avail.len() < 512 {
            return Ok(0);
        }
        let mut block = [0u8; 512];
        block.copy_from_slice(&avail[..512]);
        let raw = RawHeader::from_block(block);
        if raw.is_end_marker() || raw.is_gnu_magic() || &block[257..263] == b"ustar\0" {
            return Ok(0);
        }
        let stored = match raw.stored_checksum() {
            Ok(v) => v,
            Err(_) => return Ok(0),
        };
        Ok(if stored == raw.compute_checksum() { 40 } else { 0 })
    }

    fn read_header(&mut self, pipe: &mut dyn ReadFilter, entry: &mut Entry) -> Result<HeaderOutcome> {
        let Some(raw) = read_block(pipe)? else {
            return Ok(HeaderOutcome::Eof);
        };
        if raw.is_end_marker() {
            return Ok(HeaderOutcome::Eof);
        }

        let stored = raw.stored_checksum()?;
        let checksum_mismatch = stored != raw.compute_checksum();

        entry.pathname = raw.name();
        entry.mode = raw.mode()?;
        entry.uid = raw.uid()?;
        entry.gid = raw.gid()?;
        entry.size = raw.size()?;
        entry.mtime = Some(archive_core::entry::Timestamp::new(raw.mtime()?, 0));
        // V7 only distinguishes regular files, hardlinks (typeflag '1'),
        // and directories recognized by a trailing '/' in the name; every
        // other typeflag byte is ignored (V7 predates them).
        entry.filetype = match raw.typeflag() {
            b'1' => FileType::HardlinkReference,
            _ if entry.pathname.last() == Some(&b'/') => FileType::Directory,
            _ => FileType::Regular,
        };
        if entry.filetype == FileType::HardlinkReference {
            let link = raw.linkname();
            if !link.is_empty() {
                entry.hardlink = Some(link);
            }
        }

        self.remaining = entry.wire_size();
        self.delivered = 0;
        self.pad = data_padding(self.remaining);

        if checksum_mismatch {
            return Err(FormatError::BadChecksum { format: FORMAT_NAME }.into());
        }
        Ok(HeaderOutcome::Ok)
    }

    fn read_data(&mut self, pipe: &mut dyn ReadFilter) -> Result<Option<DataBlock>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let want = self.remaining.min(64 * 1024) as usize;
        let avail = pipe.read_ahead(want)?;
        if avail.is_empty() {
            return Err(FormatError::Truncated { format: FORMAT_NAME, detail: "short entry body".into() }.into());
        }
        let take = avail.len().min(want);
        let data = avail[..take].to_vec();
        let offset = self.delivered;
        let consumed = pipe.consume(take)? as u64;
        self.remaining -= consumed;
        self.delivered += consumed;
        if self.remaining == 0 && self.pad > 0 {
            archive_core::read::filter::skip_exact(pipe, self.pad)?;
            self.pad = 0;
        }
        Ok(Some(DataBlock { offset, data }))
    }

    fn read_data_skip(&mut self, pipe: &mut dyn ReadFilter) -> Result<()> {
        if self.remaining > 0 {
            archive_core::read::filter::skip_exact(pipe, self.remaining)?;
            self.remaining = 0;
        }
        if self.pad > 0 {
            archive_core::read::filter::skip_exact(pipe, self.pad)?;
            self.pad = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bids_zero_on_a_ustar_magic_block() {
        let mut raw = RawHeader::zeroed();
        raw.set_name(b"x");
        raw.set_magic_ustar();
        raw.set_checksum();
        let mut source = FixedSource(raw.bytes.to_vec());
        let mut reader = Reader::default();
        assert_eq!(reader.bid(&mut source).unwrap(), 0);
    }

    struct FixedSource(Vec<u8>);
    impl ReadFilter for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }
        fn read_ahead(&mut self, _min: usize) -> Result<&[u8]> {
            Ok(&self.0)
        }
        fn consume(&mut self, n: usize) -> Result<usize> {
            self.0.drain(..n);
            Ok(n)
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
        fn bytes_consumed(&self) -> u64 {
            0
        }
    }
}
