//! The POSIX ustar engine — also the one that transparently reads GNU
//! long-name/long-link extensions and pax extended headers, mirroring
//! libarchive's single merged `archive_read_support_format_tar` reader:
//! one format recognizes every post-V7 tar dialect, because they all
//! share the same 512-byte ustar-shaped header and only disagree about
//! a handful of typeflags. [`oldtar`](super::oldtar) picks up the
//! magic-less V7 case this reader declines to bid on.
//!
//! The writer here emits plain POSIX headers only (prefix/name split
//! for long paths, no `@LongLink`/pax escape hatch) — [`super::pax`]
//! and [`super::gnutar`] provide the writers for archives that need
//! those extensions.

use archive_core::entry::{Entry, FileType};
use archive_core::error::Result;
use archive_core::read::{FormatReader, HeaderOutcome, ReadFilter};
use archive_core::write::{pad_with_zeros, FormatWriter, WriteFilter};

use super::header::{self, RawHeader, TYPE_GNU_LONGLINK, TYPE_GNU_LONGNAME, TYPE_PAX_EXTENDED, TYPE_PAX_GLOBAL};
use super::{data_padding, gnutar, pax, read_block, write_block, write_end_markers, write_padding};
use crate::error::FormatError;

const FORMAT_NAME: &str = "ustar";

fn checksum_ok(block: &[u8; 512]) -> bool {
    let raw = RawHeader::from_block(*block);
    match raw.stored_checksum() {
        Ok(stored) => stored == raw.compute_checksum(),
        Err(_) => false,
    }
}

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
        if raw.is_end_marker() {
            return Ok(0);
        }
        if !raw.is_gnu_magic() && &block[257..263] != b"ustar\0" {
            return Ok(0);
        }
        Ok(if checksum_ok(&block) { 50 } else { 0 })
    }

    fn read_header(&mut self, pipe: &mut dyn ReadFilter, entry: &mut Entry) -> Result<HeaderOutcome> {
        let mut long_name: Option<Vec<u8>> = None;
        let mut long_link: Option<Vec<u8>> = None;
        let mut pax_records: Vec<(String, String)> = Vec::new();

        loop {
            let Some(raw) = read_block(pipe)? else {
                return Ok(HeaderOutcome::Eof);
            };
            if raw.is_end_marker() {
                return Ok(HeaderOutcome::Eof);
            }

            let stored = raw.stored_checksum()?;
            let checksum_mismatch = stored != raw.compute_checksum();

            match raw.typeflag() {
                TYPE_GNU_LONGNAME => {
                    let size = raw.size()?;
                    long_name = Some(gnutar::read_long_field(pipe, size)?);
                    continue;
                }
                TYPE_GNU_LONGLINK => {
                    let size = raw.size()?;
                    long_link = Some(gnutar::read_long_field(pipe, size)?);
                    continue;
                }
                TYPE_PAX_EXTENDED | TYPE_PAX_GLOBAL => {
                    let size = raw.size()?;
                    let body = super::read_body(pipe, size, FORMAT_NAME)?;
                    super::skip_body_padding(pipe, size)?;
                    pax_records.extend(pax::parse_records(&body)?);
                    continue;
                }
                _ => {
                    build_entry(&raw, entry)?;
                    if let Some(name) = long_name.take() {
                        entry.pathname = name;
                    }
                    if let Some(link) = long_link.take() {
                        if entry.filetype == FileType::Symlink {
                            entry.symlink = Some(link);
                        } else {
                            entry.hardlink = Some(link);
                        }
                    }
                    pax::apply_records(entry, &pax_records);
                    self.remaining = entry.wire_size();
                    self.delivered = 0;
                    self.pad = data_padding(self.remaining);

                    if checksum_mismatch {
                        return Err(FormatError::BadChecksum { format: FORMAT_NAME }.into());
                    }
                    return Ok(HeaderOutcome::Ok);
                }
            }
        }
    }

    fn read_data(&mut self, pipe: &mut dyn ReadFilter) -> Result<Option<archive_core::read::DataBlock>> {
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
        Ok(Some(archive_core::read::DataBlock { offset, data }))
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

fn build_entry(raw: &RawHeader, entry: &mut Entry) -> Result<()> {
    entry.pathname = raw.name();
    entry.mode = raw.mode()?;
    entry.uid = raw.uid()?;
    entry.gid = raw.gid()?;
    entry.size = raw.size()?;
    entry.mtime = Some(archive_core::entry::Timestamp::new(raw.mtime()?, 0));
    entry.filetype = raw.filetype();
    let link = raw.linkname();
    if !link.is_empty() {
        if entry.filetype == FileType::Symlink {
            entry.symlink = Some(link);
        } else if entry.filetype == FileType::HardlinkReference {
            entry.hardlink = Some(link);
        }
    }
    let uname = raw.uname();
    if !uname.is_empty() {
        entry.uname = Some(uname);
    }
    let gname = raw.gname();
    if !gname.is_empty() {
        entry.gname = Some(gname);
    }
    if matches!(entry.filetype, FileType::CharDevice | FileType::BlockDevice) {
        entry.device = Some(archive_core::entry::Device {
            major: raw.devmajor()?,
            minor: raw.devminor()?,
        });
    }
    Ok(())
}

#[derive(Default)]
pub struct Writer {
    declared: u64,
    remaining: u64,
}

impl FormatWriter for Writer {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn write_header(&mut self, pipe: &mut dyn WriteFilter, entry: &Entry) -> Result<()> {
        let mut raw = RawHeader::zeroed();
        raw.set_name(&entry.pathname);
        raw.set_mode(entry.mode);
        raw.set_uid(entry.uid);
        raw.set_gid(entry.gid);
        raw.set_size(entry.wire_size());
        raw.set_mtime(entry.mtime.map_or(0, |t| t.secs));
        raw.set_filetype(entry.filetype);
        let link = entry.hardlink.as_deref().or(entry.symlink.as_deref());
        if let Some(link) = link {
            raw.set_linkname(link);
        }
        if entry.hardlink.is_some() {
            raw.set_typeflag(header::TYPE_HARDLINK);
        }
        raw.set_magic_ustar();
        raw.set_uname(entry.uname.as_deref().unwrap_or(""));
        raw.set_gname(entry.gname.as_deref().unwrap_or(""));
        if let Some(dev) = entry.device {
            raw.set_devmajor(dev.major);
            raw.set_devminor(dev.minor);
        }
        raw.set_checksum();
        write_block(pipe, &raw)?;

        self.declared = entry.wire_size();
        self.remaining = self.declared;
        Ok(())
    }

    fn write_data(&mut self, pipe: &mut dyn WriteFilter, buf: &[u8]) -> Result<usize> {
        let take = (buf.len() as u64).min(self.remaining) as usize;
        if take > 0 {
            pipe.write(&buf[..take])?;
            self.remaining -= take as u64;
        }
        Ok(take)
    }

    fn finish_entry(&mut self, pipe: &mut dyn WriteFilter) -> Result<()> {
        if self.remaining > 0 {
            pad_with_zeros(pipe, 0, self.remaining)?;
            self.remaining = 0;
        }
        write_padding(pipe, self.declared)?;
        Ok(())
    }

    fn close(&mut self, pipe: &mut dyn WriteFilter) -> Result<()> {
        write_end_markers(pipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct VecSink(Vec<u8>);
    impl WriteFilter for VecSink {
        fn name(&self) -> &str {
            "vec"
        }
        fn write(&mut self, buf: &[u8]) -> Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
        fn bytes_written(&self) -> u64 {
            self.0.len() as u64
        }
    }

    struct VecSource(VecDeque<u8>);
    impl ReadFilter for VecSource {
        fn name(&self) -> &str {
            "vec"
        }
        fn read_ahead(&mut self, _min: usize) -> Result<&[u8]> {
            self.0.make_contiguous();
            Ok(self.0.as_slices().0)
        }
        fn consume(&mut self, n: usize) -> Result<usize> {
            let n = n.min(self.0.len());
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

    #[test]
    fn writes_and_reads_back_a_regular_file() {
        let mut writer = Writer::default();
        let mut sink = VecSink(Vec::new());
        let entry = Entry {
            pathname: b"hello.txt".to_vec(),
            filetype: FileType::Regular,
            mode: 0o644,
            size: 5,
            ..Default::default()
        };
        writer.write_header(&mut sink, &entry).unwrap();
        writer.write_data(&mut sink, b"hello").unwrap();
        writer.finish_entry(&mut sink).unwrap();
        writer.close(&mut sink).unwrap();

        let mut reader = Reader::default();
        let mut source = VecSource(sink.0.into());
        let mut read_entry = Entry::default();
        match reader.read_header(&mut source, &mut read_entry).unwrap() {
            HeaderOutcome::Ok => {}
            HeaderOutcome::Eof => panic!("expected a header"),
        }
        assert_eq!(read_entry.pathname, b"hello.txt");
        assert_eq!(read_entry.size, 5);
        let block = reader.read_data(&mut source).unwrap().unwrap();
        assert_eq!(block.data, b"hello");
        assert!(reader.read_data(&mut source).unwrap().is_none());
    }

    #[test]
    fn checksum_mismatch_is_reported_but_entry_still_populated() {
        let mut writer = Writer::default();
        let mut sink = VecSink(Vec::new());
        let entry = Entry::new("x");
        writer.write_header(&mut sink, &entry).unwrap();
        writer.finish_entry(&mut sink).unwrap();
        sink.0[0] = b'Y'; // corrupt the name byte without fixing the checksum

        let mut reader = Reader::default();
        let mut source = VecSource(sink.0.into());
        let mut read_entry = Entry::default();
        let err = reader.read_header(&mut source, &mut read_entry).unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(read_entry.pathname, b"Y");
    }
}
