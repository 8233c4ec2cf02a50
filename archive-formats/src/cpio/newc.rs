//! The "new" portable cpio format: `070701` (no CRC) and `070702`
//! (CRC, treated identically here since this crate never validates the
//! per-entry CRC on read or computes one on write — callers wanting
//! payload integrity should layer a filter, the same division of
//! responsibility spec.md draws between formats and filters).
//!
//! Hardlinks have no explicit cross-reference in cpio the way tar's
//! typeflag `1` does: the *only* signal is a repeated `ino` with
//! `nlink > 1`. [`Entry::dev_ino`] carries that correlation through
//! `archive-core`'s link resolver, so the writer reuses it directly
//! rather than inventing a name-based reference this format can't
//! express.

use archive_core::entry::{Device, Entry, FileType};
use archive_core::error::Result;
use archive_core::read::{DataBlock, FormatReader, HeaderOutcome, ReadFilter};
use archive_core::write::{pad_with_zeros, FormatWriter, WriteFilter};

use super::{pad4, read_body, read_name, write_pad4, TRAILER_NAME};
use crate::error::FormatError;

const FORMAT_NAME: &str = "cpio-newc";
const HEADER_LEN: usize = 110;

const S_IFMT: u32 = 0o170000;
const S_IFREG: u32 = 0o100000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;
const S_IFCHR: u32 = 0o020000;
const S_IFBLK: u32 = 0o060000;
const S_IFIFO: u32 = 0o010000;
const S_IFSOCK: u32 = 0o140000;

struct Fields {
    ino: u32,
    mode: u32,
    uid: u32,
    gid: u32,
    nlink: u32,
    mtime: u32,
    filesize: u32,
    devmajor: u32,
    devminor: u32,
    rdevmajor: u32,
    rdevminor: u32,
    namesize: u32,
}

fn parse_hex8(bytes: &[u8]) -> Result<u32> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| FormatError::Malformed { format: FORMAT_NAME, detail: "non-UTF8 hex field".into() })?;
    u32::from_str_radix(text, 16)
        .map_err(|_| FormatError::Malformed { format: FORMAT_NAME, detail: format!("bad hex field {text:?}") }.into())
}

fn format_hex8(value: u32) -> [u8; 8] {
    let text = format!("{value:08x}");
    let mut out = [0u8; 8];
    out.copy_from_slice(text.as_bytes());
    out
}

fn parse_header(block: &[u8]) -> Result<Fields> {
    Ok(Fields {
        ino: parse_hex8(&block[6..14])?,
        mode: parse_hex8(&block[14..22])?,
        uid: parse_hex8(&block[22..30])?,
        gid: parse_hex8(&block[30..38])?,
        nlink: parse_hex8(&block[38..46])?,
        mtime: parse_hex8(&block[46..54])?,
        filesize: parse_hex8(&block[54..62])?,
        devmajor: parse_hex8(&block[62..70])?,
        devminor: parse_hex8(&block[70..78])?,
        rdevmajor: parse_hex8(&block[78..86])?,
        rdevminor: parse_hex8(&block[86..94])?,
        namesize: parse_hex8(&block[94..102])?,
        // bytes 102..110 are the CRC field, unused here.
    })
}

#[derive(Default)]
pub struct Reader {
    remaining: u64,
    delivered: u64,
    pad: usize,
}

impl FormatReader for Reader {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn bid(&mut self, pipe: &mut dyn ReadFilter) -> Result<i64> {
        let avail = pipe.read_ahead(6)?;
        if avail.len() < 6 {
            return Ok(0);
        }
        Ok(if &avail[..6] == b"070701" || &avail[..6] == b"070702" { 50 } else { 0 })
    }

    fn read_header(&mut self, pipe: &mut dyn ReadFilter, entry: &mut Entry) -> Result<HeaderOutcome> {
        let block = read_body(pipe, HEADER_LEN, FORMAT_NAME)?;
        if &block[..6] != b"070701" && &block[..6] != b"070702" {
            return Err(FormatError::Malformed { format: FORMAT_NAME, detail: "bad magic".into() }.into());
        }
        let fields = parse_header(&block)?;
        let name = read_name(pipe, fields.namesize as usize, FORMAT_NAME)?;
        pad4(pipe, HEADER_LEN + fields.namesize as usize)?;

        if name == TRAILER_NAME {
            return Ok(HeaderOutcome::Eof);
        }

        entry.pathname = name;
        entry.mode = fields.mode & 0o7777;
        entry.uid = u64::from(fields.uid);
        entry.gid = u64::from(fields.gid);
        entry.size = u64::from(fields.filesize);
        entry.mtime = Some(archive_core::entry::Timestamp::new(i64::from(fields.mtime), 0));
        entry.dev_ino = Some((
            u64::from(fields.devmajor) << 32 | u64::from(fields.devminor),
            u64::from(fields.ino),
        ));

        entry.filetype = match fields.mode & S_IFMT {
            S_IFDIR => FileType::Directory,
            S_IFLNK => FileType::Symlink,
            S_IFCHR => FileType::CharDevice,
            S_IFBLK => FileType::BlockDevice,
            S_IFIFO => FileType::Fifo,
            S_IFSOCK => FileType::Socket,
            _ => FileType::Regular,
        };
        if matches!(entry.filetype, FileType::CharDevice | FileType::BlockDevice) {
            entry.device = Some(Device { major: fields.rdevmajor, minor: fields.rdevminor });
        }

        self.remaining = entry.wire_size();
        self.delivered = 0;

        if entry.filetype == FileType::Symlink && entry.size > 0 {
            let target = read_body(pipe, entry.size as usize, FORMAT_NAME)?;
            pad4(pipe, entry.size as usize)?;
            entry.symlink = Some(target);
            entry.size = 0;
            self.remaining = 0;
        } else {
            self.pad = (4 - (entry.size as usize % 4)) % 4;
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
            archive_core::read::filter::skip_exact(pipe, self.pad as u64)?;
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
            archive_core::read::filter::skip_exact(pipe, self.pad as u64)?;
            self.pad = 0;
        }
        Ok(())
    }
}

fn write_fields(pipe: &mut dyn WriteFilter, f: &Fields, name: &[u8]) -> Result<usize> {
    let mut block = [0u8; HEADER_LEN];
    block[..6].copy_from_slice(b"070701");
    block[6..14].copy_from_slice(&format_hex8(f.ino));
    block[14..22].copy_from_slice(&format_hex8(f.mode));
    block[22..30].copy_from_slice(&format_hex8(f.uid));
    block[30..38].copy_from_slice(&format_hex8(f.gid));
    block[38..46].copy_from_slice(&format_hex8(f.nlink));
    block[46..54].copy_from_slice(&format_hex8(f.mtime));
    block[54..62].copy_from_slice(&format_hex8(f.filesize));
    block[62..70].copy_from_slice(&format_hex8(f.devmajor));
    block[70..78].copy_from_slice(&format_hex8(f.devminor));
    block[78..86].copy_from_slice(&format_hex8(f.rdevmajor));
    block[86..94].copy_from_slice(&format_hex8(f.rdevminor));
    block[94..102].copy_from_slice(&format_hex8(f.namesize));
    block[102..110].copy_from_slice(&format_hex8(0));
    pipe.write(&block)?;
    pipe.write(name)?;
    pipe.write(&[0u8])?;
    write_pad4(pipe, HEADER_LEN + name.len() + 1)?;
    Ok(HEADER_LEN + name.len() + 1)
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
        let mode = entry.mode & 0o7777
            | match entry.filetype {
                FileType::Directory => S_IFDIR,
                FileType::Symlink => S_IFLNK,
                FileType::CharDevice => S_IFCHR,
                FileType::BlockDevice => S_IFBLK,
                FileType::Fifo => S_IFIFO,
                FileType::Socket => S_IFSOCK,
                FileType::Regular | FileType::HardlinkReference => S_IFREG,
            };
        let ino = entry.dev_ino.map_or(1, |(_, ino)| ino) as u32;
        let (devmajor, devminor) = entry
            .dev_ino
            .map_or((0, 0), |(dev, _)| ((dev >> 32) as u32, dev as u32));
        let (rdevmajor, rdevminor) = entry.device.map_or((0, 0), |d| (d.major, d.minor));

        let body: Vec<u8> = if entry.filetype == FileType::Symlink {
            entry.symlink.clone().unwrap_or_default()
        } else {
            Vec::new()
        };
        let filesize = if entry.filetype == FileType::Symlink {
            body.len() as u64
        } else {
            entry.wire_size()
        };

        let fields = Fields {
            ino,
            mode,
            uid: entry.uid as u32,
            gid: entry.gid as u32,
            nlink: if entry.hardlink.is_some() { 2 } else { 1 },
            mtime: entry.mtime.map_or(0, |t| t.secs) as u32,
            filesize: filesize as u32,
            devmajor,
            devminor,
            rdevmajor,
            rdevminor,
            namesize: entry.pathname.len() as u32 + 1,
        };
        write_fields(pipe, &fields, &entry.pathname)?;

        if !body.is_empty() {
            pipe.write(&body)?;
            write_pad4(pipe, body.len())?;
            self.declared = 0;
            self.remaining = 0;
        } else {
            self.declared = filesize;
            self.remaining = filesize;
        }
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
        write_pad4(pipe, self.declared as usize)?;
        Ok(())
    }

    fn close(&mut self, pipe: &mut dyn WriteFilter) -> Result<()> {
        let fields = Fields {
            ino: 0,
            mode: 0,
            uid: 0,
            gid: 0,
            nlink: 1,
            mtime: 0,
            filesize: 0,
            devmajor: 0,
            devminor: 0,
            rdevmajor: 0,
            rdevminor: 0,
            namesize: TRAILER_NAME.len() as u32 + 1,
        };
        write_fields(pipe, &fields, TRAILER_NAME)?;
        Ok(())
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
        let block = reader.read_data(&mut source).unwrap().unwrap();
        assert_eq!(block.data, b"hello");
        assert!(reader.read_data(&mut source).unwrap().is_none());

        let mut trailer_entry = Entry::default();
        match reader.read_header(&mut source, &mut trailer_entry).unwrap() {
            HeaderOutcome::Eof => {}
            HeaderOutcome::Ok => panic!("expected trailer"),
        }
    }

    #[test]
    fn symlink_body_is_the_target_text() {
        let mut writer = Writer::default();
        let mut sink = VecSink(Vec::new());
        let entry = Entry {
            pathname: b"link".to_vec(),
            filetype: FileType::Symlink,
            symlink: Some(b"/target".to_vec()),
            ..Default::default()
        };
        writer.write_header(&mut sink, &entry).unwrap();
        writer.finish_entry(&mut sink).unwrap();

        let mut reader = Reader::default();
        let mut source = VecSource(sink.0.into());
        let mut read_entry = Entry::default();
        reader.read_header(&mut source, &mut read_entry).unwrap();
        assert_eq!(read_entry.symlink, Some(b"/target".to_vec()));
    }
}
