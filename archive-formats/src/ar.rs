//! The Unix `ar` archive format: a `!<arch>\n` magic followed by a
//! sequence of 60-byte fixed-width headers, each immediately followed
//! by its (even-padded) data. No compression, no hardlinks, no
//! directories — just a flat sequence of member files, which is all
//! `.a`/`.deb`-style archives ever need.
//!
//! Both the BSD and GNU/SVR4 dialects only disagree on how names wider
//! than 16 bytes are carried (BSD: `#1/<len>` plus the name prepended
//! to the data; GNU: a `/`-terminated index into a separate name
//! table). This reader accepts both; the writer always emits the BSD
//! form, since it needs no separate name-table member.

use archive_core::entry::{Entry, FileType};
use archive_core::error::Result;
use archive_core::read::{DataBlock, FormatReader, HeaderOutcome, ReadFilter};
use archive_core::write::{pad_with_zeros, FormatWriter, WriteFilter};

use crate::error::FormatError;

const FORMAT_NAME: &str = "ar";
const GLOBAL_MAGIC: &[u8; 8] = b"!<arch>\n";
const HEADER_LEN: usize = 60;
const BSD_LONGNAME_PREFIX: &[u8] = b"#1/";

fn read_exact(pipe: &mut dyn ReadFilter, n: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        let avail = pipe.read_ahead(n - filled)?;
        if avail.is_empty() {
            return Err(FormatError::Truncated { format: FORMAT_NAME, detail: "truncated ar header".into() }.into());
        }
        let take = avail.len().min(n - filled);
        out[filled..filled + take].copy_from_slice(&avail[..take]);
        filled += pipe.consume(take)?;
    }
    Ok(out)
}

fn parse_decimal(field: &[u8]) -> Result<u64> {
    let text = std::str::from_utf8(field)
        .map_err(|_| FormatError::Malformed { format: FORMAT_NAME, detail: "non-UTF8 ar field".into() })?;
    text.trim()
        .parse()
        .map_err(|_| FormatError::Malformed { format: FORMAT_NAME, detail: format!("bad decimal field {text:?}") }.into())
}

fn parse_mode(field: &[u8]) -> Result<u32> {
    let text = std::str::from_utf8(field)
        .map_err(|_| FormatError::Malformed { format: FORMAT_NAME, detail: "non-UTF8 ar mode field".into() })?;
    u32::from_str_radix(text.trim(), 8)
        .map_err(|_| FormatError::Malformed { format: FORMAT_NAME, detail: format!("bad octal mode field {text:?}") }.into())
}

fn pad_field(value: &str, width: usize) -> Vec<u8> {
    let mut out = value.as_bytes().to_vec();
    out.resize(width, b' ');
    out
}

struct Fields {
    name: Vec<u8>,
    mtime: i64,
    uid: u64,
    gid: u64,
    mode: u32,
    size: u64,
}

fn parse_header(block: &[u8]) -> Result<Fields> {
    if &block[58..60] != b"\x60\n" {
        return Err(FormatError::Malformed { format: FORMAT_NAME, detail: "bad ar header terminator".into() }.into());
    }
    let raw_name = &block[0..16];
    let mtime = parse_decimal(&block[16..28])? as i64;
    let uid = parse_decimal(&block[28..34])?;
    let gid = parse_decimal(&block[34..40])?;
    let mode = parse_mode(&block[40..48])?;
    let size = parse_decimal(&block[48..58])?;
    Ok(Fields { name: raw_name.to_vec(), mtime, uid, gid, mode, size })
}

#[derive(Default)]
pub struct Reader {
    remaining: u64,
    delivered: u64,
    pad: u64,
    read_magic: bool,
    /// GNU names table (`//` member), populated lazily on first use.
    gnu_names: Vec<u8>,
}

impl FormatReader for Reader {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn bid(&mut self, pipe: &mut dyn ReadFilter) -> Result<i64> {
        let avail = pipe.read_ahead(8)?;
        Ok(if avail.len() >= 8 && &avail[..8] == GLOBAL_MAGIC.as_slice() { 50 } else { 0 })
    }

    fn read_header(&mut self, pipe: &mut dyn ReadFilter, entry: &mut Entry) -> Result<HeaderOutcome> {
        if !self.read_magic {
            self.read_magic = true;
            let magic = read_exact(pipe, 8)?;
            if magic.as_slice() != GLOBAL_MAGIC.as_slice() {
                return Err(FormatError::Malformed { format: FORMAT_NAME, detail: "missing !<arch> magic".into() }.into());
            }
        }

        loop {
            let peek = pipe.read_ahead(1)?;
            if peek.is_empty() {
                return Ok(HeaderOutcome::Eof);
            }

            let block = read_exact(pipe, HEADER_LEN)?;
            let fields = parse_header(&block)?;
            let mut body_size = fields.size;
            let raw_name = fields.name;

            if raw_name.starts_with(b"//") {
                // GNU extended-name table: consume it and loop for the
                // real first member.
                self.gnu_names = read_exact(pipe, body_size as usize)?;
                skip_padding(pipe, body_size)?;
                continue;
            }
            if raw_name.starts_with(b"/ ") {
                // SVR4/GNU symbol table member: no user-visible entry.
                skip_exact_body(pipe, body_size)?;
                continue;
            }

            let name = if let Some(rest) = raw_name.strip_prefix(BSD_LONGNAME_PREFIX) {
                let len: usize = std::str::from_utf8(rest)
                    .ok()
                    .and_then(|s| s.trim().parse().ok())
                    .ok_or_else(|| FormatError::Malformed { format: FORMAT_NAME, detail: "bad BSD long-name length".into() })?;
                let name = read_exact(pipe, len)?;
                body_size -= len as u64;
                trim_trailing(&name)
            } else if raw_name[0] == b'/' && raw_name[1].is_ascii_digit() {
                let offset: usize = std::str::from_utf8(&raw_name[1..])
                    .ok()
                    .and_then(|s| s.trim().parse().ok())
                    .ok_or_else(|| FormatError::Malformed { format: FORMAT_NAME, detail: "bad GNU name-table offset".into() })?;
                gnu_table_name(&self.gnu_names, offset)?
            } else {
                trim_trailing(&raw_name)
            };

            entry.pathname = name;
            entry.mode = fields.mode & 0o7777;
            entry.uid = fields.uid;
            entry.gid = fields.gid;
            entry.size = body_size;
            entry.mtime = Some(archive_core::entry::Timestamp::new(fields.mtime, 0));
            entry.filetype = FileType::Regular;

            self.remaining = body_size;
            self.delivered = 0;
            self.pad = body_size % 2;

            return Ok(HeaderOutcome::Ok);
        }
    }

    fn read_data(&mut self, pipe: &mut dyn ReadFilter) -> Result<Option<DataBlock>> {
        if self.remaining == 0 {
            if self.pad > 0 {
                archive_core::read::filter::skip_exact(pipe, self.pad)?;
                self.pad = 0;
            }
            return Ok(None);
        }
        let want = self.remaining.min(64 * 1024) as usize;
        let avail = pipe.read_ahead(want)?;
        if avail.is_empty() {
            return Err(FormatError::Truncated { format: FORMAT_NAME, detail: "short ar member body".into() }.into());
        }
        let take = avail.len().min(want);
        let data = avail[..take].to_vec();
        let offset = self.delivered;
        let consumed = pipe.consume(take)? as u64;
        self.remaining -= consumed;
        self.delivered += consumed;
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

fn trim_trailing(name: &[u8]) -> Vec<u8> {
    let mut name = name.to_vec();
    while name.last() == Some(&b' ') || name.last() == Some(&b'/') {
        name.pop();
    }
    name
}

fn gnu_table_name(table: &[u8], offset: usize) -> Result<Vec<u8>> {
    let rest = table
        .get(offset..)
        .ok_or_else(|| FormatError::Malformed { format: FORMAT_NAME, detail: "GNU name-table offset out of range".into() })?;
    let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
    Ok(trim_trailing(&rest[..end]))
}

fn skip_padding(pipe: &mut dyn ReadFilter, size: u64) -> Result<()> {
    if size % 2 != 0 {
        archive_core::read::filter::skip_exact(pipe, 1)?;
    }
    Ok(())
}

fn skip_exact_body(pipe: &mut dyn ReadFilter, size: u64) -> Result<()> {
    archive_core::read::filter::skip_exact(pipe, size)?;
    skip_padding(pipe, size)
}

#[derive(Default)]
pub struct Writer {
    wrote_magic: bool,
    declared: u64,
    remaining: u64,
    pad: u64,
}

impl FormatWriter for Writer {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn write_header(&mut self, pipe: &mut dyn WriteFilter, entry: &Entry) -> Result<()> {
        if !self.wrote_magic {
            pipe.write(GLOBAL_MAGIC.as_slice())?;
            self.wrote_magic = true;
        }

        let size = entry.wire_size();
        let name_field;
        let mut extra_name = Vec::new();
        if entry.pathname.len() > 16 {
            name_field = format!("#1/{}", entry.pathname.len());
            extra_name = entry.pathname.clone();
        } else {
            name_field = format!("{}/", String::from_utf8_lossy(&entry.pathname));
        }

        let mut block = [0u8; HEADER_LEN];
        block[0..16].copy_from_slice(&pad_field(&name_field, 16));
        block[16..28].copy_from_slice(&pad_field(&entry.mtime.map_or(0, |t| t.secs).to_string(), 12));
        block[28..34].copy_from_slice(&pad_field(&entry.uid.to_string(), 6));
        block[34..40].copy_from_slice(&pad_field(&entry.gid.to_string(), 6));
        block[40..48].copy_from_slice(&pad_field(&format!("{:o}", (entry.mode & 0o7777) | 0o100000), 8));
        block[48..58].copy_from_slice(&pad_field(&(size + extra_name.len() as u64).to_string(), 10));
        block[58..60].copy_from_slice(b"\x60\n");
        pipe.write(&block)?;
        if !extra_name.is_empty() {
            pipe.write(&extra_name)?;
        }

        self.declared = size;
        self.remaining = size;
        self.pad = (size + extra_name.len() as u64) % 2;
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
        if self.pad > 0 {
            pipe.write(b"\n")?;
            self.pad = 0;
        }
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
    fn writes_and_reads_back_two_members() {
        let mut writer = Writer::default();
        let mut sink = VecSink(Vec::new());
        for (name, body) in [("a.o", b"AAAA".as_slice()), ("b.o", b"BB".as_slice())] {
            let entry = Entry {
                pathname: name.as_bytes().to_vec(),
                filetype: FileType::Regular,
                mode: 0o644,
                size: body.len() as u64,
                ..Default::default()
            };
            writer.write_header(&mut sink, &entry).unwrap();
            writer.write_data(&mut sink, body).unwrap();
            writer.finish_entry(&mut sink).unwrap();
        }

        let mut reader = Reader::default();
        let mut source = VecSource(sink.0.into());

        let mut e1 = Entry::default();
        reader.read_header(&mut source, &mut e1).unwrap();
        assert_eq!(e1.pathname, b"a.o");
        let block = reader.read_data(&mut source).unwrap().unwrap();
        assert_eq!(block.data, b"AAAA");
        assert!(reader.read_data(&mut source).unwrap().is_none());

        let mut e2 = Entry::default();
        reader.read_header(&mut source, &mut e2).unwrap();
        assert_eq!(e2.pathname, b"b.o");

        reader.read_data_skip(&mut source).unwrap();

        let mut e3 = Entry::default();
        match reader.read_header(&mut source, &mut e3).unwrap() {
            HeaderOutcome::Eof => {}
            HeaderOutcome::Ok => panic!("expected EOF"),
        }
    }

    #[test]
    fn long_name_round_trips_via_bsd_extension() {
        let mut writer = Writer::default();
        let mut sink = VecSink(Vec::new());
        let long_name = "a-very-long-object-file-name.o";
        let entry = Entry {
            pathname: long_name.as_bytes().to_vec(),
            filetype: FileType::Regular,
            mode: 0o644,
            size: 3,
            ..Default::default()
        };
        writer.write_header(&mut sink, &entry).unwrap();
        writer.write_data(&mut sink, b"xyz").unwrap();
        writer.finish_entry(&mut sink).unwrap();

        let mut reader = Reader::default();
        let mut source = VecSource(sink.0.into());
        let mut read_entry = Entry::default();
        reader.read_header(&mut source, &mut read_entry).unwrap();
        assert_eq!(read_entry.pathname, long_name.as_bytes());
    }
}
