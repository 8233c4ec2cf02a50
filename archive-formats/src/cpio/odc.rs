//! The old binary "portable ASCII" cpio format (`070707` magic,
//! fixed-width octal-ASCII fields, byte-aligned — no 4-byte padding
//! anywhere, unlike `newc`). Read-only: nothing should still be
//! producing this format deliberately, and [`super::newc`] is this
//! crate's write-side choice for cpio.

use archive_core::entry::{Device, Entry, FileType};
use archive_core::error::Result;
use archive_core::read::{DataBlock, FormatReader, HeaderOutcome, ReadFilter};

use super::{read_body, read_name, TRAILER_NAME};
use crate::error::FormatError;

const FORMAT_NAME: &str = "cpio-odc";
const HEADER_LEN: usize = 76;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;
const S_IFCHR: u32 = 0o020000;
const S_IFBLK: u32 = 0o060000;
const S_IFIFO: u32 = 0o010000;
const S_IFSOCK: u32 = 0o140000;

fn parse_octal(bytes: &[u8]) -> Result<u32> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| FormatError::Malformed { format: FORMAT_NAME, detail: "non-UTF8 octal field".into() })?;
    u32::from_str_radix(text.trim(), 8)
        .map_err(|_| FormatError::Malformed { format: FORMAT_NAME, detail: format!("bad octal field {text:?}") }.into())
}

struct Fields {
    dev: u32,
    ino: u32,
    mode: u32,
    uid: u32,
    gid: u32,
    rdev: u32,
    mtime: u32,
    namesize: u32,
    filesize: u32,
}

fn parse_header(block: &[u8]) -> Result<Fields> {
    Ok(Fields {
        dev: parse_octal(&block[6..12])?,
        ino: parse_octal(&block[12..18])?,
        mode: parse_octal(&block[18..24])?,
        uid: parse_octal(&block[24..30])?,
        gid: parse_octal(&block[30..36])?,
        // nlink at 36..42 is not surfaced on the `Entry` model.
        rdev: parse_octal(&block[42..48])?,
        mtime: parse_octal(&block[48..59])?,
        namesize: parse_octal(&block[59..65])?,
        filesize: parse_octal(&block[65..76])?,
    })
}

#[derive(Default)]
pub struct Reader {
    remaining: u64,
    delivered: u64,
}

impl FormatReader for Reader {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn bid(&mut self, pipe: &mut dyn ReadFilter) -> Result<i64> {
        let avail = pipe.read_ahead(6)?;
        Ok(if avail.len() >= 6 && &avail[..6] == b"070707" { 45 } else { 0 })
    }

    fn read_header(&mut self, pipe: &mut dyn ReadFilter, entry: &mut Entry) -> Result<HeaderOutcome> {
        let block = read_body(pipe, HEADER_LEN, FORMAT_NAME)?;
        if &block[..6] != b"070707" {
            return Err(FormatError::Malformed { format: FORMAT_NAME, detail: "bad magic".into() }.into());
        }
        let fields = parse_header(&block)?;
        let name = read_name(pipe, fields.namesize as usize, FORMAT_NAME)?;

        if name == TRAILER_NAME {
            return Ok(HeaderOutcome::Eof);
        }

        entry.pathname = name;
        entry.mode = fields.mode & 0o7777;
        entry.uid = u64::from(fields.uid);
        entry.gid = u64::from(fields.gid);
        entry.size = u64::from(fields.filesize);
        entry.mtime = Some(archive_core::entry::Timestamp::new(i64::from(fields.mtime), 0));
        entry.dev_ino = Some((u64::from(fields.dev), u64::from(fields.ino)));

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
            entry.device = Some(Device {
                major: fields.rdev >> 8,
                minor: fields.rdev & 0xff,
            });
        }

        self.remaining = entry.wire_size();
        self.delivered = 0;

        if entry.filetype == FileType::Symlink && entry.size > 0 {
            let target = read_body(pipe, entry.size as usize, FORMAT_NAME)?;
            entry.symlink = Some(target);
            entry.size = 0;
            self.remaining = 0;
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
        Ok(Some(DataBlock { offset, data }))
    }

    fn read_data_skip(&mut self, pipe: &mut dyn ReadFilter) -> Result<()> {
        if self.remaining > 0 {
            archive_core::read::filter::skip_exact(pipe, self.remaining)?;
            self.remaining = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bids_on_odc_magic_only() {
        let mut reader = Reader::default();
        struct Fixed(&'static [u8]);
        impl ReadFilter for Fixed {
            fn name(&self) -> &str {
                "fixed"
            }
            fn read_ahead(&mut self, _min: usize) -> Result<&[u8]> {
                Ok(self.0)
            }
            fn consume(&mut self, _n: usize) -> Result<usize> {
                Ok(0)
            }
            fn close(&mut self) -> Result<()> {
                Ok(())
            }
            fn bytes_consumed(&self) -> u64 {
                0
            }
        }
        let mut good = Fixed(b"070707rest");
        assert_eq!(reader.bid(&mut good).unwrap(), 45);
        let mut bad = Fixed(b"070701rest");
        assert_eq!(reader.bid(&mut bad).unwrap(), 0);
    }
}
