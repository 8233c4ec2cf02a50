//! GNU tar dialect: `@LongLink` name/linkname extensions and the write
//! side's GNU magic, grounded directly in
//! `examples/original_source/libarchive/archive_write_set_format_gnutar.c`
//! (`archive_write_gnutar_header`'s `././@LongLink` typeflag `L`/`K`
//! convention, copied here field-for-field). The base 512-byte header
//! formatter is shared with [`super::ustar`]; this module only adds the
//! long-name/long-link wrapper entries and selects GNU magic.

use archive_core::entry::Entry;
use archive_core::error::Result;
use archive_core::read::ReadFilter;
use archive_core::write::WriteFilter;

use super::header::RawHeader;
use super::{write_block, write_end_markers, write_padding};

const FORMAT_NAME: &str = "gnutar";
const LONGLINK_NAME: &[u8] = b"././@LongLink";

/// Reads the body of a `K`/`L` extension entry (the long name/link text
/// itself, NUL-padded to a 512 boundary) immediately following its
/// header block.
pub(crate) fn read_long_field(pipe: &mut dyn ReadFilter, size: u64) -> Result<Vec<u8>> {
    let mut out = super::read_body(pipe, size, FORMAT_NAME)?;
    // Trim the single trailing NUL the writer appends (C-string convention).
    if out.last() == Some(&0) {
        out.pop();
    }
    super::skip_body_padding(pipe, size)?;
    Ok(out)
}

fn write_long_entry(
    pipe: &mut dyn WriteFilter,
    typeflag: u8,
    value: &[u8],
) -> Result<()> {
    let mut raw = RawHeader::zeroed();
    raw.set_name(LONGLINK_NAME);
    raw.set_mode(0o644);
    raw.set_uname("root");
    raw.set_gname("wheel");
    raw.set_size(value.len() as u64 + 1);
    raw.set_typeflag(typeflag);
    raw.set_magic_gnu();
    raw.set_checksum();
    write_block(pipe, &raw)?;
    pipe.write(value)?;
    pipe.write(&[0u8])?;
    write_padding(pipe, value.len() as u64 + 1)?;
    Ok(())
}

/// Writes the base ustar-shaped header with GNU magic, preceded by
/// `@LongLink` entries for an over-length pathname or link target.
/// Shared by [`super::ustar`]'s writer isn't needed here — GNU dialect
/// is selected explicitly via this writer, not delegated to.
pub struct Writer {
    declared: u64,
    remaining: u64,
}

impl Default for Writer {
    fn default() -> Self {
        Self { declared: 0, remaining: 0 }
    }
}

impl archive_core::write::FormatWriter for Writer {
    fn name(&self) -> &'static str {
        "gnutar"
    }

    fn write_header(&mut self, pipe: &mut dyn WriteFilter, entry: &Entry) -> Result<()> {
        let link = entry.hardlink.as_deref().or(entry.symlink.as_deref());
        if let Some(link) = link {
            if link.len() > 100 {
                write_long_entry(pipe, super::header::TYPE_GNU_LONGLINK, link)?;
            }
        }
        if entry.pathname.len() > 100 {
            write_long_entry(pipe, super::header::TYPE_GNU_LONGNAME, &entry.pathname)?;
        }

        let mut raw = RawHeader::zeroed();
        raw.set_name(&entry.pathname);
        raw.set_mode(entry.mode);
        raw.set_uid(entry.uid);
        raw.set_gid(entry.gid);
        raw.set_size(entry.wire_size());
        raw.set_mtime(entry.mtime.map_or(0, |t| t.secs));
        raw.set_filetype(entry.filetype);
        if let Some(link) = link {
            raw.set_linkname(link);
        }
        if entry.hardlink.is_some() {
            raw.set_typeflag(super::header::TYPE_HARDLINK);
        }
        raw.set_magic_gnu();
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
            archive_core::write::pad_with_zeros(pipe, 0, self.remaining)?;
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
    use archive_core::entry::FileType;
    use archive_core::write::FormatWriter;

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

    #[test]
    fn long_pathname_gets_a_longlink_entry_first() {
        let mut writer = Writer::default();
        let mut sink = VecSink(Vec::new());
        let long_name = "a/".repeat(60) + "file.txt";
        let entry = Entry {
            pathname: long_name.as_bytes().to_vec(),
            filetype: FileType::Regular,
            size: 0,
            ..Default::default()
        };
        writer.write_header(&mut sink, &entry).unwrap();
        writer.finish_entry(&mut sink).unwrap();
        assert_eq!(&sink.0[0..13], LONGLINK_NAME);
        assert!(sink.0.len() >= 512 * 2);
    }
}
