//! The shared 512-byte tar header layout (POSIX ustar, extended by GNU
//! and pax) and its field encoding rules. `ustar`, `pax`, and `gnutar`
//! all read and write through this module — libarchive's own
//! `archive_write_set_format_gnutar.c` shares the same ustar-shaped
//! header writer across formats, which is the idiom this mirrors.

use archive_core::entry::FileType;

use crate::error::FormatError;

pub const BLOCK_SIZE: usize = 512;

pub const TYPE_REGULAR: u8 = b'0';
pub const TYPE_REGULAR_ALT: u8 = 0;
pub const TYPE_HARDLINK: u8 = b'1';
pub const TYPE_SYMLINK: u8 = b'2';
pub const TYPE_CHARDEV: u8 = b'3';
pub const TYPE_BLOCKDEV: u8 = b'4';
pub const TYPE_DIRECTORY: u8 = b'5';
pub const TYPE_FIFO: u8 = b'6';
pub const TYPE_GNU_LONGLINK: u8 = b'K';
pub const TYPE_GNU_LONGNAME: u8 = b'L';
pub const TYPE_PAX_EXTENDED: u8 = b'x';
pub const TYPE_PAX_GLOBAL: u8 = b'g';

/// A parsed view over one 512-byte tar header block. Field offsets per
/// POSIX ustar; GNU and pax headers share this exact byte layout and
/// differ only in `magic`/`version` and in using typeflags `K`/`L`/`x`
/// to smuggle oversized fields through extension entries.
pub struct RawHeader {
    pub bytes: [u8; BLOCK_SIZE],
}

impl RawHeader {
    pub fn zeroed() -> Self {
        Self {
            bytes: [0u8; BLOCK_SIZE],
        }
    }

    pub fn from_block(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn is_end_marker(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    fn field(&self, offset: usize, len: usize) -> &[u8] {
        &self.bytes[offset..offset + len]
    }

    fn field_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.bytes[offset..offset + len]
    }

    pub fn name(&self) -> Vec<u8> {
        let prefix = trim_nul(self.field(345, 155));
        let name = trim_nul(self.field(0, 100));
        if prefix.is_empty() {
            name.to_vec()
        } else {
            let mut full = prefix.to_vec();
            full.push(b'/');
            full.extend_from_slice(name);
            full
        }
    }

    pub fn set_name(&mut self, path: &[u8]) {
        if path.len() <= 100 {
            self.field_mut(0, 100)[..path.len()].copy_from_slice(path);
            return;
        }
        // Split on the last '/' at or before byte 155 into prefix/name,
        // ustar's historical long-name workaround. Paths too long even
        // for this are truncated; `pax`/`gnutar` extensions exist for
        // exactly this case and should be used instead for long paths.
        let split = path[..path.len().min(155)]
            .iter()
            .rposition(|&b| b == b'/')
            .unwrap_or(0);
        let (prefix, name) = path.split_at(split);
        let name = name.strip_prefix(b"/").unwrap_or(name);
        let prefix = &prefix[..prefix.len().min(155)];
        let name = &name[..name.len().min(100)];
        self.field_mut(345, 155)[..prefix.len()].copy_from_slice(prefix);
        self.field_mut(0, 100)[..name.len()].copy_from_slice(name);
    }

    pub fn mode(&self) -> Result<u32, FormatError> {
        Ok(parse_number(self.field(100, 8), "ustar")? as u32)
    }

    pub fn set_mode(&mut self, mode: u32) {
        format_octal(self.field_mut(100, 8), u64::from(mode));
    }

    pub fn uid(&self) -> Result<u64, FormatError> {
        parse_number(self.field(108, 8), "ustar")
    }

    pub fn set_uid(&mut self, uid: u64) {
        format_octal(self.field_mut(108, 8), uid);
    }

    pub fn gid(&self) -> Result<u64, FormatError> {
        parse_number(self.field(116, 8), "ustar")
    }

    pub fn set_gid(&mut self, gid: u64) {
        format_octal(self.field_mut(116, 8), gid);
    }

    pub fn size(&self) -> Result<u64, FormatError> {
        parse_number(self.field(124, 12), "ustar")
    }

    pub fn set_size(&mut self, size: u64) {
        format_number(self.field_mut(124, 12), size);
    }

    pub fn mtime(&self) -> Result<i64, FormatError> {
        Ok(parse_number(self.field(136, 12), "ustar")? as i64)
    }

    pub fn set_mtime(&mut self, secs: i64) {
        format_number(self.field_mut(136, 12), secs as u64);
    }

    pub fn typeflag(&self) -> u8 {
        self.bytes[156]
    }

    pub fn set_typeflag(&mut self, t: u8) {
        self.bytes[156] = t;
    }

    pub fn linkname(&self) -> Vec<u8> {
        trim_nul(self.field(157, 100)).to_vec()
    }

    pub fn set_linkname(&mut self, link: &[u8]) {
        let len = link.len().min(100);
        self.field_mut(157, 100)[..len].copy_from_slice(&link[..len]);
    }

    pub fn set_magic_ustar(&mut self) {
        self.field_mut(257, 6).copy_from_slice(b"ustar\0");
        self.field_mut(263, 2).copy_from_slice(b"00");
    }

    pub fn set_magic_gnu(&mut self) {
        self.field_mut(257, 6).copy_from_slice(b"ustar ");
        self.field_mut(263, 2).copy_from_slice(b" \0");
    }

    pub fn is_gnu_magic(&self) -> bool {
        self.field(257, 6) == b"ustar "
    }

    pub fn uname(&self) -> String {
        String::from_utf8_lossy(trim_nul(self.field(265, 32))).into_owned()
    }

    pub fn set_uname(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(32);
        self.field_mut(265, 32)[..len].copy_from_slice(&bytes[..len]);
    }

    pub fn gname(&self) -> String {
        String::from_utf8_lossy(trim_nul(self.field(297, 32))).into_owned()
    }

    pub fn set_gname(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(32);
        self.field_mut(297, 32)[..len].copy_from_slice(&bytes[..len]);
    }

    pub fn devmajor(&self) -> Result<u32, FormatError> {
        Ok(parse_number(self.field(329, 8), "ustar")? as u32)
    }

    pub fn set_devmajor(&mut self, v: u32) {
        format_octal(self.field_mut(329, 8), u64::from(v));
    }

    pub fn devminor(&self) -> Result<u32, FormatError> {
        Ok(parse_number(self.field(337, 8), "ustar")? as u32)
    }

    pub fn set_devminor(&mut self, v: u32) {
        format_octal(self.field_mut(337, 8), u64::from(v));
    }

    /// Computes the header checksum per POSIX: sum of all 512 bytes
    /// with the checksum field itself treated as eight ASCII spaces.
    pub fn compute_checksum(&self) -> u32 {
        let mut sum: u32 = 0;
        for (i, &b) in self.bytes.iter().enumerate() {
            sum += if (148..156).contains(&i) { b' ' as u32 } else { u32::from(b) };
        }
        sum
    }

    pub fn stored_checksum(&self) -> Result<u32, FormatError> {
        Ok(parse_number(self.field(148, 8), "ustar")? as u32)
    }

    pub fn set_checksum(&mut self) {
        let sum = self.compute_checksum();
        let field = self.field_mut(148, 8);
        let text = format!("{sum:06o}\0 ", sum = sum);
        field[..text.len().min(8)].copy_from_slice(&text.as_bytes()[..text.len().min(8)]);
    }

    pub fn filetype(&self) -> FileType {
        match self.typeflag() {
            TYPE_REGULAR | TYPE_REGULAR_ALT => FileType::Regular,
            TYPE_HARDLINK => FileType::HardlinkReference,
            TYPE_SYMLINK => FileType::Symlink,
            TYPE_CHARDEV => FileType::CharDevice,
            TYPE_BLOCKDEV => FileType::BlockDevice,
            TYPE_DIRECTORY => FileType::Directory,
            TYPE_FIFO => FileType::Fifo,
            _ => FileType::Regular,
        }
    }

    pub fn set_filetype(&mut self, ft: FileType) {
        let t = match ft {
            FileType::Regular => TYPE_REGULAR,
            FileType::HardlinkReference => TYPE_HARDLINK,
            FileType::Symlink => TYPE_SYMLINK,
            FileType::CharDevice => TYPE_CHARDEV,
            FileType::BlockDevice => TYPE_BLOCKDEV,
            FileType::Directory => TYPE_DIRECTORY,
            FileType::Fifo => TYPE_FIFO,
            FileType::Socket => TYPE_REGULAR, // tar has no socket typeflag; closest lossy fallback.
        };
        self.set_typeflag(t);
    }
}

fn trim_nul(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let field = &field[..end];
    let end = field.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    &field[..end]
}

/// Parses a numeric tar field: either space/NUL-padded octal digits, or
/// (the GNU/star "base-256" extension, used for values too large for
/// the octal field width) a leading `0x80` byte followed by a raw
/// big-endian binary integer filling the rest of the field.
pub fn parse_number(field: &[u8], format: &'static str) -> Result<u64, FormatError> {
    if field.first() == Some(&0x80) {
        let mut value: u64 = 0;
        for &b in &field[1..] {
            value = (value << 8) | u64::from(b);
        }
        return Ok(value);
    }
    let text = trim_nul(field);
    if text.is_empty() {
        return Ok(0);
    }
    let text = std::str::from_utf8(text)
        .map_err(|_| FormatError::Malformed { format, detail: "non-UTF8 numeric field".into() })?
        .trim();
    u64::from_str_radix(text, 8)
        .map_err(|_| FormatError::Malformed { format, detail: format!("bad octal field {text:?}") })
}

fn format_octal(field: &mut [u8], value: u64) {
    let width = field.len() - 1;
    let text = format!("{value:0width$o}", width = width);
    let take = text.len().min(width);
    let start = width - take;
    field[..start].fill(b'0');
    field[start..width].copy_from_slice(&text.as_bytes()[text.len() - take..]);
    field[width] = 0;
}

/// Formats a value that may not fit in the classic octal field width by
/// falling back to base-256 encoding, matching GNU tar's behavior for
/// sizes/times beyond ~8GB or pre-1970/post-2242 timestamps.
fn format_number(field: &mut [u8], value: u64) {
    let width = field.len() - 1;
    let max_octal = (1u64 << (3 * width)) - 1;
    if value <= max_octal {
        format_octal(field, value);
        return;
    }
    field[0] = 0x80;
    for i in (1..field.len()).rev() {
        field[i] = (value >> (8 * (field.len() - 1 - i))) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octal_round_trips() {
        let mut h = RawHeader::zeroed();
        h.set_size(12345);
        assert_eq!(h.size().unwrap(), 12345);
    }

    #[test]
    fn base256_round_trips_oversized_values() {
        let mut h = RawHeader::zeroed();
        let big = 0x1_0000_0000u64;
        h.set_size(big);
        assert_eq!(h.size().unwrap(), big);
    }

    #[test]
    fn checksum_is_self_consistent() {
        let mut h = RawHeader::zeroed();
        h.set_name(b"a");
        h.set_size(5);
        h.set_checksum();
        assert_eq!(h.stored_checksum().unwrap(), h.compute_checksum());
    }

    #[test]
    fn name_splits_long_paths_into_prefix_and_name() {
        let mut h = RawHeader::zeroed();
        let long_dir = "a/".repeat(60);
        let path = format!("{long_dir}file.txt");
        h.set_name(path.as_bytes());
        assert_eq!(h.name(), path.as_bytes());
    }

    #[test]
    fn end_marker_detects_all_zero_block() {
        let h = RawHeader::zeroed();
        assert!(h.is_end_marker());
        let mut h2 = RawHeader::zeroed();
        h2.set_name(b"x");
        assert!(!h2.is_end_marker());
    }
}
