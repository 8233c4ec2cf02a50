//! Pax extended-header records: the `%d %s=%s\n` key=value lines POSIX.1-2001
//! tar uses to carry a path, linkname, size, or timestamp too wide for its
//! ustar field, plus sub-second `mtime`/`atime`/`ctime` precision ustar has
//! no field for at all. [`super::ustar`]'s reader parses these records
//! inline (every pax archive is still a valid ustar-magic stream); this
//! module owns the record codec and the pax-dialect writer.

use archive_core::entry::{Entry, Timestamp};
use archive_core::error::Result;
use archive_core::write::{pad_with_zeros, FormatWriter, WriteFilter};

use super::header::{RawHeader, TYPE_PAX_EXTENDED};
use super::{write_block, write_end_markers, write_padding};
use crate::error::FormatError;

const FORMAT_NAME: &str = "pax";

/// Parses the body of one `x`/`g`-typeflag entry into `(key, value)`
/// pairs, per the `"%d %s=%s\n"` record format.
pub(crate) fn parse_records(body: &[u8]) -> Result<Vec<(String, String)>> {
    let mut records = Vec::new();
    let mut pos = 0;
    while pos < body.len() {
        let space = body[pos..]
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| FormatError::Malformed { format: FORMAT_NAME, detail: "missing record length".into() })?;
        let len_text = std::str::from_utf8(&body[pos..pos + space])
            .map_err(|_| FormatError::Malformed { format: FORMAT_NAME, detail: "non-UTF8 record length".into() })?;
        let record_len: usize = len_text
            .parse()
            .map_err(|_| FormatError::Malformed { format: FORMAT_NAME, detail: format!("bad record length {len_text:?}") })?;
        if record_len == 0 || pos + record_len > body.len() {
            return Err(FormatError::Malformed { format: FORMAT_NAME, detail: "record length out of range".into() }.into());
        }
        let record = &body[pos + space + 1..pos + record_len];
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        let eq = record
            .iter()
            .position(|&b| b == b'=')
            .ok_or_else(|| FormatError::Malformed { format: FORMAT_NAME, detail: "missing '=' in record".into() })?;
        let key = String::from_utf8_lossy(&record[..eq]).into_owned();
        let value = String::from_utf8_lossy(&record[eq + 1..]).into_owned();
        records.push((key, value));
        pos += record_len;
    }
    Ok(records)
}

/// Applies parsed pax records onto an already-ustar-populated entry,
/// overriding whatever the base header said.
pub(crate) fn apply_records(entry: &mut Entry, records: &[(String, String)]) {
    for (key, value) in records {
        match key.as_str() {
            "path" => entry.pathname = value.as_bytes().to_vec(),
            "linkpath" => {
                if entry.filetype == archive_core::entry::FileType::Symlink {
                    entry.symlink = Some(value.as_bytes().to_vec());
                } else {
                    entry.hardlink = Some(value.as_bytes().to_vec());
                }
            }
            "size" => {
                if let Ok(size) = value.parse() {
                    entry.size = size;
                }
            }
            "uid" => {
                if let Ok(uid) = value.parse() {
                    entry.uid = uid;
                }
            }
            "gid" => {
                if let Ok(gid) = value.parse() {
                    entry.gid = gid;
                }
            }
            "uname" => entry.uname = Some(value.clone()),
            "gname" => entry.gname = Some(value.clone()),
            "mtime" => entry.mtime = parse_pax_time(value),
            "atime" => entry.atime = parse_pax_time(value),
            "ctime" => entry.ctime = parse_pax_time(value),
            _ => {}
        }
    }
}

fn parse_pax_time(value: &str) -> Option<Timestamp> {
    let (secs_text, nanos) = match value.split_once('.') {
        Some((secs, frac)) => {
            let mut frac = frac.to_string();
            frac.truncate(9);
            while frac.len() < 9 {
                frac.push('0');
            }
            (secs, frac.parse().unwrap_or(0))
        }
        None => (value, 0),
    };
    secs_text.parse().ok().map(|secs| Timestamp::new(secs, nanos))
}

fn format_pax_time(t: Timestamp) -> String {
    if t.nanos == 0 {
        format!("{}", t.secs)
    } else {
        format!("{}.{:09}", t.secs, t.nanos)
    }
}

/// Builds one self-describing pax record: the length prefix must
/// include its own digit count, so this iterates to a fixed point the
/// way every pax implementation does.
fn format_record(key: &str, value: &str) -> Vec<u8> {
    let tail = format!(" {key}={value}\n");
    let mut len = tail.len();
    loop {
        let candidate = len.to_string().len() + tail.len();
        if candidate == len {
            break;
        }
        len = candidate;
    }
    format!("{len}{tail}").into_bytes()
}

fn needs_extended_header(entry: &Entry) -> Vec<(String, String)> {
    let mut records = Vec::new();
    if entry.pathname.len() > 100 {
        records.push(("path".to_string(), String::from_utf8_lossy(&entry.pathname).into_owned()));
    }
    let link = entry.hardlink.as_deref().or(entry.symlink.as_deref());
    if let Some(link) = link {
        if link.len() > 100 {
            records.push(("linkpath".to_string(), String::from_utf8_lossy(link).into_owned()));
        }
    }
    if let Some(mtime) = entry.mtime {
        if mtime.nanos != 0 {
            records.push(("mtime".to_string(), format_pax_time(mtime)));
        }
    }
    if let Some(atime) = entry.atime {
        records.push(("atime".to_string(), format_pax_time(atime)));
    }
    if let Some(ctime) = entry.ctime {
        records.push(("ctime".to_string(), format_pax_time(ctime)));
    }
    records
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
        let records = needs_extended_header(entry);
        if !records.is_empty() {
            let mut body = Vec::new();
            for (key, value) in &records {
                body.extend_from_slice(&format_record(key, value));
            }
            let mut raw = RawHeader::zeroed();
            raw.set_name(b"PaxHeader/extended");
            raw.set_mode(0o644);
            raw.set_size(body.len() as u64);
            raw.set_typeflag(TYPE_PAX_EXTENDED);
            raw.set_magic_ustar();
            raw.set_checksum();
            write_block(pipe, &raw)?;
            pipe.write(&body)?;
            write_padding(pipe, body.len() as u64)?;
        }

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
            raw.set_typeflag(super::header::TYPE_HARDLINK);
        }
        raw.set_magic_ustar();
        raw.set_uname(entry.uname.as_deref().unwrap_or(""));
        raw.set_gname(entry.gname.as_deref().unwrap_or(""));
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

    #[test]
    fn record_length_prefix_is_self_consistent() {
        let record = format_record("path", "abc");
        let text = std::str::from_utf8(&record).unwrap();
        let space = text.find(' ').unwrap();
        let declared: usize = text[..space].parse().unwrap();
        assert_eq!(declared, record.len());
    }

    #[test]
    fn records_round_trip_through_parse() {
        let mut body = Vec::new();
        body.extend_from_slice(&format_record("path", "some/long/name"));
        body.extend_from_slice(&format_record("uid", "1000"));
        let parsed = parse_records(&body).unwrap();
        assert_eq!(parsed[0], ("path".to_string(), "some/long/name".to_string()));
        assert_eq!(parsed[1], ("uid".to_string(), "1000".to_string()));
    }

    #[test]
    fn fractional_mtime_round_trips() {
        let t = Timestamp::new(1_700_000_000, 500_000_000);
        let text = format_pax_time(t);
        assert_eq!(parse_pax_time(&text), Some(t));
    }
}
