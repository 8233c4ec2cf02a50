//! The zip format. Unlike every other family in this crate, each zip
//! entry carries its own compression method — there is no outer filter
//! chain doing that job — so this module talks to `flate2`'s low-level
//! `Compress`/`Decompress` engines directly instead of going through
//! `archive-filters`.
//!
//! Reading is local-header streaming only (spec.md §6.5): entries are
//! discovered one at a time from their local file headers, including
//! the general-purpose bit 3 "length at end" case where the real crc
//! and sizes only become known from a trailing data descriptor. This
//! means unix permissions and symlink targets, which real zip tools
//! keep in the central directory (or Unix extra fields this module
//! doesn't parse), aren't available here — entries come back as plain
//! files and directories. Writing always uses bit 3 for the same
//! reason this module never seeks backward, and always emits a central
//! directory plus end-of-central-directory record at `close`.

pub mod crc32;

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use archive_core::entry::{Entry, FileType, Timestamp};
use archive_core::error::Result;
use archive_core::read::{DataBlock, FormatReader, HeaderOutcome, ReadFilter};
use archive_core::write::{FormatWriter, WriteFilter};

use crc32::Crc32;

use crate::error::FormatError;

const FORMAT_NAME: &str = "zip";

const LOCAL_FILE_HEADER_SIG: u32 = 0x0403_4b50;
const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;
const CENTRAL_DIR_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn read_exact(pipe: &mut dyn ReadFilter, n: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        let avail = pipe.read_ahead(n - filled)?;
        if avail.is_empty() {
            return Err(FormatError::Truncated { format: FORMAT_NAME, detail: "truncated zip header".into() }.into());
        }
        let take = avail.len().min(n - filled);
        out[filled..filled + take].copy_from_slice(&avail[..take]);
        filled += pipe.consume(take)?;
    }
    Ok(out)
}

/// Days since the Unix epoch for a proleptic-Gregorian civil date
/// (Howard Hinnant's `days_from_civil`).
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m as u32, d as u32)
}

fn dos_to_unix(dos_time: u16, dos_date: u16) -> i64 {
    let seconds = i64::from((dos_time & 0x1f) * 2);
    let minutes = i64::from((dos_time >> 5) & 0x3f);
    let hours = i64::from((dos_time >> 11) & 0x1f);
    let day = i64::from(dos_date & 0x1f).max(1);
    let month = i64::from((dos_date >> 5) & 0xf).max(1);
    let year = i64::from((dos_date >> 9) & 0x7f) + 1980;
    days_from_civil(year, month, day) * 86400 + hours * 3600 + minutes * 60 + seconds
}

fn unix_to_dos(secs: i64) -> (u16, u16) {
    let secs = secs.max(days_from_civil(1980, 1, 1) * 86400);
    let days = secs.div_euclid(86400);
    let rem = secs.rem_euclid(86400);
    let (year, month, day) = civil_from_days(days);
    let year = year.max(1980);
    let hours = rem / 3600;
    let minutes = (rem % 3600) / 60;
    let seconds = rem % 60;
    let dos_time = ((hours as u16) << 11) | ((minutes as u16) << 5) | ((seconds / 2) as u16);
    let dos_date = (((year - 1980) as u16) << 9) | ((month as u16) << 5) | (day as u16);
    (dos_time, dos_date)
}

#[derive(Default)]
pub struct Reader {
    method: u16,
    streaming: bool,
    uncompressed_declared: u64,
    uncompressed_delivered: u64,
    crc_expected: u32,
    crc_running: Crc32,
    inflater: Option<Decompress>,
    finished: bool,
    pending_error: Option<FormatError>,
}

impl FormatReader for Reader {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn bid(&mut self, pipe: &mut dyn ReadFilter) -> Result<i64> {
        let avail = pipe.read_ahead(4)?;
        Ok(if avail.len() >= 4 && le_u32(avail) == LOCAL_FILE_HEADER_SIG { 50 } else { 0 })
    }

    fn read_header(&mut self, pipe: &mut dyn ReadFilter, entry: &mut Entry) -> Result<HeaderOutcome> {
        let peek = pipe.read_ahead(4)?;
        if peek.len() >= 4 {
            let sig = le_u32(peek);
            if sig == CENTRAL_DIR_SIG || sig == EOCD_SIG {
                return Ok(HeaderOutcome::Eof);
            }
        }

        let header = read_exact(pipe, 30)?;
        if le_u32(&header[0..4]) != LOCAL_FILE_HEADER_SIG {
            return Err(FormatError::Malformed { format: FORMAT_NAME, detail: "bad local file header signature".into() }.into());
        }
        let gp_flag = le_u16(&header[6..8]);
        let method = le_u16(&header[8..10]);
        let mod_time = le_u16(&header[10..12]);
        let mod_date = le_u16(&header[12..14]);
        let crc = le_u32(&header[14..18]);
        // compressed_size is read but not tracked: stored data is exactly
        // uncompressed_size long, and deflate's self-terminating end
        // marker is what actually bounds a compressed entry's body.
        let _compressed_size = u64::from(le_u32(&header[18..22]));
        let uncompressed_size = u64::from(le_u32(&header[22..26]));
        let name_len = le_u16(&header[26..28]) as usize;
        let extra_len = le_u16(&header[28..30]) as usize;

        if method != METHOD_STORED && method != METHOD_DEFLATE {
            return Err(FormatError::NotImplemented { format: "zip (compression method)" }.into());
        }

        let name = read_exact(pipe, name_len)?;
        let _extra = read_exact(pipe, extra_len)?;

        let streaming = gp_flag & FLAG_DATA_DESCRIPTOR != 0;
        if streaming && method == METHOD_STORED {
            return Err(FormatError::NotImplemented { format: "zip (stored data with unknown length)" }.into());
        }

        entry.pathname = name;
        entry.filetype = if entry.pathname.last() == Some(&b'/') { FileType::Directory } else { FileType::Regular };
        entry.mode = if entry.filetype == FileType::Directory { 0o755 } else { 0o644 };
        entry.mtime = Some(Timestamp::new(dos_to_unix(mod_time, mod_date), 0));
        entry.size = if streaming { 0 } else { uncompressed_size };

        self.method = method;
        self.streaming = streaming;
        self.uncompressed_declared = uncompressed_size;
        self.uncompressed_delivered = 0;
        self.crc_expected = crc;
        self.crc_running = Crc32::new();
        self.inflater = (method == METHOD_DEFLATE).then(|| Decompress::new(false));
        self.finished = false;
        self.pending_error = None;

        Ok(HeaderOutcome::Ok)
    }

    fn read_data(&mut self, pipe: &mut dyn ReadFilter) -> Result<Option<DataBlock>> {
        if let Some(err) = self.pending_error.take() {
            return Err(err.into());
        }
        if self.finished {
            return Ok(None);
        }

        let offset = self.uncompressed_delivered;
        let chunk = match self.method {
            METHOD_STORED => self.read_stored(pipe)?,
            METHOD_DEFLATE => self.read_deflated(pipe)?,
            _ => unreachable!("read_header rejects unknown methods"),
        };

        match chunk {
            Some(data) => {
                self.crc_running.update(&data);
                self.uncompressed_delivered += data.len() as u64;
                Ok(Some(DataBlock { offset, data }))
            }
            None => {
                self.finished = true;
                self.check_crc()?;
                if self.streaming {
                    self.read_data_descriptor(pipe)?;
                }
                if let Some(err) = self.pending_error.take() {
                    return Err(err.into());
                }
                Ok(None)
            }
        }
    }
}

impl Reader {
    fn read_stored(&mut self, pipe: &mut dyn ReadFilter) -> Result<Option<Vec<u8>>> {
        let remaining = self.uncompressed_declared - self.uncompressed_delivered;
        if remaining == 0 {
            return Ok(None);
        }
        let want = remaining.min(64 * 1024) as usize;
        let avail = pipe.read_ahead(want)?;
        if avail.is_empty() {
            return Err(FormatError::Truncated { format: FORMAT_NAME, detail: "short zip entry body".into() }.into());
        }
        let take = avail.len().min(want);
        let data = avail[..take].to_vec();
        pipe.consume(take)?;
        Ok(Some(data))
    }

    fn read_deflated(&mut self, pipe: &mut dyn ReadFilter) -> Result<Option<Vec<u8>>> {
        let mut output = vec![0u8; 32 * 1024];
        loop {
            let inflater = self.inflater.as_mut().expect("deflate reader missing its engine");
            let avail = pipe.read_ahead(8192)?;
            let before_in = inflater.total_in();
            let before_out = inflater.total_out();
            let flush = if avail.is_empty() { FlushDecompress::Finish } else { FlushDecompress::None };
            let status = inflater
                .decompress(avail, &mut output, flush)
                .map_err(|_| FormatError::Malformed { format: FORMAT_NAME, detail: "corrupt deflate stream".into() })?;
            let consumed = (inflater.total_in() - before_in) as usize;
            let produced = (inflater.total_out() - before_out) as usize;
            if consumed > 0 {
                pipe.consume(consumed)?;
            }
            if produced > 0 {
                output.truncate(produced);
                return Ok(Some(output));
            }
            if status == Status::StreamEnd {
                return Ok(None);
            }
            if avail.is_empty() && consumed == 0 {
                return Err(FormatError::Truncated { format: FORMAT_NAME, detail: "truncated deflate stream".into() }.into());
            }
        }
    }

    fn check_crc(&mut self) -> Result<()> {
        if !self.streaming && self.crc_running.finalize() != self.crc_expected {
            self.pending_error = Some(FormatError::BadChecksum { format: FORMAT_NAME });
        }
        Ok(())
    }

    fn read_data_descriptor(&mut self, pipe: &mut dyn ReadFilter) -> Result<()> {
        let first = read_exact(pipe, 4)?;
        let crc = if le_u32(&first) == DATA_DESCRIPTOR_SIG {
            let rest = read_exact(pipe, 8)?;
            le_u32(&rest[0..4])
        } else {
            let rest = read_exact(pipe, 8)?;
            let _compressed = le_u32(&rest[0..4]);
            let _uncompressed = le_u32(&rest[4..8]);
            le_u32(&first)
        };
        if self.crc_running.finalize() != crc {
            self.pending_error = Some(FormatError::BadChecksum { format: FORMAT_NAME });
        }
        Ok(())
    }
}

struct CentralRecord {
    name: Vec<u8>,
    method: u16,
    mod_time: u16,
    mod_date: u16,
    crc: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
    mode: u32,
    is_dir: bool,
}

#[derive(Default)]
pub struct Writer {
    entries: Vec<CentralRecord>,
    // Current entry state.
    name: Vec<u8>,
    mode: u32,
    is_dir: bool,
    mod_time: u16,
    mod_date: u16,
    local_header_offset: u64,
    method: u16,
    deflater: Option<Compress>,
    crc_running: Crc32,
    compressed_size: u64,
    uncompressed_size: u64,
}

impl FormatWriter for Writer {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn write_header(&mut self, pipe: &mut dyn WriteFilter, entry: &Entry) -> Result<()> {
        self.local_header_offset = pipe.bytes_written();
        self.name = entry.pathname.clone();
        self.mode = entry.mode;
        self.is_dir = entry.filetype == FileType::Directory;
        let (mod_time, mod_date) = unix_to_dos(entry.mtime.map_or(0, |t| t.secs));
        self.mod_time = mod_time;
        self.mod_date = mod_date;
        self.crc_running = Crc32::new();
        self.compressed_size = 0;
        self.uncompressed_size = 0;
        self.method = if self.is_dir || entry.wire_size() == 0 { METHOD_STORED } else { METHOD_DEFLATE };
        self.deflater = (self.method == METHOD_DEFLATE).then(|| Compress::new(Compression::default(), false));

        let mut header = [0u8; 30];
        header[0..4].copy_from_slice(&LOCAL_FILE_HEADER_SIG.to_le_bytes());
        header[4..6].copy_from_slice(&20u16.to_le_bytes());
        header[6..8].copy_from_slice(&FLAG_DATA_DESCRIPTOR.to_le_bytes());
        header[8..10].copy_from_slice(&self.method.to_le_bytes());
        header[10..12].copy_from_slice(&mod_time.to_le_bytes());
        header[12..14].copy_from_slice(&mod_date.to_le_bytes());
        // crc32/compressed/uncompressed sizes are zero here; the real
        // values follow in the trailing data descriptor.
        header[26..28].copy_from_slice(&(self.name.len() as u16).to_le_bytes());
        pipe.write(&header)?;
        pipe.write(&self.name)?;
        Ok(())
    }

    fn write_data(&mut self, pipe: &mut dyn WriteFilter, buf: &[u8]) -> Result<usize> {
        self.crc_running.update(buf);
        self.uncompressed_size += buf.len() as u64;
        match self.method {
            METHOD_STORED => {
                pipe.write(buf)?;
                self.compressed_size += buf.len() as u64;
            }
            METHOD_DEFLATE => self.deflate_chunk(pipe, buf, false)?,
            _ => unreachable!("write_header only ever selects stored or deflate"),
        }
        Ok(buf.len())
    }

    fn finish_entry(&mut self, pipe: &mut dyn WriteFilter) -> Result<()> {
        if self.method == METHOD_DEFLATE {
            self.deflate_chunk(pipe, &[], true)?;
        }

        let crc = self.crc_running.finalize();
        let mut descriptor = [0u8; 16];
        descriptor[0..4].copy_from_slice(&DATA_DESCRIPTOR_SIG.to_le_bytes());
        descriptor[4..8].copy_from_slice(&crc.to_le_bytes());
        descriptor[8..12].copy_from_slice(&(self.compressed_size as u32).to_le_bytes());
        descriptor[12..16].copy_from_slice(&(self.uncompressed_size as u32).to_le_bytes());
        pipe.write(&descriptor)?;

        self.entries.push(CentralRecord {
            name: std::mem::take(&mut self.name),
            method: self.method,
            mod_time: self.mod_time,
            mod_date: self.mod_date,
            crc,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            local_header_offset: self.local_header_offset,
            mode: self.mode,
            is_dir: self.is_dir,
        });
        Ok(())
    }

    fn close(&mut self, pipe: &mut dyn WriteFilter) -> Result<()> {
        let central_dir_offset = pipe.bytes_written();
        for record in &self.entries {
            let mut header = [0u8; 46];
            header[0..4].copy_from_slice(&CENTRAL_DIR_SIG.to_le_bytes());
            header[4..6].copy_from_slice(&0x0314u16.to_le_bytes());
            header[6..8].copy_from_slice(&20u16.to_le_bytes());
            header[8..10].copy_from_slice(&FLAG_DATA_DESCRIPTOR.to_le_bytes());
            header[10..12].copy_from_slice(&record.method.to_le_bytes());
            header[12..14].copy_from_slice(&record.mod_time.to_le_bytes());
            header[14..16].copy_from_slice(&record.mod_date.to_le_bytes());
            header[16..20].copy_from_slice(&record.crc.to_le_bytes());
            header[20..24].copy_from_slice(&(record.compressed_size as u32).to_le_bytes());
            header[24..28].copy_from_slice(&(record.uncompressed_size as u32).to_le_bytes());
            header[28..30].copy_from_slice(&(record.name.len() as u16).to_le_bytes());
            let unix_mode = record.mode | if record.is_dir { 0o40000 } else { 0o100000 };
            let dos_dir_attr: u32 = if record.is_dir { 0x10 } else { 0 };
            let external_attrs = (unix_mode << 16) | dos_dir_attr;
            header[38..42].copy_from_slice(&external_attrs.to_le_bytes());
            header[42..46].copy_from_slice(&(record.local_header_offset as u32).to_le_bytes());
            pipe.write(&header)?;
            pipe.write(&record.name)?;
        }
        let central_dir_size = pipe.bytes_written() - central_dir_offset;

        let mut eocd = [0u8; 22];
        eocd[0..4].copy_from_slice(&EOCD_SIG.to_le_bytes());
        eocd[8..10].copy_from_slice(&(self.entries.len() as u16).to_le_bytes());
        eocd[10..12].copy_from_slice(&(self.entries.len() as u16).to_le_bytes());
        eocd[12..16].copy_from_slice(&(central_dir_size as u32).to_le_bytes());
        eocd[16..20].copy_from_slice(&(central_dir_offset as u32).to_le_bytes());
        pipe.write(&eocd)?;
        Ok(())
    }
}

impl Writer {
    fn deflate_chunk(&mut self, pipe: &mut dyn WriteFilter, input: &[u8], finish: bool) -> Result<()> {
        let flush = if finish { FlushCompress::Finish } else { FlushCompress::None };
        let mut output = vec![0u8; 32 * 1024];
        let mut offset = 0;
        loop {
            let deflater = self.deflater.as_mut().expect("deflate writer missing its engine");
            let before_in = deflater.total_in();
            let before_out = deflater.total_out();
            let status = deflater
                .compress(&input[offset..], &mut output, flush)
                .map_err(|_| FormatError::Malformed { format: FORMAT_NAME, detail: "deflate encoder failure".into() })?;
            let consumed = (deflater.total_in() - before_in) as usize;
            let produced = (deflater.total_out() - before_out) as usize;
            offset += consumed;
            if produced > 0 {
                pipe.write(&output[..produced])?;
                self.compressed_size += produced as u64;
            }
            if status == Status::StreamEnd || (offset >= input.len() && produced == 0 && !finish) {
                break;
            }
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
    fn dos_time_round_trips() {
        let (t, d) = unix_to_dos(1_700_000_000);
        let back = dos_to_unix(t, d);
        assert!((back - 1_700_000_000).abs() <= 2);
    }

    #[test]
    fn writes_and_reads_back_a_stored_empty_directory() {
        let mut writer = Writer::default();
        let mut sink = VecSink(Vec::new());
        let entry = Entry {
            pathname: b"dir/".to_vec(),
            filetype: FileType::Directory,
            mode: 0o755,
            ..Default::default()
        };
        writer.write_header(&mut sink, &entry).unwrap();
        writer.finish_entry(&mut sink).unwrap();
        writer.close(&mut sink).unwrap();

        let mut reader = Reader::default();
        let mut source = VecSource(sink.0.into());
        let mut read_entry = Entry::default();
        match reader.read_header(&mut source, &mut read_entry).unwrap() {
            HeaderOutcome::Ok => {}
            HeaderOutcome::Eof => panic!("expected a header"),
        }
        assert_eq!(read_entry.pathname, b"dir/");
        assert_eq!(read_entry.filetype, FileType::Directory);
    }

    #[test]
    fn writes_and_reads_back_a_deflated_file() {
        let mut writer = Writer::default();
        let mut sink = VecSink(Vec::new());
        let body = b"hello hello hello hello hello".to_vec();
        let entry = Entry {
            pathname: b"hello.txt".to_vec(),
            filetype: FileType::Regular,
            mode: 0o644,
            size: body.len() as u64,
            ..Default::default()
        };
        writer.write_header(&mut sink, &entry).unwrap();
        writer.write_data(&mut sink, &body).unwrap();
        writer.finish_entry(&mut sink).unwrap();
        writer.close(&mut sink).unwrap();

        let mut reader = Reader::default();
        let mut source = VecSource(sink.0.into());
        let mut read_entry = Entry::default();
        reader.read_header(&mut source, &mut read_entry).unwrap();
        assert_eq!(read_entry.pathname, b"hello.txt");

        let mut collected = Vec::new();
        while let Some(block) = reader.read_data(&mut source).unwrap() {
            collected.extend_from_slice(&block.data);
        }
        assert_eq!(collected, body);
    }
}
