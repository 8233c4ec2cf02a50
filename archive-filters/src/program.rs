//! The `program` codec: feeds the stream through an external command's
//! stdin and reads its stdout, for compressors this crate doesn't wrap
//! natively (`zstd`, `lz4`, a site-local tool). Spawns a writer thread
//! so a pipe that fills up on one side can't deadlock the other, the
//! same shape libarchive's own `archive_write_add_filter_program`/read
//! equivalent uses around its subprocess.
//!
//! Unlike the other codecs, `program` never bids during autodetection —
//! there's no generic signature to recognize an arbitrary external
//! command's output. A client selects it explicitly, by command line,
//! when building the pipeline (mirroring libarchive's API, where
//! `archive_read_support_filter_program` takes the command as an
//! argument rather than being autodetected).

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

use archive_core::error::Result;
use archive_core::read::ReadFilter;
use archive_core::write::WriteFilter;

use crate::error::FilterError;
use crate::pipe_adapter::{UpstreamReader, UpstreamWriter};

fn spawn(command: &str) -> Result<Child> {
    Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| FilterError::from(e).into())
}

/// Read side: spawns `command`, pumps `upstream` into the child's
/// stdin on a background thread, reads decoded bytes from its stdout.
pub struct ProgramReadFilter {
    child: Child,
    feeder: Option<JoinHandle<std::io::Result<()>>>,
    out: Vec<u8>,
    out_pos: usize,
    finished: bool,
    produced_total: u64,
}

impl ProgramReadFilter {
    pub fn new(command: &str, upstream: Box<dyn ReadFilter>) -> Result<Self> {
        let mut child = spawn(command)?;
        let mut stdin = child.stdin.take().expect("piped stdin");
        let feeder = std::thread::spawn(move || -> std::io::Result<()> {
            let mut reader = UpstreamReader::new(upstream);
            std::io::copy(&mut reader, &mut stdin)?;
            Ok(())
        });
        Ok(Self {
            child,
            feeder: Some(feeder),
            out: Vec::new(),
            out_pos: 0,
            finished: false,
            produced_total: 0,
        })
    }
}

impl ReadFilter for ProgramReadFilter {
    fn name(&self) -> &str {
        "program"
    }

    fn read_ahead(&mut self, min: usize) -> Result<&[u8]> {
        if self.out_pos > 0 {
            self.out.drain(..self.out_pos);
            self.out_pos = 0;
        }
        let stdout = self
            .child
            .stdout
            .as_mut()
            .expect("piped stdout");
        let mut chunk = [0u8; 64 * 1024];
        while self.out.len() < min && !self.finished {
            let n = stdout.read(&mut chunk).map_err(FilterError::from)?;
            if n == 0 {
                self.finished = true;
                break;
            }
            self.out.extend_from_slice(&chunk[..n]);
        }
        Ok(&self.out)
    }

    fn consume(&mut self, n: usize) -> Result<usize> {
        let n = n.min(self.out.len() - self.out_pos);
        self.out_pos += n;
        self.produced_total += n as u64;
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(feeder) = self.feeder.take() {
            let _ = feeder.join();
        }
        let status = self.child.wait().map_err(FilterError::from)?;
        if !status.success() {
            return Err(FilterError::ProgramFailed {
                program: "program".into(),
                status: status.code().unwrap_or(-1),
            }
            .into());
        }
        Ok(())
    }

    fn bytes_consumed(&self) -> u64 {
        self.produced_total
    }
}

/// Write side: spawns `command`, writes entries into its stdin, reads
/// its stdout onto a background thread that forwards into `upstream`.
pub struct ProgramWriteFilter {
    child: Child,
    reader: Option<JoinHandle<std::io::Result<()>>>,
    written: u64,
}

impl ProgramWriteFilter {
    pub fn new(command: &str, upstream: Box<dyn WriteFilter>) -> Result<Self> {
        let mut child = spawn(command)?;
        let mut stdout = child.stdout.take().expect("piped stdout");
        let reader = std::thread::spawn(move || -> std::io::Result<()> {
            let mut writer = UpstreamWriter::new(upstream);
            std::io::copy(&mut stdout, &mut writer)?;
            writer.into_inner().close().map_err(|e| std::io::Error::other(e.to_string()))
        });
        Ok(Self {
            child,
            reader: Some(reader),
            written: 0,
        })
    }
}

impl WriteFilter for ProgramWriteFilter {
    fn name(&self) -> &str {
        "program"
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let stdin = self.child.stdin.as_mut().expect("piped stdin");
        stdin.write_all(buf).map_err(FilterError::from)?;
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        let stdin = self.child.stdin.as_mut().expect("piped stdin");
        stdin.flush().map_err(FilterError::from)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Dropping stdin signals EOF to the child; take and drop it
        // explicitly so the reader thread's `io::copy` can return.
        self.child.stdin.take();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        let status = self.child.wait().map_err(FilterError::from)?;
        if !status.success() {
            return Err(FilterError::ProgramFailed {
                program: "program".into(),
                status: status.code().unwrap_or(-1),
            }
            .into());
        }
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}

/// Helper matching the other codecs' module-level `writer()`
/// convention, for a client that already knows the command string at
/// pipeline construction time.
pub fn writer(command: &str, upstream: Box<dyn WriteFilter>) -> Result<Box<dyn WriteFilter>> {
    Ok(Box::new(ProgramWriteFilter::new(command, upstream)?))
}
