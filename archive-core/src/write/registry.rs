//! Format dispatch, write side (spec.md §4.4). Exactly one active
//! format slot, selected at open time.

use crate::entry::Entry;
use crate::error::Result;

use super::filter::WriteFilter;

/// A pluggable archive format writer.
pub trait FormatWriter {
    fn name(&self) -> &'static str;

    /// Optional one-time setup.
    fn init(&mut self, pipe: &mut dyn WriteFilter) -> Result<()> {
        let _ = pipe;
        Ok(())
    }

    fn options(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        let _ = (key, value);
        Ok(())
    }

    fn write_header(&mut self, pipe: &mut dyn WriteFilter, entry: &Entry) -> Result<()>;

    /// Writes entry body data. The plug-in is responsible for the
    /// size-contract: truncating if the caller over-writes the declared
    /// size, padding at `finish_entry` if the caller under-delivers.
    /// Returns the number of bytes accepted (may be less than `buf.len()`
    /// if the declared size has been reached — a short count, not an
    /// error).
    fn write_data(&mut self, pipe: &mut dyn WriteFilter, buf: &[u8]) -> Result<usize>;

    /// Pads with zero if the caller wrote fewer bytes than declared.
    fn finish_entry(&mut self, pipe: &mut dyn WriteFilter) -> Result<()>;

    /// Writes the final volume trailer (tar: two zero blocks, etc).
    fn close(&mut self, pipe: &mut dyn WriteFilter) -> Result<()> {
        let _ = pipe;
        Ok(())
    }
}

/// Pads `written` up to `declared` with zero bytes via `pipe`. Shared
/// helper for format plug-ins implementing the size-contract.
pub fn pad_with_zeros(pipe: &mut dyn WriteFilter, written: u64, declared: u64) -> Result<()> {
    if written >= declared {
        return Ok(());
    }
    let mut remaining = declared - written;
    let zeros = [0u8; 8192];
    while remaining > 0 {
        let n = remaining.min(zeros.len() as u64) as usize;
        pipe.write(&zeros[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}

/// Holds the single active write format.
pub struct WriterRegistry {
    active: Option<Box<dyn FormatWriter>>,
}

impl Default for WriterRegistry {
    fn default() -> Self {
        Self { active: None }
    }
}

impl WriterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, format: Box<dyn FormatWriter>) {
        self.active = Some(format);
    }

    pub fn active(&self) -> Option<&dyn FormatWriter> {
        self.active.as_deref()
    }

    pub fn active_mut(&mut self) -> Option<&mut (dyn FormatWriter + 'static)> {
        self.active.as_deref_mut()
    }
}
