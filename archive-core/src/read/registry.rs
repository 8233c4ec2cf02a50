//! Format dispatch, read side (spec.md §4.3).

use crate::entry::Entry;
use crate::error::{Error, Result};

use super::filter::ReadFilter;

/// Maximum number of format plug-ins a reader can hold. libarchive sizes
/// its own `formats[]` array to whatever's compiled in; we size ours to
/// comfortably hold every built-in reader (`archive_formats::default_readers`)
/// plus headroom for a caller-supplied one.
pub const MAX_FORMAT_SLOTS: usize = 16;

/// Outcome of [`FormatReader::read_header`] other than a hard error.
pub enum HeaderOutcome {
    /// A header was read; `entry` has been populated.
    Ok,
    /// No more entries (end of archive).
    Eof,
}

/// One chunk of an entry's body plus its logical offset, for sparse
/// files whose chunk offsets may jump ahead of the previous chunk's end.
pub struct DataBlock {
    pub offset: u64,
    pub data: Vec<u8>,
}

/// A pluggable archive format reader (spec.md §4.3's per-slot vtable).
pub trait FormatReader {
    fn name(&self) -> &'static str;

    /// Inspects the stream (via `read_ahead` only — no consumption) and
    /// returns a confidence score; `0` means "not this format." An `Err`
    /// aborts the whole open (see [`choose_format`]).
    fn bid(&mut self, pipe: &mut dyn ReadFilter) -> Result<i64>;

    /// Accepts a format-specific option. Unknown keys should be ignored
    /// (the caller-facing options parser in [`crate::options`] already
    /// filtered by module prefix).
    fn options(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        let _ = (key, value);
        Ok(())
    }

    /// Consumes bytes up through the next header and populates `entry`.
    fn read_header(&mut self, pipe: &mut dyn ReadFilter, entry: &mut Entry) -> Result<HeaderOutcome>;

    /// Delivers the next chunk of the current entry's body, or `None`
    /// when the entry is exhausted.
    fn read_data(&mut self, pipe: &mut dyn ReadFilter) -> Result<Option<DataBlock>>;

    /// Consumes and discards the remainder of the current entry's body.
    /// Default implementation repeatedly calls `read_data` and drops
    /// the result; format plug-ins with a cheaper skip path (e.g. a
    /// length-prefixed body) should override this.
    fn read_data_skip(&mut self, pipe: &mut dyn ReadFilter) -> Result<()> {
        while self.read_data(pipe)?.is_some() {}
        Ok(())
    }
}

/// Holds up to [`MAX_FORMAT_SLOTS`] registered format readers and runs
/// the bidding protocol to pick one.
#[derive(Default)]
pub struct ReaderRegistry {
    formats: Vec<Box<dyn FormatReader>>,
    active: Option<usize>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a format reader. Panics (programmer error, not a
    /// runtime condition) if the registry is already at capacity.
    pub fn register(&mut self, format: Box<dyn FormatReader>) {
        assert!(
            self.formats.len() < MAX_FORMAT_SLOTS,
            "not enough slots for format registration (max {MAX_FORMAT_SLOTS})"
        );
        self.formats.push(format);
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn active(&self) -> Option<&dyn FormatReader> {
        self.active.map(|i| self.formats[i].as_ref())
    }

    pub fn active_mut(&mut self) -> Option<&mut (dyn FormatReader + 'static)> {
        self.active.map(move |i| self.formats[i].as_mut())
    }

    /// Runs the bidding protocol (spec.md §4.3): every registrant bids,
    /// the strictly-highest positive bid wins with ties broken by
    /// registration order. No registrants at all is a programmer error;
    /// all-zero bids is a recoverable "unrecognized format" error. A
    /// fatal bid from any registrant aborts immediately.
    pub fn choose_format(&mut self, pipe: &mut dyn ReadFilter) -> Result<()> {
        if self.formats.is_empty() {
            panic!(
                "no formats were registered; you must register at least one format \
                 reader before reading an archive"
            );
        }

        let mut best_bid = i64::MIN;
        let mut best_slot: Option<usize> = None;
        for (i, format) in self.formats.iter_mut().enumerate() {
            let bid = format.bid(pipe)?;
            if bid > best_bid {
                best_bid = bid;
                best_slot = Some(i);
            }
        }

        match best_slot {
            Some(slot) if best_bid > 0 => {
                self.active = Some(slot);
                Ok(())
            }
            _ => Err(Error::fatal_format("unrecognized archive format")),
        }
    }
}
