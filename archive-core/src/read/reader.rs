//! The reader handle: the public "next header / read data / skip"
//! contract (spec.md §3, §4.3).

use tracing::{debug, error, warn};

use crate::error::{Error, Result, Severity};
use crate::entry::Entry;
use crate::state::{self, State};
use crate::transfer::{ReadSource, SeekableReadSource};

use super::autodetect::{self, FilterBidder};
use super::filter::{skip_exact, IdentityReader, ReadFilter};
use super::registry::{HeaderOutcome, FormatReader, ReaderRegistry};

/// Builds an [`ArchiveReader`] from a source, a set of filter bidders,
/// and a set of format readers, all latched in at construction time
/// (spec.md §9's builder redesign note — no process-global registration
/// state).
pub struct ReaderBuilder {
    bidders: Vec<Box<dyn FilterBidder>>,
    formats: ReaderRegistry,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderBuilder {
    pub fn new() -> Self {
        Self {
            bidders: Vec::new(),
            formats: ReaderRegistry::new(),
        }
    }

    pub fn with_filter(mut self, bidder: Box<dyn FilterBidder>) -> Self {
        self.bidders.push(bidder);
        self
    }

    pub fn with_format(mut self, format: Box<dyn FormatReader>) -> Self {
        self.formats.register(format);
        self
    }

    pub fn open<S: ReadSource + 'static>(self, source: S) -> Result<ArchiveReader> {
        let leaf: Box<dyn ReadFilter> = Box::new(IdentityReader::new(source));
        self.open_with_leaf(leaf)
    }

    /// Like [`Self::open`], but for a source that can seek (a regular
    /// file, not a pipe): `skip` goes through a real seek instead of
    /// read+discard.
    pub fn open_seekable<S: SeekableReadSource + 'static>(self, source: S) -> Result<ArchiveReader> {
        let leaf: Box<dyn ReadFilter> = Box::new(IdentityReader::new_seekable(source));
        self.open_with_leaf(leaf)
    }

    fn open_with_leaf(self, leaf: Box<dyn ReadFilter>) -> Result<ArchiveReader> {
        let top = autodetect::autodetect(leaf, &self.bidders)?;
        Ok(ArchiveReader {
            pipe: top,
            formats: self.formats,
            state: State::Header,
            header_position: 0,
            read_data_output_offset: 0,
            stashed: None,
        })
    }
}

/// An open reader handle.
pub struct ArchiveReader {
    pipe: Box<dyn ReadFilter>,
    formats: ReaderRegistry,
    state: State,
    header_position: u64,
    /// Tracks the output cursor for the legacy zero-fill `read_data`
    /// adapter (spec.md §4.3's sparse-hole synthesis).
    read_data_output_offset: u64,
    /// A block fetched but only partially delivered to the caller's
    /// buffer on a prior `read_data` call.
    stashed: Option<super::registry::DataBlock>,
}

impl ArchiveReader {
    pub fn state(&self) -> State {
        self.state
    }

    /// Byte offset (in the uncompressed stream) at which the most
    /// recently read header began.
    pub fn header_position(&self) -> u64 {
        self.header_position
    }

    /// Total bytes produced at the top of the filter pipeline so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.pipe.bytes_consumed()
    }

    /// Reads the next entry's header. Transitions HEADER|DATA -> DATA,
    /// or -> EOF, or -> FATAL.
    pub fn next_header(&mut self) -> Result<Option<Entry>> {
        state::require(self.state, &[State::Header, State::Data], "next_header");

        if self.formats.is_empty() {
            panic!(
                "no formats were registered; you must register at least one format \
                 reader before reading an archive"
            );
        }

        // If the client didn't consume the prior entry's body, skip the
        // remainder first (spec.md §4.3 "Skip-on-next-header").
        if self.state == State::Data {
            if let Err(e) = self.skip_current_entry() {
                error!("premature end of archive while skipping to next header: {e}");
                self.state = State::Fatal;
                return Err(Error::fatal("premature end-of-file"));
            }
        }

        if self.formats.active().is_none() {
            if let Err(e) = self.formats.choose_format(self.pipe.as_mut()) {
                self.state = State::Fatal;
                return Err(e);
            }
        }

        self.header_position = self.pipe.bytes_consumed();
        self.read_data_output_offset = 0;

        let mut entry = Entry::default();
        let format = self
            .formats
            .active_mut()
            .expect("format chosen above or already active");

        match format.read_header(self.pipe.as_mut(), &mut entry) {
            Ok(HeaderOutcome::Eof) => {
                self.state = State::Eof;
                Ok(None)
            }
            Ok(HeaderOutcome::Ok) => {
                self.state = State::Data;
                debug!(path = %String::from_utf8_lossy(&entry.pathname), "read header");
                Ok(Some(entry))
            }
            Err(e) if e.severity() == Severity::Warn => {
                // Warn means "succeeded but degraded" (spec.md §7): the
                // format plug-in has already populated `entry` before
                // reporting the condition, so hand it back instead of
                // discarding it.
                self.state = State::Data;
                warn!(path = %String::from_utf8_lossy(&entry.pathname), "{e}");
                Ok(Some(entry))
            }
            Err(e) => {
                if e.is_fatal() {
                    self.state = State::Fatal;
                } else {
                    self.state = State::Data;
                }
                Err(e)
            }
        }
    }

    /// Zero-copy data interface: the next chunk of the current entry's
    /// body with its logical offset, or `None` at end of entry.
    pub fn read_data_block(&mut self) -> Result<Option<super::registry::DataBlock>> {
        state::require(self.state, &[State::Data], "read_data_block");
        let format = self.formats.active_mut().expect("format active in DATA state");
        match format.read_data(self.pipe.as_mut()) {
            Ok(block) => Ok(block),
            Err(e) => {
                if e.is_fatal() {
                    self.state = State::Fatal;
                }
                Err(e)
            }
        }
    }

    /// Convenience `read(2)`-style interface: copies the entry's body
    /// into `buf`, synthesizing zero bytes for sparse holes. Do not
    /// intermingle with [`Self::read_data_block`] on the same entry.
    pub fn read_data(&mut self, mut buf: &mut [u8]) -> Result<usize> {
        state::require(self.state, &[State::Data], "read_data");
        let mut written = 0usize;

        while !buf.is_empty() {
            let Some(block) = self.pending_or_next_block()? else {
                break;
            };

            if block.offset < self.read_data_output_offset {
                return Err(Error::retry("encountered out-of-order sparse blocks"));
            }

            let gap = block.offset - self.read_data_output_offset;
            if gap > 0 {
                let zero_len = (gap as usize).min(buf.len());
                for b in &mut buf[..zero_len] {
                    *b = 0;
                }
                self.read_data_output_offset += zero_len as u64;
                written += zero_len;
                buf = &mut buf[zero_len..];
                if zero_len < gap as usize {
                    // Buffer full from zero padding alone; stash the
                    // block for next call.
                    self.stashed = Some(block);
                    break;
                }
            }

            let copy_len = block.data.len().min(buf.len());
            buf[..copy_len].copy_from_slice(&block.data[..copy_len]);
            self.read_data_output_offset += copy_len as u64;
            written += copy_len;
            buf = &mut buf[copy_len..];

            if copy_len < block.data.len() {
                self.stashed = Some(super::registry::DataBlock {
                    offset: block.offset + copy_len as u64,
                    data: block.data[copy_len..].to_vec(),
                });
            }
        }

        Ok(written)
    }

    fn pending_or_next_block(&mut self) -> Result<Option<super::registry::DataBlock>> {
        if let Some(block) = self.stashed.take() {
            return Ok(Some(block));
        }
        self.read_data_block()
    }

    /// Skips all remaining data in the current entry.
    pub fn read_data_skip(&mut self) -> Result<()> {
        state::require(self.state, &[State::Data], "read_data_skip");
        self.skip_current_entry()
    }

    fn skip_current_entry(&mut self) -> Result<()> {
        self.stashed = None;
        let format = self.formats.active_mut().expect("format active in DATA state");
        let result = format.read_data_skip(self.pipe.as_mut());
        self.state = match &result {
            Err(e) if e.is_fatal() => State::Fatal,
            _ => State::Header,
        };
        result
    }

    /// Closes the handle: releases every buffer and codec context the
    /// pipeline ever allocated. Legal from any state; always runs its
    /// cleanup even from FATAL.
    pub fn close(&mut self) -> Result<()> {
        state::require(
            self.state,
            &[
                State::New,
                State::Header,
                State::Data,
                State::Eof,
                State::Fatal,
            ],
            "close",
        );
        let result = self.pipe.close();
        self.state = State::Closed;
        result
    }
}

/// Reads and discards `n` bytes from `pipe`. Exposed for format
/// plug-ins implementing inter-record alignment padding.
pub fn skip(pipe: &mut dyn ReadFilter, n: u64) -> Result<()> {
    skip_exact(pipe, n)
}
