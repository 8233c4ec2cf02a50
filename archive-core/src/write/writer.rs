//! The writer handle (spec.md §3, §4.4).

use crate::entry::Entry;
use crate::error::Result;
use crate::state::{self, State};
use crate::transfer::WriteSink;

use super::block::BlockWriter;
use super::filter::{IdentityWriter, WriteFilter};
use super::linker::LinkResolver;
use super::registry::{FormatWriter, WriterRegistry};

pub struct WriterBuilder {
    formats: WriterRegistry,
    block_size: usize,
    final_block_size: usize,
    resolver: LinkResolver,
}

impl Default for WriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterBuilder {
    pub fn new() -> Self {
        Self {
            formats: WriterRegistry::new(),
            block_size: super::block::DEFAULT_BLOCK_SIZE,
            final_block_size: super::block::DEFAULT_BLOCK_SIZE,
            resolver: LinkResolver::disabled(),
        }
    }

    pub fn with_format(mut self, format: Box<dyn FormatWriter>) -> Self {
        self.formats.set(format);
        self
    }

    pub fn with_block_size(mut self, block_size: usize, final_block_size: usize) -> Self {
        self.block_size = block_size;
        self.final_block_size = final_block_size;
        self
    }

    pub fn with_link_resolver(mut self, resolver: LinkResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Opens a writer with an explicit filter chain already constructed
    /// (e.g. `gzip(identity(sink))`). `chain` must already terminate in
    /// the client sink.
    pub fn open_with_chain(mut self, chain: Box<dyn WriteFilter>) -> Result<ArchiveWriter> {
        let mut block = BlockWriter::new(chain, self.block_size, self.final_block_size);
        let format = self
            .formats
            .active_mut()
            .expect("a format must be registered before open");
        let mut adapter = BlockFilterAdapter(&mut block);
        format.init(&mut adapter)?;
        Ok(ArchiveWriter {
            block,
            formats: self.formats,
            resolver: self.resolver,
            state: State::Header,
            declared_size: 0,
            written_for_entry: 0,
        })
    }

    pub fn open<W: WriteSink + 'static>(self, sink: W) -> Result<ArchiveWriter> {
        let identity: Box<dyn WriteFilter> = Box::new(IdentityWriter::new(sink));
        self.open_with_chain(identity)
    }
}

/// Adapts a [`BlockWriter`] (a concrete struct) to the [`WriteFilter`]
/// trait object interface format plug-ins expect.
struct BlockFilterAdapter<'a>(&'a mut BlockWriter);

impl WriteFilter for BlockFilterAdapter<'_> {
    fn name(&self) -> &str {
        "block"
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.0.flush()
    }

    fn close(&mut self) -> Result<()> {
        self.0.close()
    }

    fn bytes_written(&self) -> u64 {
        self.0.bytes_out()
    }
}

pub struct ArchiveWriter {
    block: BlockWriter,
    formats: WriterRegistry,
    resolver: LinkResolver,
    state: State,
    declared_size: u64,
    written_for_entry: u64,
}

impl ArchiveWriter {
    pub fn state(&self) -> State {
        self.state
    }

    pub fn bytes_written(&self) -> u64 {
        self.block.bytes_out()
    }

    /// Size declared by the header of the entry currently being written.
    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    /// Bytes accepted via `write_data` for the current entry so far.
    pub fn written_for_entry(&self) -> u64 {
        self.written_for_entry
    }

    /// Writes the next entry's header, after running the entry through
    /// the hardlink resolver. Transitions HEADER -> DATA, or -> FATAL.
    pub fn write_header(&mut self, entry: Entry) -> Result<()> {
        state::require(self.state, &[State::Header], "write_header");
        let entry = self.resolver.feed(entry);
        self.declared_size = entry.wire_size();
        self.written_for_entry = 0;

        let format = self.formats.active_mut().expect("format registered at open");
        let mut adapter = BlockFilterAdapter(&mut self.block);
        match format.write_header(&mut adapter, &entry) {
            Ok(()) => {
                self.state = State::Data;
                Ok(())
            }
            Err(e) => {
                if e.is_fatal() {
                    self.state = State::Fatal;
                }
                Err(e)
            }
        }
    }

    /// Writes entry body bytes. Returns the number of bytes actually
    /// accepted (short count once the declared size is reached — not an
    /// error). Transitions to FATAL on a fatal write error.
    pub fn write_data(&mut self, buf: &[u8]) -> Result<usize> {
        state::require(self.state, &[State::Data], "write_data");
        let format = self.formats.active_mut().expect("format registered at open");
        let mut adapter = BlockFilterAdapter(&mut self.block);
        match format.write_data(&mut adapter, buf) {
            Ok(n) => {
                self.written_for_entry += n as u64;
                Ok(n)
            }
            Err(e) => {
                if e.is_fatal() {
                    self.state = State::Fatal;
                }
                Err(e)
            }
        }
    }

    /// Finishes the current entry: pads with zero if the caller
    /// under-delivered against the declared size. Transitions DATA ->
    /// HEADER, or -> FATAL.
    pub fn finish_entry(&mut self) -> Result<()> {
        state::require(self.state, &[State::Data], "finish_entry");
        let format = self.formats.active_mut().expect("format registered at open");
        let mut adapter = BlockFilterAdapter(&mut self.block);
        match format.finish_entry(&mut adapter) {
            Ok(()) => {
                self.state = State::Header;
                Ok(())
            }
            Err(e) => {
                if e.is_fatal() {
                    self.state = State::Fatal;
                }
                Err(e)
            }
        }
    }

    /// Closes the handle: writes the format's final trailer, flushes any
    /// entries the link resolver was still holding, then closes the
    /// filter chain.
    pub fn close(&mut self) -> Result<()> {
        state::require(
            self.state,
            &[State::New, State::Header, State::Data, State::Fatal],
            "close",
        );
        if self.state == State::Data {
            self.finish_entry()?;
        }
        for pending in self.resolver.flush() {
            self.write_header(pending)?;
            self.finish_entry()?;
        }
        let format = self.formats.active_mut().expect("format registered at open");
        let mut adapter = BlockFilterAdapter(&mut self.block);
        if let Err(e) = format.close(&mut adapter) {
            self.state = State::Fatal;
            return Err(e);
        }
        self.block.close()?;
        self.state = State::Closed;
        Ok(())
    }
}
