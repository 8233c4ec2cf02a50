//! Streaming archive I/O substrate and format dispatch engine.
//!
//! Two layers: a read-ahead/consume filter-chain pipeline (`read`,
//! `write`) that lets codec and format plug-ins operate on a stream
//! without a full in-memory copy, and a format-dispatch bidding engine
//! that lets multiple format/filter plug-ins compete to recognize a
//! stream's contents. `archive-filters` and `archive-formats` plug into
//! the traits defined here; this crate has no concrete format or codec
//! of its own.

pub mod entry;
pub mod error;
pub mod matcher;
pub mod options;
pub mod read;
pub mod state;
pub mod transfer;
pub mod write;

pub use entry::{AclEntry, AclKind, AclTag, Device, Entry, FileType, SparseMap, Timestamp};
pub use error::{Error, Kind, Result, Severity};
pub use matcher::Matcher;
pub use options::{parse as parse_options, OptionEntry, OptionValue};
pub use state::State;
pub use transfer::{ReadSource, SeekableReadSource, WriteSink};
