//! Handle lifecycle state machine (spec.md §3).
//!
//! ```text
//! NEW ──open──▶ HEADER ──read next──▶ DATA ──read data / skip──▶ HEADER
//!                 │                     │
//!                 │                     └──▶ EOF
//!                 └──▶ FATAL  (terminal; only close/free permitted)
//!                 CLOSED (terminal; only free permitted)
//! ```
//!
//! Every public entry point on [`crate::read::ArchiveReader`] and
//! [`crate::write::ArchiveWriter`] checks the current state against its
//! declared permitted set before doing anything else. A mismatch is a
//! programmer error: libarchive terminates the process
//! (`__archive_errx`) rather than returning a recoverable error, and we
//! do the same with `panic!` — these are bugs in the calling code, not
//! runtime conditions a caller can sensibly handle.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    New,
    Header,
    Data,
    Eof,
    Fatal,
    Closed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::New => "new",
            State::Header => "header",
            State::Data => "data",
            State::Eof => "eof",
            State::Fatal => "fatal",
            State::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Panics with a diagnostic naming the offending call. Used by every
/// public handle method to enforce the state machine.
#[track_caller]
pub fn require(current: State, permitted: &[State], caller: &str) {
    if !permitted.contains(&current) {
        panic!(
            "illegal usage: `{caller}` called while handle is in state `{current}` \
             (permitted: {permitted:?})"
        );
    }
}
