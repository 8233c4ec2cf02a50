//! Error types and the severity taxonomy used across the public surface.
//!
//! Severity is a first-class value, not an implicit property of the
//! `Result` variant: `Eof` is success (the normal terminator of
//! iteration), while `Warn`/`Failed`/`Fatal` all flow through `Err`.

use std::fmt;

/// Result type for every fallible `archive-core` operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Severity of a non-`Eof` outcome.
///
/// `Retry` and `Warn` are recoverable: the handle stays usable. `Failed`
/// means the current operation could not complete but the archive is
/// still usable for subsequent operations. `Fatal` is sticky: once an
/// operation returns it, only `close`/`free` remain legal (see
/// [`crate::state::State`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Retry,
    Warn,
    Failed,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Retry => "retry",
            Severity::Warn => "warn",
            Severity::Failed => "failed",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Numeric error kind, independent of severity. Mirrors libarchive's
/// distinction between file-format errors, miscellaneous errors, and
/// programmer errors (the last of which never reaches this enum — see
/// [`crate::state::illegal_usage`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Io,
    FileFormat,
    Misc,
}

/// The error type returned by every fallible `archive-core` call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[{severity}] {message}")]
    Archive {
        severity: Severity,
        kind: Kind,
        message: String,
    },
}

impl Error {
    pub fn new(severity: Severity, kind: Kind, message: impl Into<String>) -> Self {
        Error::Archive {
            severity,
            kind,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, Kind::Misc, message)
    }

    pub fn fatal_format(message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, Kind::FileFormat, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(Severity::Failed, Kind::Misc, message)
    }

    pub fn warn_format(message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, Kind::FileFormat, message)
    }

    pub fn retry(message: impl Into<String>) -> Self {
        Self::new(Severity::Retry, Kind::Misc, message)
    }

    /// Severity of this error. I/O errors are always treated as fatal:
    /// per spec.md §7, a client callback failure surfaces as FATAL after
    /// one attempt (there is no retry in streaming mode).
    pub fn severity(&self) -> Severity {
        match self {
            Error::Io(_) => Severity::Fatal,
            Error::Archive { severity, .. } => *severity,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
