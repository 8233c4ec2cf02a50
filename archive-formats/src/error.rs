//! Format-local error type, converted to [`archive_core::Error`] at
//! every trait boundary.

use archive_core::error::{Error as CoreError, Kind, Severity};

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad checksum in {format} header")]
    BadChecksum { format: &'static str },

    #[error("truncated {format} stream: {detail}")]
    Truncated { format: &'static str, detail: String },

    #[error("malformed {format} header: {detail}")]
    Malformed { format: &'static str, detail: String },

    #[error("{format} support is not implemented in this build")]
    NotImplemented { format: &'static str },
}

impl From<FormatError> for CoreError {
    fn from(e: FormatError) -> Self {
        match &e {
            // Checksum failures are WARN (spec.md §7): the entry is
            // still usable, just suspect.
            FormatError::BadChecksum { .. } => {
                CoreError::new(Severity::Warn, Kind::FileFormat, e.to_string())
            }
            // Truncated streams and unimplemented formats are FATAL.
            FormatError::Truncated { .. }
            | FormatError::NotImplemented { .. }
            | FormatError::Malformed { .. } => {
                CoreError::new(Severity::Fatal, Kind::FileFormat, e.to_string())
            }
            FormatError::Io(_) => CoreError::new(Severity::Fatal, Kind::Misc, e.to_string()),
        }
    }
}
