//! Filter-local error type, converted to [`archive_core::Error`] at every
//! trait boundary (spec.md §7's codec error policy: corrupt data is
//! FATAL, benign trailer variance is WARN).

use archive_core::error::{Error as CoreError, Severity};

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unrecognized signature for this codec")]
    BadSignature,

    #[error("corrupt compressed stream: {0}")]
    Corrupt(String),

    #[error("external filter program {program:?} exited with status {status}")]
    ProgramFailed { program: String, status: i32 },
}

impl From<FilterError> for CoreError {
    fn from(e: FilterError) -> Self {
        match &e {
            FilterError::Io(_) | FilterError::Corrupt(_) | FilterError::ProgramFailed { .. } => {
                CoreError::new(Severity::Fatal, archive_core::error::Kind::Misc, e.to_string())
            }
            FilterError::BadSignature => {
                CoreError::new(Severity::Fatal, archive_core::error::Kind::FileFormat, e.to_string())
            }
        }
    }
}
