//! Error types for the journal writer.
//!
//! [`JournalError`] is the closed set of failures a collaborator can observe
//! from the writer: caller errors (bad payload or configuration) and I/O
//! failures. On-disk corruption is not part of this set; it is detected by
//! the codec, logged, and healed by replacing or pruning the affected file.

use std::fmt;
use std::path::{Path, PathBuf};

/// Errors returned by the journal writer.
#[derive(Debug)]
#[non_exhaustive]
pub enum JournalError {
    /// The payload handed to `insert` cannot be framed as a record.
    InvalidPayload {
        /// Length of the rejected payload in bytes.
        length: usize,
        /// Why the payload was rejected.
        reason: String,
    },

    /// A filesystem call failed. Never retried internally.
    Io {
        /// The underlying I/O error message.
        message: String,
        /// The file or directory involved, if known.
        path: Option<PathBuf>,
    },

    /// The writer configuration, producer name, or subject name is unusable.
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// A subject lock was poisoned (another thread panicked while holding
    /// it).
    MutexPoisoned,
}

impl JournalError {
    /// Builds an [`JournalError::Io`] tagged with the path it happened on.
    #[cold]
    pub(crate) fn io_at(err: std::io::Error, path: &Path) -> Self {
        JournalError::Io {
            message: err.to_string(),
            path: Some(path.to_path_buf()),
        }
    }

    #[cold]
    pub(crate) fn invalid_payload(length: usize, reason: impl Into<String>) -> Self {
        JournalError::InvalidPayload {
            length,
            reason: reason.into(),
        }
    }

    #[cold]
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        JournalError::InvalidConfig {
            message: message.into(),
        }
    }
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalError::InvalidPayload { length, reason } => {
                write!(f, "invalid journal payload of {length} bytes: {reason}")
            }
            JournalError::Io { message, path } => {
                if let Some(p) = path {
                    write!(f, "journal I/O error at {}: {message}", p.display())
                } else {
                    write!(f, "journal I/O error: {message}")
                }
            }
            JournalError::InvalidConfig { message } => {
                write!(f, "invalid journal configuration: {message}")
            }
            JournalError::MutexPoisoned => {
                write!(f, "journal subject mutex poisoned")
            }
        }
    }
}

impl std::error::Error for JournalError {}

impl From<std::io::Error> for JournalError {
    #[cold]
    fn from(err: std::io::Error) -> Self {
        JournalError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}
