//! Directory and file naming of the journal tree.
//!
//! # Layout
//!
//! ```text
//! <location>/<producer>/<subject>/<file>.bin
//! ```
//!
//! # File Name Grammars
//!
//! An **open** file (still appended to) encodes its first record:
//!
//! ```text
//! <subject>-<first id: 16 lowercase hex>-<first timestamp: decimal>.bin
//! ```
//!
//! A **closed** file (rotated, immutable, owned by the forwarder) encodes the
//! full range of its records:
//!
//! ```text
//! <subject>-<first id: 16 hex>-<last id: 16 hex>-<first timestamp>-<last timestamp>.bin
//! ```
//!
//! Subjects may not contain `-`, so the fields split unambiguously.

use super::error::JournalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Extension of every journal file.
pub const FILE_EXTENSION: &str = ".bin";
/// Longest accepted subject or producer name, in bytes.
pub const MAX_NAME_LENGTH: usize = 128;

const ID_HEX_DIGITS: usize = 16;

/// Name of an event stream within a producer, e.g. `Detections`.
///
/// A subject is used as a directory name and as the prefix of its files'
/// names, so only ASCII alphanumerics, `_` and `.` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject(String);

impl Subject {
    /// Validates `name` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidConfig`] if the name is empty, too long,
    /// `.` or `..`, or contains characters other than ASCII alphanumerics,
    /// `_` and `.`.
    pub fn new(name: impl Into<String>) -> Result<Self, JournalError> {
        let name = name.into();
        validate_name("subject", &name)?;
        Ok(Self(name))
    }

    /// The subject as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Subject {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Subject {
    type Error = JournalError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for Subject {
    type Error = JournalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.0
    }
}

/// Checks a producer or subject name against the directory naming rules.
///
/// # Errors
///
/// Returns [`JournalError::InvalidConfig`] naming `what` on violation.
pub fn validate_name(what: &str, name: &str) -> Result<(), JournalError> {
    if name.is_empty() {
        return Err(JournalError::invalid_config(format!("{what} name is empty")));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(JournalError::invalid_config(format!(
            "{what} name is longer than {MAX_NAME_LENGTH} bytes"
        )));
    }
    if name == "." || name == ".." {
        return Err(JournalError::invalid_config(format!(
            "{what} name {name:?} is reserved"
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '.'))
    {
        return Err(JournalError::invalid_config(format!(
            "{what} name {name:?} contains {c:?}"
        )));
    }
    Ok(())
}

/// A parsed journal file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalFileName {
    /// A file still being appended to.
    Open {
        /// Producer id of the first record.
        first_id: u64,
        /// Timestamp of the first record.
        first_timestamp: i64,
    },
    /// A rotated file.
    Closed {
        /// Producer id of the first record.
        first_id: u64,
        /// Producer id of the last record.
        last_id: u64,
        /// Timestamp of the first record.
        first_timestamp: i64,
        /// Timestamp of the last record.
        last_timestamp: i64,
    },
}

impl JournalFileName {
    /// Parses `file_name` as a file of `subject`.
    ///
    /// Returns `None` for anything that follows neither grammar, including
    /// files of other subjects.
    #[must_use]
    pub fn parse(subject: &str, file_name: &str) -> Option<Self> {
        let fields = file_name
            .strip_suffix(FILE_EXTENSION)?
            .strip_prefix(subject)?
            .strip_prefix('-')?;
        let parts: Vec<&str> = fields.split('-').collect();

        match parts.as_slice() {
            [first_id, first_ts] => Some(Self::Open {
                first_id: parse_id(first_id)?,
                first_timestamp: parse_timestamp(first_ts)?,
            }),
            [first_id, last_id, first_ts, last_ts] => Some(Self::Closed {
                first_id: parse_id(first_id)?,
                last_id: parse_id(last_id)?,
                first_timestamp: parse_timestamp(first_ts)?,
                last_timestamp: parse_timestamp(last_ts)?,
            }),
            _ => None,
        }
    }

    /// Returns `true` for the open grammar.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Producer id of the first record named by the file.
    #[must_use]
    pub fn first_id(&self) -> u64 {
        match *self {
            Self::Open { first_id, .. } | Self::Closed { first_id, .. } => first_id,
        }
    }

    /// Highest producer id the name accounts for: the last id of a closed
    /// file, the first id of an open one.
    #[must_use]
    pub fn highest_known_id(&self) -> u64 {
        match *self {
            Self::Open { first_id, .. } => first_id,
            Self::Closed { last_id, .. } => last_id,
        }
    }
}

/// Formats the name of an open file.
#[must_use]
pub fn open_file_name(subject: &str, first_id: u64, first_timestamp: i64) -> String {
    format!("{subject}-{first_id:016x}-{first_timestamp}{FILE_EXTENSION}")
}

/// Formats the name of a closed file.
#[must_use]
pub fn closed_file_name(
    subject: &str,
    first_id: u64,
    last_id: u64,
    first_timestamp: i64,
    last_timestamp: i64,
) -> String {
    format!(
        "{subject}-{first_id:016x}-{last_id:016x}-{first_timestamp}-{last_timestamp}{FILE_EXTENSION}"
    )
}

fn parse_id(field: &str) -> Option<u64> {
    if field.len() != ID_HEX_DIGITS
        || !field
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return None;
    }
    u64::from_str_radix(field, 16).ok()
}

fn parse_timestamp(field: &str) -> Option<i64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
