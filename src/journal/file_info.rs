//! Derived, non-persisted information about a container file.
//!
//! [`inspect_file`] maps a file read-only and combines the decoded header with
//! a record walk. A one-record peek (`limit = Some(1)`) touches only the
//! first pages of the mapping, so the writer can evaluate its rotation policy
//! without reading whole files.

use super::codec::{
    self, ContainerHeader, HEADER_FIXED_SIZE, HeaderError, PbufInfo, RIFF_HEADER_SIZE,
};
use super::error::JournalError;
use bitflags::bitflags;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::warn;

bitflags! {
    /// Findings of an inspection that do not prevent reading the file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct FileFlags: u8 {
        /// The record walk stopped before the end of the file.
        const TRUNCATED = 1 << 0;
        /// The riff length field disagrees with the file size.
        const RIFF_LENGTH_MISMATCH = 1 << 1;
        /// Any length field (riff or record) is inconsistent.
        const ANY_LENGTH_ERRORS = 1 << 2;
    }
}

/// Whether inspection findings are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanLogging {
    /// Log corruption with `tracing::warn!`.
    Warn,
    /// Stay silent; used by repair paths that expect damage.
    Quiet,
}

/// Result of inspecting a container file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    /// The header decoded; see the flags for record-level findings.
    Valid(FileInfo),
    /// The header is unreadable. Such a file can only be discarded.
    CorruptHeader(HeaderError),
}

/// Everything the writer knows about a container file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    /// Size of the file on disk.
    pub size: u64,
    /// Value of the riff length field.
    pub riff_length: u32,
    /// The decoded container header.
    pub header: ContainerHeader,
    /// What the record walk found.
    pub events: PbufInfo,
    /// Inspection findings.
    pub flags: FileFlags,
}

impl FileInfo {
    /// A file without a single complete record is not worth keeping.
    #[inline]
    #[must_use]
    pub fn should_remove(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns `true` if the record walk stopped early.
    #[inline]
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.flags.contains(FileFlags::TRUNCATED)
    }

    /// Returns `true` if the riff length field covers exactly the bytes on
    /// disk.
    ///
    /// The riff length is patched only after a record is fully written, so
    /// a mismatch means bytes past the last acknowledged record. Valid for
    /// peeks as well as full inspections.
    #[inline]
    #[must_use]
    pub fn riff_length_matches_size(&self) -> bool {
        u64::from(self.riff_length) + RIFF_HEADER_SIZE as u64 == self.size
    }

    /// Size the file would have if it ended after its last complete record.
    #[must_use]
    pub fn valid_size(&self) -> u64 {
        (self.header.header_size + self.events.valid_bytes) as u64
    }

    /// Renders the inspection as JSON, for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidConfig`] if serialisation fails.
    pub fn to_json(&self) -> Result<String, JournalError> {
        serde_json::to_string(self).map_err(|e| JournalError::invalid_config(e.to_string()))
    }
}

/// Inspects the container file at `path`.
///
/// With `limit` set, only that many records are walked and the riff length
/// is not checked, because the tail of the file was never looked at.
///
/// # Errors
///
/// Returns [`JournalError::Io`] if the file cannot be opened or mapped.
/// Corruption is reported through the returned [`Inspection`], not as an
/// error.
pub fn inspect_file(
    path: &Path,
    limit: Option<usize>,
    logging: ScanLogging,
) -> Result<Inspection, JournalError> {
    let file = File::open(path).map_err(|e| JournalError::io_at(e, path))?;
    let size = file
        .metadata()
        .map_err(|e| JournalError::io_at(e, path))?
        .len();

    if size < HEADER_FIXED_SIZE as u64 {
        let err = HeaderError::TooShort {
            needed: HEADER_FIXED_SIZE,
            available: size as usize,
        };
        if logging == ScanLogging::Warn {
            warn!(path = %path.display(), error = %err, "corrupt journal header");
        }
        return Ok(Inspection::CorruptHeader(err));
    }

    // SAFETY: read-only mapping of a file owned by this writer (single-writer
    // contract); nothing truncates it while the mapping is alive.
    let mmap = unsafe { Mmap::map(&file).map_err(|e| JournalError::io_at(e, path))? };

    Ok(inspect_bytes(&mmap, limit, logging, path))
}

/// Inspects an in-memory copy of a container file.
///
/// `path` is only used for log messages.
#[must_use]
pub fn inspect_bytes(
    bytes: &[u8],
    limit: Option<usize>,
    logging: ScanLogging,
    path: &Path,
) -> Inspection {
    let header = match codec::decode_header(bytes) {
        Ok(header) => header,
        Err(err) => {
            if logging == ScanLogging::Warn {
                warn!(path = %path.display(), error = %err, "corrupt journal header");
            }
            return Inspection::CorruptHeader(err);
        }
    };

    let events = codec::scan_records(&bytes[header.header_size..], limit);
    let size = bytes.len() as u64;
    let riff_length = codec::riff_length(bytes).unwrap_or_default();

    let mut flags = FileFlags::empty();
    if events.truncated {
        flags |= FileFlags::TRUNCATED;
    }
    if events.length_error {
        flags |= FileFlags::ANY_LENGTH_ERRORS;
    }
    let mut info = FileInfo {
        size,
        riff_length,
        header,
        events,
        flags,
    };
    if limit.is_none() && !info.riff_length_matches_size() {
        info.flags |= FileFlags::RIFF_LENGTH_MISMATCH | FileFlags::ANY_LENGTH_ERRORS;
    }

    if logging == ScanLogging::Warn {
        if info.events.truncated {
            warn!(
                path = %path.display(),
                records = info.events.count,
                valid_bytes = info.events.valid_bytes,
                length_error = info.events.length_error,
                "journal file has a truncated or unreadable record"
            );
        }
        if info.flags.contains(FileFlags::RIFF_LENGTH_MISMATCH) {
            warn!(
                path = %path.display(),
                riff_length = info.riff_length,
                size = info.size,
                "journal riff length does not match file size"
            );
        }
    }

    Inspection::Valid(info)
}
