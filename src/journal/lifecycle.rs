//! File lifecycle: which open file to use, when to rotate it, and how open
//! files are created, appended to and closed.
//!
//! An open file is appended to until one of these happens, checked in this
//! order:
//!
//! 1. its header names a different serialisation method, serialisation
//!    version, or container format version than the writer produces
//!    (rotate);
//! 2. the next record would grow it past the maximum file size (rotate);
//! 3. it holds no complete record (delete and start over).
//!
//! Closing a file renames it to the closed grammar, after which the writer
//! never touches it again.

use super::codec::{self, ContainerHeader, SJRN_VERSION};
use super::config::WriterConfig;
use super::error::JournalError;
use super::file_info::{FileFlags, FileInfo, Inspection, ScanLogging, inspect_file};
use super::files;
use super::naming::{self, JournalFileName};
use super::prune::prune_truncated_events;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The rotation rules of one writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Largest size a file may reach by appending.
    pub max_file_size: u64,
    /// Serialisation method of new records.
    pub serialisation_method: String,
    /// Serialisation version of new records.
    pub serialisation_version: String,
    /// Container format version of new files.
    pub sjrn_version: u16,
}

/// What to do with an existing open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep appending.
    Append,
    /// Close the file and start a new one.
    Rotate(RotateReason),
    /// Delete the file; it holds nothing worth keeping.
    Remove,
}

/// Why a file is rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateReason {
    /// The header's format does not match what the writer produces.
    FormatChanged,
    /// The next record would exceed the maximum file size.
    SizeLimit,
}

/// What closing a file did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Renamed to the closed grammar at this path.
    Closed(PathBuf),
    /// Deleted because it was unreadable or empty.
    Removed,
}

impl RotationPolicy {
    /// The policy a writer with `config` applies.
    #[must_use]
    pub fn from_config(config: &WriterConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            serialisation_method: config.serialisation_method.clone(),
            serialisation_version: config.serialisation_version.clone(),
            sjrn_version: SJRN_VERSION,
        }
    }

    /// Returns `true` if new records may not be appended under `header`.
    #[must_use]
    pub fn format_differs(&self, header: &ContainerHeader) -> bool {
        header.version != self.sjrn_version
            || header.serialisation_method != self.serialisation_method
            || header.serialisation_version != self.serialisation_version
    }

    /// Decides what to do with the file described by `info` before a record
    /// of `incoming` bytes is appended.
    ///
    /// `info` may come from a one-record peek.
    #[must_use]
    pub fn evaluate(&self, info: &FileInfo, incoming: usize) -> Decision {
        if self.format_differs(&info.header) {
            Decision::Rotate(RotateReason::FormatChanged)
        } else if info.size.saturating_add(incoming as u64) > self.max_file_size {
            Decision::Rotate(RotateReason::SizeLimit)
        } else if info.should_remove() {
            Decision::Remove
        } else {
            Decision::Append
        }
    }
}

/// Lists the open files of `subject` in `dir`, ordered by first id.
pub(crate) fn find_open_files(
    dir: &Path,
    subject: &str,
) -> Result<Vec<(PathBuf, u64)>, JournalError> {
    let mut open: Vec<(PathBuf, u64)> = files::list_files(dir)?
        .into_iter()
        .filter_map(|(name, path)| match JournalFileName::parse(subject, &name) {
            Some(parsed) if parsed.is_open() => Some((path, parsed.first_id())),
            _ => None,
        })
        .collect();
    open.sort_by_key(|(_, first_id)| *first_id);
    Ok(open)
}

/// Closes the open file at `path`.
///
/// The whole file is scanned so the closed name carries the true last id
/// and timestamp. A truncated tail or a stale riff length is pruned first;
/// a file with an unreadable header or no complete record is deleted.
pub(crate) fn close_file(path: &Path, subject: &str) -> Result<CloseOutcome, JournalError> {
    let info = match inspect_file(path, None, ScanLogging::Warn)? {
        Inspection::Valid(info) => info,
        Inspection::CorruptHeader(_) => {
            discard_file(path, "unreadable header")?;
            return Ok(CloseOutcome::Removed);
        }
    };

    let events = info.events;
    let (Some(first_id), Some(last_id), Some(first_ts), Some(last_ts)) = (
        events.first_id,
        events.last_id,
        events.first_timestamp,
        events.last_timestamp,
    ) else {
        discard_file(path, "no complete records")?;
        return Ok(CloseOutcome::Removed);
    };

    if info
        .flags
        .intersects(FileFlags::TRUNCATED | FileFlags::RIFF_LENGTH_MISMATCH)
    {
        prune_truncated_events(path)?;
    }

    let closed = path.with_file_name(naming::closed_file_name(
        subject, first_id, last_id, first_ts, last_ts,
    ));
    files::rename(path, &closed)?;
    info!(
        from = %path.display(),
        to = %closed.display(),
        records = events.count,
        "closed journal file"
    );
    #[cfg(feature = "metrics")]
    metrics::counter!("event_journal_rotations_total").increment(1);

    Ok(CloseOutcome::Closed(closed))
}

/// Deletes a file the writer cannot use.
pub(crate) fn discard_file(path: &Path, reason: &str) -> Result<(), JournalError> {
    warn!(path = %path.display(), reason, "discarding journal file");
    #[cfg(feature = "metrics")]
    metrics::counter!("event_journal_discarded_files_total").increment(1);
    files::remove_file(path)
}

/// Appends an encoded record to the open file at `path` and patches the
/// riff length.
///
/// If the record cannot be written completely the file is cut back to its
/// previous size, so no partial record is left behind for the next append.
pub(crate) fn append_record(path: &Path, record: &[u8]) -> Result<(), JournalError> {
    let mut file = files::open_read_write(path)?;
    let original_size = file
        .seek(SeekFrom::End(0))
        .map_err(|e| JournalError::io_at(e, path))?;

    if let Err(e) = file.write_all(record) {
        // A tail left behind here is pruned by the next insert, which sees
        // the unpatched riff length.
        if let Err(rollback) = file.set_len(original_size) {
            warn!(
                path = %path.display(),
                size = original_size,
                error = %rollback,
                "cannot cut journal file back after a failed append"
            );
        }
        return Err(JournalError::io_at(e, path));
    }

    let new_size = original_size + record.len() as u64;
    files::patch_riff_length(&mut file, new_size, path)?;
    file.sync_data().map_err(|e| JournalError::io_at(e, path))?;

    debug!(path = %path.display(), size = new_size, "appended journal record");
    Ok(())
}

/// Creates a new open file holding `header` followed by `record`.
///
/// The riff length is written for the header alone and patched once the
/// record is in place, the same two steps as an append. A failed write
/// removes the new file again.
pub(crate) fn create_open_file(
    path: &Path,
    header: &[u8],
    record: &[u8],
) -> Result<(), JournalError> {
    let mut file = files::create_new_file(path)?;

    let written = write_new_file(&mut file, path, header, record);

    if let Err(err) = written {
        drop(file);
        let _ = files::remove_file(path);
        return Err(err);
    }

    debug!(path = %path.display(), "started journal file");
    Ok(())
}

fn write_new_file(
    file: &mut File,
    path: &Path,
    header: &[u8],
    record: &[u8],
) -> Result<(), JournalError> {
    file.write_all(header).map_err(|e| JournalError::io_at(e, path))?;
    file.write_all(record).map_err(|e| JournalError::io_at(e, path))?;
    files::patch_riff_length(file, (header.len() + record.len()) as u64, path)?;
    file.sync_data().map_err(|e| JournalError::io_at(e, path))
}

/// Encodes the header of a new file of `subject` under `config`.
pub(crate) fn encode_header(config: &WriterConfig, subject: &str) -> Result<Vec<u8>, JournalError> {
    codec::encode_container_header(
        &config.producer,
        subject,
        &config.serialisation_method,
        &config.serialisation_version,
    )
}
