//! Pruner: cuts a container file back to its last complete record.
//!
//! A crash in the middle of an append can leave a partial record at the end
//! of the open file, or a riff length that was never patched. Pruning
//! truncates the file just past the last record that validates and rewrites
//! the riff length to match. Running it again on the same file changes
//! nothing.

use super::error::JournalError;
use super::file_info::{Inspection, ScanLogging, inspect_file};
use super::files;
use std::path::Path;
use tracing::{debug, info};

/// What [`prune_truncated_events`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneOutcome {
    /// The header is unreadable; the file was left alone.
    Unreadable,
    /// Not a single complete record; the file was left alone.
    NothingToKeep,
    /// The file now ends after its last complete record.
    Pruned {
        /// Bytes cut from the end of the file. Zero when only the riff
        /// length needed rewriting, or nothing at all.
        removed_bytes: u64,
    },
}

/// Truncates the file at `path` to its last complete record and rewrites
/// its riff length.
///
/// # Errors
///
/// Returns [`JournalError::Io`] if the file cannot be read, truncated or
/// written.
pub fn prune_truncated_events<P: AsRef<Path>>(path: P) -> Result<PruneOutcome, JournalError> {
    let path = path.as_ref();
    let info = match inspect_file(path, None, ScanLogging::Quiet)? {
        Inspection::Valid(info) => info,
        Inspection::CorruptHeader(err) => {
            debug!(path = %path.display(), error = %err, "not pruning journal file with unreadable header");
            return Ok(PruneOutcome::Unreadable);
        }
    };

    if info.events.valid_bytes == 0 {
        debug!(path = %path.display(), "not pruning journal file without complete records");
        return Ok(PruneOutcome::NothingToKeep);
    }

    let valid_size = info.valid_size();
    let mut file = files::open_read_write(path)?;
    file.set_len(valid_size).map_err(|e| JournalError::io_at(e, path))?;
    files::patch_riff_length(&mut file, valid_size, path)?;
    file.sync_all().map_err(|e| JournalError::io_at(e, path))?;

    let removed_bytes = info.size.saturating_sub(valid_size);
    if removed_bytes > 0 {
        info!(
            path = %path.display(),
            removed_bytes,
            records = info.events.count,
            "pruned truncated journal events"
        );
    }
    Ok(PruneOutcome::Pruned { removed_bytes })
}
