//! Recovery scan run once when a writer starts.
//!
//! The scan walks every subject directory of the producer and does two
//! things:
//!
//! - finds the highest producer id ever handed out, so the new writer
//!   continues the sequence instead of repeating it;
//! - repairs open files left behind by a previous process: unreadable files
//!   are deleted, truncated tails are pruned, and files that the rotation
//!   policy would not append to are closed or deleted right away.
//!
//! Closed files are never opened; their last id is read from the name.

use super::codec::RECORD_HEADER_SIZE;
use super::error::JournalError;
use super::file_info::{FileFlags, Inspection, ScanLogging, inspect_file};
use super::files;
use super::lifecycle::{self, CloseOutcome, Decision, RotationPolicy};
use super::naming::{JournalFileName, Subject};
use super::prune::{PruneOutcome, prune_truncated_events};
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// What the recovery scan found and repaired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Highest producer id found on disk.
    pub max_seen_id: Option<u64>,
    /// Number of subject directories scanned.
    pub subjects: usize,
    /// Closed files found.
    pub closed_files: usize,
    /// Open files found.
    pub open_files: usize,
    /// Open files that were closed.
    pub rotated: usize,
    /// Open files that were deleted.
    pub removed: usize,
    /// Open files that were pruned.
    pub pruned: usize,
}

impl RecoveryReport {
    /// The first id the writer may hand out.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.max_seen_id.map_or(1, |max| max.saturating_add(1))
    }

    fn observe(&mut self, id: u64) {
        self.max_seen_id = Some(self.max_seen_id.map_or(id, |max| max.max(id)));
    }
}

/// Scans the producer directory at `producer_dir`.
///
/// A missing directory yields an empty report.
///
/// # Errors
///
/// Returns [`JournalError::Io`] if a directory cannot be listed or a repair
/// (delete, prune, rename) fails.
pub fn recover(
    producer_dir: &Path,
    policy: &RotationPolicy,
) -> Result<RecoveryReport, JournalError> {
    let mut report = RecoveryReport::default();

    let entries = match fs::read_dir(producer_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(JournalError::io_at(e, producer_dir)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| JournalError::io_at(e, producer_dir))?;
        let path = entry.path();
        let is_dir = entry
            .file_type()
            .map_err(|e| JournalError::io_at(e, &path))?
            .is_dir();
        if !is_dir {
            continue;
        }
        let Some(subject) = entry
            .file_name()
            .to_str()
            .and_then(|name| Subject::new(name).ok())
        else {
            debug!(path = %path.display(), "skipping directory that is not a journal subject");
            continue;
        };

        report.subjects += 1;
        recover_subject(&path, &subject, policy, &mut report)?;
    }

    Ok(report)
}

fn recover_subject(
    dir: &Path,
    subject: &Subject,
    policy: &RotationPolicy,
    report: &mut RecoveryReport,
) -> Result<(), JournalError> {
    for (name, path) in files::list_files(dir)? {
        let Some(parsed) = JournalFileName::parse(subject.as_str(), &name) else {
            trace!(file = %name, %subject, "ignoring file in journal subject");
            continue;
        };

        // An open file's first id was handed out even if the file is about
        // to be deleted.
        report.observe(parsed.highest_known_id());

        if parsed.is_open() {
            report.open_files += 1;
            recover_open_file(&path, subject, policy, report)?;
        } else {
            report.closed_files += 1;
        }
    }
    Ok(())
}

fn recover_open_file(
    path: &Path,
    subject: &Subject,
    policy: &RotationPolicy,
    report: &mut RecoveryReport,
) -> Result<(), JournalError> {
    let mut info = match inspect_file(path, None, ScanLogging::Warn)? {
        Inspection::Valid(info) => info,
        Inspection::CorruptHeader(_) => {
            lifecycle::discard_file(path, "unreadable header")?;
            report.removed += 1;
            return Ok(());
        }
    };

    if let Some(last_id) = info.events.last_id {
        report.observe(last_id);
    }

    if !info.should_remove()
        && info
            .flags
            .intersects(FileFlags::TRUNCATED | FileFlags::RIFF_LENGTH_MISMATCH)
        && let PruneOutcome::Pruned { .. } = prune_truncated_events(path)?
    {
        info.size = info.valid_size();
        report.pruned += 1;
    }

    match policy.evaluate(&info, RECORD_HEADER_SIZE) {
        Decision::Append => {
            debug!(path = %path.display(), records = info.events.count, "resuming journal file");
        }
        Decision::Rotate(reason) => {
            debug!(path = %path.display(), ?reason, "rotating journal file left by previous run");
            match lifecycle::close_file(path, subject.as_str())? {
                CloseOutcome::Closed(_) => report.rotated += 1,
                CloseOutcome::Removed => report.removed += 1,
            }
        }
        Decision::Remove => {
            lifecycle::discard_file(path, "no complete records")?;
            report.removed += 1;
        }
    }
    Ok(())
}
