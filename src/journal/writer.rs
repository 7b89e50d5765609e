//! The journal writer.
//!
//! [`Writer`] owns the directory tree `location/producer` and appends framed
//! records to one open file per subject, rotating and repairing files as
//! described in the [`lifecycle`](super::lifecycle) module.

use super::codec;
use super::config::WriterConfig;
use super::error::JournalError;
use super::file_info::{FileInfo, Inspection, ScanLogging, inspect_file};
use super::files;
use super::lifecycle::{self, Decision, RotationPolicy};
use super::naming::{self, Subject};
use super::prune::{self, PruneOutcome};
use super::recovery::{self, RecoveryReport};
use crate::utils::current_filetime;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Append-only writer of journal container files for one producer.
///
/// # Ownership
///
/// A writer assumes it is the only one working on `location/producer`.
/// Two writers on the same tree (in one process or several) are not
/// coordinated and will corrupt each other's files.
///
/// # Thread Safety
///
/// `insert` takes `&self`. Producer ids come from an atomic counter, and
/// file operations on one subject are serialised by a per-subject mutex, so
/// inserts on different subjects proceed independently.
///
/// # Example
///
/// ```rust,no_run
/// use event_journal::{Subject, Writer};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let writer = Writer::new("/var/lib/agent/journal", "Agent")?;
/// let detections = Subject::new("Detections")?;
/// let id = writer.insert(&detections, &[0u8; 64])?;
/// # let _ = id;
/// # Ok(())
/// # }
/// ```
pub struct Writer {
    /// Validated configuration.
    config: WriterConfig,
    /// `location/producer`.
    producer_dir: PathBuf,
    /// Rotation rules derived from the configuration.
    policy: RotationPolicy,
    /// The id the next record receives.
    next_id: AtomicU64,
    /// One lock per subject touched so far.
    subjects: DashMap<Subject, Arc<Mutex<()>>>,
    /// Outcome of the startup scan.
    recovery: RecoveryReport,
}

impl Writer {
    /// Opens the journal of `producer` under `location` with default
    /// settings, running the recovery scan.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidConfig`] for an unusable producer name
    /// and [`JournalError::Io`] if the tree cannot be created or scanned.
    pub fn new<P: AsRef<Path>>(location: P, producer: &str) -> Result<Self, JournalError> {
        Self::with_config(WriterConfig::new(location.as_ref(), producer))
    }

    /// Opens a journal with an explicit configuration, running the recovery
    /// scan.
    ///
    /// The scan takes time proportional to the number of files on disk.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidConfig`] if `config` does not validate
    /// and [`JournalError::Io`] if the tree cannot be created or scanned.
    pub fn with_config(config: WriterConfig) -> Result<Self, JournalError> {
        config.validate()?;
        let producer_dir = config.producer_dir();
        files::ensure_dir(&producer_dir)?;

        let policy = RotationPolicy::from_config(&config);
        let report = recovery::recover(&producer_dir, &policy)?;
        info!(
            producer = %config.producer,
            dir = %producer_dir.display(),
            next_id = report.next_id(),
            open_files = report.open_files,
            closed_files = report.closed_files,
            rotated = report.rotated,
            removed = report.removed,
            pruned = report.pruned,
            "journal writer recovered"
        );

        Ok(Self {
            next_id: AtomicU64::new(report.next_id()),
            config,
            producer_dir,
            policy,
            subjects: DashMap::new(),
            recovery: report,
        })
    }

    /// Appends `payload` as a new record of `subject` and returns the
    /// producer id assigned to it.
    ///
    /// The payload is opaque but its length must be a multiple of 8. On-disk
    /// corruption of the subject's open file never fails an insert: the
    /// file is replaced and the record goes to a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidPayload`] before any I/O if the
    /// payload is misaligned or too large for a record or a file, and
    /// [`JournalError::Io`] if a filesystem call fails. After an I/O error
    /// the next insert re-evaluates the open file from scratch.
    pub fn insert(&self, subject: &Subject, payload: &[u8]) -> Result<u64, JournalError> {
        let record_size = codec::record_size(payload.len())?;
        let file_size = self.config.header_size(subject.as_str()) + record_size;
        if file_size as u64 > self.config.max_file_size {
            return Err(JournalError::invalid_payload(
                payload.len(),
                format!(
                    "a file holding only this record would exceed the {} byte maximum",
                    self.config.max_file_size
                ),
            ));
        }

        let lock = self.subject_lock(subject);
        let _guard = lock.lock().map_err(|_| JournalError::MutexPoisoned)?;

        let dir = self.subject_dir(subject);
        files::ensure_dir(&dir)?;

        let producer_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let timestamp = current_filetime();
        let record = codec::encode_record(payload, producer_id, timestamp)?;

        match self.current_open_file(subject, &dir, record.len())? {
            Some(path) => lifecycle::append_record(&path, &record)?,
            None => {
                let path = dir.join(naming::open_file_name(
                    subject.as_str(),
                    producer_id,
                    timestamp,
                ));
                let header = lifecycle::encode_header(&self.config, subject.as_str())?;
                lifecycle::create_open_file(&path, &header, &record)?;
            }
        }

        #[cfg(feature = "metrics")]
        metrics::counter!("event_journal_inserts_total").increment(1);
        Ok(producer_id)
    }

    /// Finds the open file the next record of `incoming` bytes should be
    /// appended to, closing or deleting whatever stands in the way.
    ///
    /// Returns `None` when a new file has to be started.
    fn current_open_file(
        &self,
        subject: &Subject,
        dir: &Path,
        incoming: usize,
    ) -> Result<Option<PathBuf>, JournalError> {
        let mut open = lifecycle::find_open_files(dir, subject.as_str())?;
        let Some((current, _)) = open.pop() else {
            return Ok(None);
        };
        for (stale, _) in open {
            warn!(path = %stale.display(), "closing stale open journal file");
            lifecycle::close_file(&stale, subject.as_str())?;
        }

        let Some(mut info) = peek_open_file(&current)? else {
            return Ok(None);
        };
        if !info.riff_length_matches_size() {
            // Bytes of an unacknowledged append; never write after them.
            warn!(
                path = %current.display(),
                riff_length = info.riff_length,
                size = info.size,
                "pruning unacknowledged bytes from open journal file"
            );
            prune::prune_truncated_events(&current)?;
            let Some(pruned) = peek_open_file(&current)? else {
                return Ok(None);
            };
            info = pruned;
        }

        match self.policy.evaluate(&info, incoming) {
            Decision::Append => Ok(Some(current)),
            Decision::Rotate(reason) => {
                debug!(path = %current.display(), ?reason, "rotating journal file");
                lifecycle::close_file(&current, subject.as_str())?;
                Ok(None)
            }
            Decision::Remove => {
                lifecycle::discard_file(&current, "no complete records")?;
                Ok(None)
            }
        }
    }

    fn subject_lock(&self, subject: &Subject) -> Arc<Mutex<()>> {
        if let Some(lock) = self.subjects.get(subject) {
            return Arc::clone(&lock);
        }
        Arc::clone(&self.subjects.entry(subject.clone()).or_default())
    }

    /// Truncates the file at `path` to its last complete record.
    ///
    /// See [`prune_truncated_events`](super::prune::prune_truncated_events).
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Io`] if the file cannot be read or modified.
    pub fn prune_truncated_events<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<PruneOutcome, JournalError> {
        prune::prune_truncated_events(path)
    }

    /// The id the next inserted record will receive.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// The id most recently handed out by this writer or a previous writer
    /// on the same tree, if any.
    #[must_use]
    pub fn last_assigned_id(&self) -> Option<u64> {
        self.next_id().checked_sub(1).filter(|id| *id > 0)
    }

    /// The writer's configuration.
    #[must_use]
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// `location/producer`.
    #[must_use]
    pub fn producer_dir(&self) -> &Path {
        &self.producer_dir
    }

    /// Directory holding the files of `subject`.
    #[must_use]
    pub fn subject_dir(&self, subject: &Subject) -> PathBuf {
        self.producer_dir.join(subject.as_str())
    }

    /// What the startup recovery scan found.
    #[must_use]
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }
}

/// Reads the first record of an open file, deleting the file if its header
/// is unreadable.
fn peek_open_file(path: &Path) -> Result<Option<FileInfo>, JournalError> {
    match inspect_file(path, Some(1), ScanLogging::Warn)? {
        Inspection::Valid(info) => Ok(Some(info)),
        Inspection::CorruptHeader(_) => {
            lifecycle::discard_file(path, "unreadable header")?;
            Ok(None)
        }
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("producer_dir", &self.producer_dir)
            .field("max_file_size", &self.config.max_file_size)
            .field("next_id", &self.next_id())
            .field("subjects", &self.subjects.len())
            .finish()
    }
}
