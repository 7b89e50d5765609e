//! # Event Journal Writer
//!
//! An append-only, chunked binary log store for security events. A producer
//! (for example an endpoint agent) records opaque, already-serialised event
//! payloads per subject; a separate forwarder later picks up the closed
//! files and replays them.
//!
//! ## Key Features
//!
//! - **Self-describing files**: every file is a RIFF container whose `SJRN`
//!   header names the producer, the subject and the payload serialisation.
//!
//! - **Crash tolerant**: record boundaries are rediscovered by walking the
//!   records, never by trusting a stored count or the container length, so
//!   a crash mid-append loses at most the record being written.
//!
//! - **Monotonic ids**: every record carries a producer-local id that keeps
//!   increasing across rotations and process restarts.
//!
//! - **Self-healing**: corrupt or empty open files are replaced instead of
//!   failing the caller; truncated tails can be pruned.
//!
//! - **Rotation**: files are closed when they reach the size limit or when
//!   the serialisation format changes, and renamed to carry their id and
//!   timestamp range.
//!
//! ## On-Disk Layout
//!
//! ```text
//! <location>/<producer>/<subject>/<subject>-<first id>-<first ts>.bin                       (open)
//! <location>/<producer>/<subject>/<subject>-<first id>-<last id>-<first ts>-<last ts>.bin   (closed)
//! ```
//!
//! Ids are 16 lowercase hex digits, timestamps are decimal Windows FILETIME
//! ticks (100 ns since 1601-01-01 UTC). See [`journal::codec`] for the byte
//! layout of a file.
//!
//! ## Example
//!
//! ```rust,no_run
//! use event_journal::{Subject, Writer, WriterConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WriterConfig::new("/var/lib/agent/journal", "Agent")
//!     .with_max_file_size(4 * 1024 * 1024);
//! let writer = Writer::with_config(config)?;
//!
//! let detections = Subject::new("Detections")?;
//! let payload = vec![0u8; 64]; // payload lengths must be multiples of 8
//! let id = writer.insert(&detections, &payload)?;
//! assert_eq!(writer.next_id(), id + 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Ownership Model
//!
//! One [`Writer`] owns one `<location>/<producer>` tree. Nothing coordinates
//! two writers on the same tree; deployment has to guarantee a single
//! producer process.

pub mod journal;

pub mod prelude;
mod utils;

pub use journal::{
    ContainerHeader, DEFAULT_MAX_FILE_SIZE, FileFlags, FileInfo, HeaderError, Inspection,
    JournalError, JournalFileName, MAX_RECORD_SIZE, PbufInfo, PruneOutcome, RECORD_HEADER_SIZE,
    RecordRef, RecoveryReport, Subject, Writer, WriterConfig, closed_file_name, open_file_name,
    prune_truncated_events,
};
pub use utils::{
    FILETIME_UNIX_EPOCH_OFFSET, current_filetime, filetime_from_system_time,
    system_time_from_filetime,
};
