//! Append-only event journal for one producer.
//!
//! # Components
//!
//! - [`codec`]: RIFF/SJRN container header and `PBUF` record framing
//! - [`naming`]: directory layout, [`Subject`], open and closed file names
//! - [`file_info`]: [`FileInfo`] extraction from files on disk
//! - [`lifecycle`]: rotation policy, append, close
//! - [`recovery`]: startup scan that restores the id sequence and repairs
//!   files left by a crash
//! - [`prune`]: truncation of a partial trailing record
//! - [`writer`]: [`Writer`], the entry point tying it together
//! - [`config`]: [`WriterConfig`]
//! - [`error`]: [`JournalError`]

pub mod codec;
pub mod config;
pub mod error;
pub mod file_info;
mod files;
pub mod lifecycle;
pub mod naming;
pub mod prune;
pub mod recovery;
pub mod writer;


pub use codec::{
    ContainerHeader, HeaderError, MAX_HEADER_LENGTH, MAX_RECORD_SIZE, PbufInfo, RECORD_HEADER_SIZE,
    RecordRef, SJRN_VERSION,
};
pub use config::{DEFAULT_MAX_FILE_SIZE, WriterConfig};
pub use error::JournalError;
pub use file_info::{FileFlags, FileInfo, Inspection, ScanLogging, inspect_file};
pub use lifecycle::{Decision, RotateReason, RotationPolicy};
pub use naming::{JournalFileName, Subject, closed_file_name, open_file_name};
pub use prune::{PruneOutcome, prune_truncated_events};
pub use recovery::RecoveryReport;
pub use writer::Writer;
