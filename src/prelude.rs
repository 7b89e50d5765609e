//! Prelude module that re-exports commonly used types.
//!
//! ```rust
//! use event_journal::prelude::*;
//! ```

// Writer and configuration
pub use crate::journal::config::WriterConfig;
pub use crate::journal::writer::Writer;

// Names and errors
pub use crate::journal::error::JournalError;
pub use crate::journal::naming::Subject;

// Inspection and repair
pub use crate::journal::file_info::{FileInfo, Inspection, ScanLogging, inspect_file};
pub use crate::journal::prune::{PruneOutcome, prune_truncated_events};

// Utility functions
pub use crate::utils::current_filetime;
