//! Writer configuration.
//!
//! [`WriterConfig`] can be built in code or loaded from JSON:
//!
//! ```json
//! {
//!     "location": "/var/lib/agent/journal",
//!     "producer": "Agent",
//!     "max_file_size": 16777216
//! }
//! ```
//!
//! Omitted optional fields take their defaults.

use super::codec::{self, RECORD_HEADER_SIZE};
use super::error::JournalError;
use super::naming::{self, MAX_NAME_LENGTH};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default upper bound on a container file (16 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;
/// Default payload serialisation method recorded in file headers.
pub const DEFAULT_SERIALISATION_METHOD: &str = "protobuf";
/// Default payload serialisation version recorded in file headers.
pub const DEFAULT_SERIALISATION_VERSION: &str = "1";

/// Configuration of a [`Writer`](super::Writer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Root directory of the journal tree.
    pub location: PathBuf,
    /// Producer name; the writer owns `location/producer` exclusively.
    pub producer: String,
    /// A file is rotated before an append would grow it past this size.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Serialisation method recorded in new file headers.
    #[serde(default = "default_serialisation_method")]
    pub serialisation_method: String,
    /// Serialisation version recorded in new file headers.
    #[serde(default = "default_serialisation_version")]
    pub serialisation_version: String,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_serialisation_method() -> String {
    DEFAULT_SERIALISATION_METHOD.to_string()
}

fn default_serialisation_version() -> String {
    DEFAULT_SERIALISATION_VERSION.to_string()
}

impl WriterConfig {
    /// Creates a configuration with default limits and serialisation
    /// settings.
    pub fn new(location: impl Into<PathBuf>, producer: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            producer: producer.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            serialisation_method: default_serialisation_method(),
            serialisation_version: default_serialisation_version(),
        }
    }

    /// Sets the maximum container file size.
    #[must_use]
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Sets the serialisation method and version written into new headers.
    #[must_use]
    pub fn with_serialisation(
        mut self,
        method: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.serialisation_method = method.into();
        self.serialisation_version = version.into();
        self
    }

    /// Parses a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidConfig`] if the JSON is malformed or
    /// the resulting configuration fails [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self, JournalError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| JournalError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Io`] if the file cannot be read, otherwise
    /// as [`from_json_str`](Self::from_json_str).
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, JournalError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| JournalError::io_at(e, path))?;
        Self::from_json_str(&json)
    }

    /// Checks that the configuration can produce valid files for every
    /// legal subject.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<(), JournalError> {
        naming::validate_name("producer", &self.producer)?;

        // Header size is checked against the longest legal subject.
        let longest_subject = "s".repeat(MAX_NAME_LENGTH);
        codec::encode_container_header(
            &self.producer,
            &longest_subject,
            &self.serialisation_method,
            &self.serialisation_version,
        )?;

        let smallest_file = (self.header_size(&longest_subject) + RECORD_HEADER_SIZE) as u64;
        if self.max_file_size < smallest_file {
            return Err(JournalError::invalid_config(format!(
                "max_file_size {} cannot hold a header and one record ({smallest_file} bytes)",
                self.max_file_size
            )));
        }
        if self.max_file_size > u64::from(u32::MAX) {
            return Err(JournalError::invalid_config(format!(
                "max_file_size {} does not fit the 32-bit riff length",
                self.max_file_size
            )));
        }
        Ok(())
    }

    /// Size of the container header this configuration writes for
    /// `subject`.
    #[must_use]
    pub fn header_size(&self, subject: &str) -> usize {
        codec::container_header_size(
            &self.producer,
            subject,
            &self.serialisation_method,
            &self.serialisation_version,
        )
    }

    /// The directory owned by this producer.
    #[must_use]
    pub fn producer_dir(&self) -> PathBuf {
        self.location.join(&self.producer)
    }
}
