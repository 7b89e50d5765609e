//! Filesystem helpers shared by the writer, the recovery scan and the
//! pruner.

use super::codec::{RIFF_HEADER_SIZE, RIFF_LENGTH_OFFSET};
use super::error::JournalError;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Directories: owner rwx, group r-x.
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) const DIR_MODE: u32 = 0o750;
/// Files: owner rw, group r.
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) const FILE_MODE: u32 = 0o640;

/// Creates `path` and any missing parents with [`DIR_MODE`].
pub(crate) fn ensure_dir(path: &Path) -> Result<(), JournalError> {
    if path.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
        .create(path)
        .map_err(|e| JournalError::io_at(e, path))
}

/// Creates a file that must not exist yet, with [`FILE_MODE`].
pub(crate) fn create_new_file(path: &Path) -> Result<File, JournalError> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    options.open(path).map_err(|e| JournalError::io_at(e, path))
}

/// Opens an existing file for reading and writing.
pub(crate) fn open_read_write(path: &Path) -> Result<File, JournalError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| JournalError::io_at(e, path))
}

/// Rewrites the riff length field for a file of `file_size` bytes.
pub(crate) fn patch_riff_length(
    file: &mut File,
    file_size: u64,
    path: &Path,
) -> Result<(), JournalError> {
    let riff_length = file_size
        .checked_sub(RIFF_HEADER_SIZE as u64)
        .and_then(|len| u32::try_from(len).ok())
        .ok_or_else(|| JournalError::Io {
            message: format!("file size {file_size} does not fit the riff length field"),
            path: Some(path.to_path_buf()),
        })?;
    file.seek(SeekFrom::Start(RIFF_LENGTH_OFFSET))
        .map_err(|e| JournalError::io_at(e, path))?;
    file.write_all(&riff_length.to_le_bytes())
        .map_err(|e| JournalError::io_at(e, path))
}

pub(crate) fn remove_file(path: &Path) -> Result<(), JournalError> {
    fs::remove_file(path).map_err(|e| JournalError::io_at(e, path))
}

pub(crate) fn rename(from: &Path, to: &Path) -> Result<(), JournalError> {
    fs::rename(from, to).map_err(|e| JournalError::io_at(e, from))
}

/// Lists the regular files of `dir` whose names are valid UTF-8.
///
/// A missing directory has no files.
pub(crate) fn list_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, JournalError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(JournalError::io_at(e, dir)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| JournalError::io_at(e, dir))?;
        let file_type = entry
            .file_type()
            .map_err(|e| JournalError::io_at(e, &entry.path()))?;
        if !file_type.is_file() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            files.push((name, entry.path()));
        }
    }
    Ok(files)
}
