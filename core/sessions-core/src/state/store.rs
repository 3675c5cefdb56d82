//! File-backed persistence for the configuration and runtime state documents.
//!
//! # Contract
//!
//! - **Reads fail open**: a missing, empty, unreadable or corrupt document
//!   yields a default document (with a warning), never an error.
//! - **Edits are scoped**: [`Store::edit_state`] / [`Store::edit_config`]
//!   take the advisory lock, re-read the latest document, hand it to the
//!   caller's closure, and persist it only if the closure returns `Ok`.
//!   An `Err` abandons the edit and leaves the file untouched.
//! - **Writes are atomic**: temp file in the same directory + fsync + rename,
//!   so a concurrent reader sees either the old or the new document.
//!
//! A write failure is the one condition surfaced to callers.

use std::io::{ErrorKind, Write};
use std::path::Path;

use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::SessionsConfig;
use crate::error::{Result, SessionsError};
use crate::storage::StorageConfig;

use super::lock;
use super::types::SessionsState;

/// A JSON document owned by the store.
pub trait Document: Serialize + DeserializeOwned + Default {
    const NAME: &'static str;

    /// Re-establishes invariants after a load.
    fn normalize(&mut self) {}
}

impl Document for SessionsConfig {
    const NAME: &'static str = "config";

    fn normalize(&mut self) {
        SessionsConfig::normalize(self);
    }
}

impl Document for SessionsState {
    const NAME: &'static str = "state";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocStatus {
    Missing,
    Valid,
    /// Present but unusable; the raw bytes deserve a backup before overwrite.
    Corrupt,
    Unreadable,
}

struct Loaded<D> {
    doc: D,
    status: DocStatus,
}

/// Handle to the project's persisted documents.
///
/// Construct once per process and pass it down; there is no global instance.
#[derive(Debug, Clone)]
pub struct Store {
    storage: StorageConfig,
}

impl Store {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    /// Resolves the project root from the environment. See [`StorageConfig::discover`].
    pub fn discover() -> Result<Self> {
        StorageConfig::discover().map(Self::new)
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn load_config(&self) -> SessionsConfig {
        read_document(&self.storage.config_file()).doc
    }

    pub fn load_state(&self) -> SessionsState {
        read_document(&self.storage.state_file()).doc
    }

    pub fn edit_config<T>(
        &self,
        edit: impl FnOnce(&mut SessionsConfig) -> Result<T>,
    ) -> Result<T> {
        edit_document(&self.storage.config_file(), edit)
    }

    pub fn edit_state<T>(&self, edit: impl FnOnce(&mut SessionsState) -> Result<T>) -> Result<T> {
        edit_document(&self.storage.state_file(), edit)
    }
}

fn read_document<D: Document>(path: &Path) -> Loaded<D> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(document = D::NAME, path = %path.display(), "Document missing, using defaults");
            return Loaded {
                doc: D::default(),
                status: DocStatus::Missing,
            };
        }
        Err(err) => {
            tracing::warn!(document = D::NAME, path = %path.display(), error = %err, "Failed to read document, using defaults");
            return Loaded {
                doc: D::default(),
                status: DocStatus::Unreadable,
            };
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        tracing::warn!(document = D::NAME, path = %path.display(), "Empty document, using defaults");
        return Loaded {
            doc: D::default(),
            status: DocStatus::Missing,
        };
    }

    // Invalid UTF-8 is a parse error like any other, so it is backed up on edit.
    match serde_json::from_slice::<D>(&bytes) {
        Ok(mut doc) => {
            doc.normalize();
            Loaded {
                doc,
                status: DocStatus::Valid,
            }
        }
        Err(err) => {
            tracing::warn!(document = D::NAME, path = %path.display(), error = %err, "Malformed document, using defaults");
            Loaded {
                doc: D::default(),
                status: DocStatus::Corrupt,
            }
        }
    }
}

fn edit_document<D: Document, T>(
    path: &Path,
    edit: impl FnOnce(&mut D) -> Result<T>,
) -> Result<T> {
    let _guard = lock::acquire(&StorageConfig::lock_dir_for(path))?;

    let Loaded { mut doc, status } = read_document::<D>(path);
    let output = edit(&mut doc)?;

    if status == DocStatus::Corrupt {
        preserve_corrupt(path);
    }
    write_document(path, &doc)?;
    Ok(output)
}

fn preserve_corrupt(path: &Path) {
    let backup = StorageConfig::backup_file_for(path);
    match fs::copy(path, &backup) {
        Ok(_) => {
            tracing::warn!(path = %path.display(), backup = %backup.display(), "Preserved malformed document")
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Failed to preserve malformed document")
        }
    }
}

pub(crate) fn write_document<D: Serialize>(path: &Path, doc: &D) -> Result<()> {
    let content = serde_json::to_string_pretty(doc).map_err(|source| SessionsError::Serialize {
        context: path.display().to_string(),
        source,
    })?;

    let write_failed = |source: std::io::Error| SessionsError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent_dir = path.parent().ok_or_else(|| {
        write_failed(std::io::Error::new(
            ErrorKind::InvalidInput,
            "document path has no parent directory",
        ))
    })?;
    fs::create_dir_all(parent_dir).map_err(write_failed)?;

    let mut temp_file = NamedTempFile::new_in(parent_dir).map_err(write_failed)?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(write_failed)?;
    temp_file.write_all(b"\n").map_err(write_failed)?;
    temp_file.flush().map_err(write_failed)?;
    temp_file.as_file().sync_all().map_err(write_failed)?;
    temp_file
        .persist(path)
        .map_err(|err| write_failed(err.error))?;

    tracing::debug!(path = %path.display(), "Document written");
    Ok(())
}
