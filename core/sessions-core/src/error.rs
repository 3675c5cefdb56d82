//! Error types for sessions-core operations.
//!
//! Reads never produce these: missing or malformed documents degrade to
//! defaults. What surfaces here is the write path and explicit user edits.

use std::path::PathBuf;

/// All errors that can occur in sessions-core operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionsError {
    // ─────────────────────────────────────────────────────────────────────
    // Project Resolution
    // ─────────────────────────────────────────────────────────────────────
    #[error("Could not find project root (no .claude directory above {0})")]
    ProjectRootNotFound(PathBuf),

    // ─────────────────────────────────────────────────────────────────────
    // Persistence Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Document write failed: {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {context}: {source}")]
    Serialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not acquire lock {path} within {timeout_ms}ms")]
    LockTimeout { path: PathBuf, timeout_ms: u64 },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Edits
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {value} (expected one of: {expected})")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: String,
    },

    #[error("Unknown {section} setting: {key} (expected one of: {expected})")]
    UnknownSetting {
        section: &'static str,
        key: String,
        expected: String,
    },

    #[error("{0} cannot be changed from the command line")]
    ProtectedSetting(&'static str),

    #[error("Unknown trigger category: {0}")]
    UnknownCategory(String),

    #[error("Refusing to remove the last {category} trigger phrase")]
    LastPhrase { category: &'static str },

    // ─────────────────────────────────────────────────────────────────────
    // Task Files
    // ─────────────────────────────────────────────────────────────────────
    #[error("Task file not found: {0}")]
    TaskNotFound(PathBuf),

    #[error("Malformed task file {path}: {reason}")]
    MalformedTask { path: PathBuf, reason: String },
}

/// Convenience type alias for Results using SessionsError.
pub type Result<T> = std::result::Result<T, SessionsError>;

impl From<SessionsError> for String {
    fn from(err: SessionsError) -> String {
        err.to_string()
    }
}
