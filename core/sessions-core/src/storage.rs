//! Path management for cc-sessions project data.
//!
//! `StorageConfig` resolves the project root once and derives every
//! project-relative path from it. Nothing else in the crate builds these
//! paths by hand.
//!
//! ```text
//! <project>/
//! ├── .claude/                       # marks the project root
//! └── sessions/
//!     ├── sessions-config.json       # long-lived preferences
//!     ├── sessions-state.json        # mode, current task, todos, flags
//!     ├── sessions-state.lock/       # advisory edit lock (transient)
//!     ├── protocols/
//!     └── tasks/*.md
//! ```
//!
//! Production code uses [`StorageConfig::discover`]; tests use
//! [`StorageConfig::with_root`] with a temp directory.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Result, SessionsError};

/// Environment variable the host sets to the project directory.
pub const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";

#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves the project root from `CLAUDE_PROJECT_DIR`, falling back to
    /// the nearest ancestor of the working directory that contains `.claude/`.
    pub fn discover() -> Result<Self> {
        if let Some(dir) = env::var_os(PROJECT_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_root(PathBuf::from(dir)));
        }
        let cwd = env::current_dir().map_err(|source| SessionsError::Io {
            context: "reading current directory".to_string(),
            source,
        })?;
        Self::discover_from(&cwd)
    }

    /// Walks up from `start` looking for a `.claude` directory.
    pub fn discover_from(start: &Path) -> Result<Self> {
        start
            .ancestors()
            .find(|dir| dir.join(".claude").is_dir())
            .map(|dir| Self::with_root(dir.to_path_buf()))
            .ok_or_else(|| SessionsError::ProjectRootNotFound(start.to_path_buf()))
    }

    /// Creates a StorageConfig with an explicit project root.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to the `sessions/` directory.
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    /// Path to sessions-config.json (preferences, trigger phrases, blocked actions).
    pub fn config_file(&self) -> PathBuf {
        self.sessions_dir().join("sessions-config.json")
    }

    /// Path to sessions-state.json (mode, current task, todos, flags).
    pub fn state_file(&self) -> PathBuf {
        self.sessions_dir().join("sessions-state.json")
    }

    /// Lock directory guarding edits of `document`.
    pub fn lock_dir_for(document: &Path) -> PathBuf {
        document.with_extension("lock")
    }

    /// Where a document that failed to parse is preserved before being replaced.
    pub fn backup_file_for(document: &Path) -> PathBuf {
        document.with_extension("bad.json")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directories
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to the task file collection.
    pub fn tasks_dir(&self) -> PathBuf {
        self.sessions_dir().join("tasks")
    }

    /// Path to the protocol documents referenced in agent context.
    pub fn protocols_dir(&self) -> PathBuf {
        self.sessions_dir().join("protocols")
    }

    /// Path to a named protocol document, e.g. `task-creation.md`.
    pub fn protocol_file(&self, name: &str) -> PathBuf {
        self.protocols_dir().join(format!("{name}.md"))
    }
}
