//! Runtime state document (`sessions/sessions-state.json`).
//!
//! Missing fields load as defaults; unknown enum values fall back to
//! `discussion` / `pending` rather than rejecting the document.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata key marking the onboarding ("noob") flow as active.
pub const ONBOARDING_KEY: &str = "onboarding";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Implementation,
    #[default]
    #[serde(other)]
    Discussion,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Discussion => "discussion",
            Mode::Implementation => "implementation",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────────────────

/// The active unit of work, as recorded in task file frontmatter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskState {
    pub name: Option<String>,
    /// Path relative to `sessions/tasks/`.
    pub file: Option<String>,
    pub branch: Option<String>,
    pub status: Option<String>,
    pub created: Option<String>,
    pub started: Option<String>,
    pub updated: Option<String>,
    pub submodules: Option<Vec<String>>,
}

impl TaskState {
    /// Identifier of the task: its file, or its name when no file is recorded.
    pub fn id(&self) -> Option<&str> {
        self.file.as_deref().or(self.name.as_deref())
    }

    pub fn is_active(&self) -> bool {
        self.id().is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Todos
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TodoStatus {
    #[serde(alias = "in_progress")]
    InProgress,
    Completed,
    #[default]
    #[serde(other)]
    Pending,
}

/// A todo as stored: bare strings are accepted as pending todos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredTodo")]
pub struct Todo {
    pub content: String,
    pub status: TodoStatus,
    #[serde(rename = "activeForm")]
    pub active_form: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTodo {
    Text(String),
    Full {
        #[serde(default)]
        content: String,
        #[serde(default)]
        status: TodoStatus,
        #[serde(rename = "activeForm", default)]
        active_form: Option<String>,
    },
}

impl From<StoredTodo> for Todo {
    fn from(stored: StoredTodo) -> Self {
        match stored {
            StoredTodo::Text(content) => Self {
                content,
                status: TodoStatus::Pending,
                active_form: None,
            },
            StoredTodo::Full {
                content,
                status,
                active_form,
            } => Self {
                content,
                status,
                active_form,
            },
        }
    }
}

impl Todo {
    pub fn pending(content: &str, active_form: &str) -> Self {
        Self {
            content: content.to_string(),
            status: TodoStatus::Pending,
            active_form: Some(active_form.to_string()),
        }
    }
}

/// Active todo list plus a single stash slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Todos {
    pub active: Vec<Todo>,
    pub stashed: Vec<Todo>,
}

impl Todos {
    pub fn all_complete(&self) -> bool {
        self.active
            .iter()
            .all(|t| t.status == TodoStatus::Completed)
    }

    /// Moves the active list into the stash slot, overwriting it. Returns the count moved.
    pub fn stash_active(&mut self) -> usize {
        let moved = self.active.len();
        self.stashed = std::mem::take(&mut self.active);
        moved
    }

    pub fn clear_active(&mut self) -> usize {
        let removed = self.active.len();
        self.active.clear();
        removed
    }

    /// Restores the stash only when the active list is empty or complete.
    pub fn restore_stashed(&mut self) -> usize {
        if self.stashed.is_empty() || !self.all_complete() {
            return 0;
        }
        self.active = std::mem::take(&mut self.stashed);
        self.active.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Flags
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFlags {
    /// 85% context warning already shown this session.
    pub context_85: bool,
    /// 90% context warning already shown this session.
    pub context_90: bool,
    pub subagent: bool,
    pub noob: bool,
}

impl Default for SessionFlags {
    fn default() -> Self {
        Self {
            context_85: false,
            context_90: false,
            subagent: false,
            noob: true,
        }
    }
}

impl SessionFlags {
    /// Resets the per-session flags. `noob` spans sessions and is kept.
    pub fn clear_session_flags(&mut self) {
        self.context_85 = false;
        self.context_90 = false;
        self.subagent = false;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsState {
    pub version: String,
    pub current_task: TaskState,
    pub mode: Mode,
    pub todos: Todos,
    pub flags: SessionFlags,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Default for SessionsState {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            current_task: TaskState::default(),
            mode: Mode::default(),
            todos: Todos::default(),
            flags: SessionFlags::default(),
            metadata: BTreeMap::new(),
        }
    }
}

impl SessionsState {
    pub fn is_onboarding(&self) -> bool {
        self.metadata
            .get(ONBOARDING_KEY)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_onboarding(&mut self, active: bool) {
        self.metadata
            .insert(ONBOARDING_KEY.to_string(), serde_json::Value::Bool(active));
    }
}
