//! # sessions-core
//!
//! Core library for cc-sessions: a discussion/implementation mode gate for
//! an AI coding agent, plus the state it persists and the status it reports.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. Every caller is a short-lived hook process.
//! - **Explicit handles**: [`Store`] is constructed once and passed down; no globals.
//! - **Graceful degradation**: Missing or malformed files return defaults, not errors.
//!   A failed write is the one error that propagates.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sessions_core::{mode, PromptInput, Store};
//!
//! let store = Store::discover()?;
//! let outcome = mode::on_user_message(&store, &PromptInput { prompt: "yert", ..Default::default() })?;
//! println!("{}", outcome.context);
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod git;
pub mod mode;
pub mod patterns;
pub mod protocols;
pub mod state;
pub mod status;
pub mod storage;
pub mod tasks;
pub mod telemetry;

// Re-export commonly used items at crate root
pub use classifier::{classify, CommandClass};
pub use config::{
    BlockedActions, CommitStyle, ConfigSection, Environment, Features, GitPreferences, PhraseList,
    SessionsConfig, StagingPolicy, TriggerCategory, TriggerPhrases, UserOs, UserShell,
};
pub use error::{Result, SessionsError};
pub use mode::{ModeEvent, PromptInput, PromptOutcome, SessionStart, ToolDecision, WarningLevel};
pub use protocols::Protocol;
pub use state::{Mode, SessionsState, Store, TaskState, Todo, TodoStatus};
pub use status::{StatusInput, StatusReport};
pub use storage::StorageConfig;
pub use telemetry::{ContextBar, ContextUsage};
