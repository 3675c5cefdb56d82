//! Persistent configuration and runtime state.
//!
//! # Architecture: Short-Lived Writers
//!
//! Every hook invocation is its own process. There is no daemon and no
//! shared memory; coordination happens entirely through the filesystem.
//!
//! ```text
//! user prompt ─┐                       ┌─ sessions-config.json
//! tool call   ─┼─→ sessions-hook ─→ Store ─┤
//! statusline  ─┘   (one process each)  └─ sessions-state.json
//! ```
//!
//! # Module Structure
//!
//! - [`lock`]: Advisory `mkdir` lock guarding each document's edit scope
//! - [`store`]: Fail-open reads and atomic, scoped edits
//! - [`types`]: The runtime state document

pub mod lock;
mod store;
pub(crate) mod types;

pub use store::{Document, Store};
pub use types::{
    Mode, SessionFlags, SessionsState, TaskState, Todo, TodoStatus, Todos, ONBOARDING_KEY,
};
