//! Workflow protocols activated by trigger phrases.
//!
//! Each protocol has a markdown document under `sessions/protocols/` that
//! the agent is pointed at, and a fixed todo list loaded into state when
//! the protocol activates.

use std::fmt;

use crate::config::TriggerCategory;
use crate::state::Todo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    TaskCreation,
    TaskStartup,
    TaskCompletion,
    ContextCompaction,
}

/// `(content, activeForm)` pairs.
type TodoTemplate = &'static [(&'static str, &'static str)];

const TASK_CREATION_TODOS: TodoTemplate = &[
    (
        "Determine task priority and type prefix",
        "Determining task priority and type prefix",
    ),
    (
        "Decide if task needs file or directory structure",
        "Deciding if task needs file or directory structure",
    ),
    ("Create task file from template", "Creating task file"),
    (
        "Write clear problem statement and success criteria",
        "Writing clear problem statement and success criteria",
    ),
    (
        "Run context-gathering agent to create context manifest",
        "Running context-gathering agent to create context manifest",
    ),
    (
        "Update appropriate service index files",
        "Updating appropriate service index files",
    ),
    ("Commit the new task file", "Committing the new task file"),
];

const TASK_STARTUP_TODOS: TodoTemplate = &[
    (
        "Check git status and handle any uncommitted changes",
        "Checking git status and handling uncommitted changes",
    ),
    (
        "Create/checkout task branch and matching submodule branches",
        "Creating/checking out task branch(es)",
    ),
    (
        "Set the task as current in sessions state",
        "Setting the current task",
    ),
    (
        "Load task context manifest and verify understanding",
        "Loading task context manifest and verifying understanding",
    ),
    (
        "Update task status to in-progress and add started date",
        "Updating task status to in-progress and adding started date",
    ),
];

const TASK_COMPLETION_TODOS: TodoTemplate = &[
    (
        "Verify all success criteria are checked off",
        "Verifying status of success criteria",
    ),
    (
        "Run code-review agent and address any critical issues",
        "Running code-review agent",
    ),
    (
        "Run logging agent to consolidate work logs",
        "Running logging agent to consolidate work logs",
    ),
    (
        "Run service-documentation agent to update CLAUDE.md files and other documentation",
        "Running service-documentation agent to update documentation",
    ),
    (
        "Mark task file complete and move to tasks/done/",
        "Archiving task file",
    ),
    (
        "Commit all changes with comprehensive message and (USER OPTION: merge to main)",
        "Committing and merging",
    ),
    (
        "USER OPTION: Push changes to remote",
        "Asking user about pushing changes",
    ),
];

const CONTEXT_COMPACTION_TODOS: TodoTemplate = &[
    (
        "Run logging agent to update work logs",
        "Running logging agent to update work logs",
    ),
    (
        "Run context-refinement agent to check for discoveries",
        "Running context-refinement agent to check for discoveries",
    ),
    (
        "Run service-documentation agent (if service interfaces changed)",
        "Running service-documentation agent if service interfaces changed",
    ),
    (
        "Verify/update current task state",
        "Verifying/updating current task",
    ),
    (
        "Announce readiness for context clear",
        "Announcing readiness for context clear",
    ),
];

impl Protocol {
    pub const ALL: [Protocol; 4] = [
        Protocol::TaskCreation,
        Protocol::TaskStartup,
        Protocol::TaskCompletion,
        Protocol::ContextCompaction,
    ];

    /// The protocol a trigger category activates; mode categories have none.
    pub fn for_category(category: TriggerCategory) -> Option<Protocol> {
        match category {
            TriggerCategory::TaskCreation => Some(Protocol::TaskCreation),
            TriggerCategory::TaskStartup => Some(Protocol::TaskStartup),
            TriggerCategory::TaskCompletion => Some(Protocol::TaskCompletion),
            TriggerCategory::ContextCompaction => Some(Protocol::ContextCompaction),
            TriggerCategory::DiscussionMode | TriggerCategory::ImplementationMode => None,
        }
    }

    pub fn category(self) -> TriggerCategory {
        match self {
            Protocol::TaskCreation => TriggerCategory::TaskCreation,
            Protocol::TaskStartup => TriggerCategory::TaskStartup,
            Protocol::TaskCompletion => TriggerCategory::TaskCompletion,
            Protocol::ContextCompaction => TriggerCategory::ContextCompaction,
        }
    }

    /// Document name under `sessions/protocols/`, without extension.
    pub fn document_name(self) -> &'static str {
        match self {
            Protocol::TaskCreation => "task-creation",
            Protocol::TaskStartup => "task-startup",
            Protocol::TaskCompletion => "task-completion",
            Protocol::ContextCompaction => "context-compaction",
        }
    }

    /// Whether unfinished active todos are stashed (and later restored)
    /// rather than discarded when this protocol takes over.
    pub fn stashes_unfinished(self) -> bool {
        matches!(self, Protocol::TaskCreation | Protocol::ContextCompaction)
    }

    pub fn todos(self) -> Vec<Todo> {
        let template = match self {
            Protocol::TaskCreation => TASK_CREATION_TODOS,
            Protocol::TaskStartup => TASK_STARTUP_TODOS,
            Protocol::TaskCompletion => TASK_COMPLETION_TODOS,
            Protocol::ContextCompaction => CONTEXT_COMPACTION_TODOS,
        };
        template
            .iter()
            .map(|(content, active_form)| Todo::pending(content, active_form))
            .collect()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.document_name())
    }
}
