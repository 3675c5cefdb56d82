//! Host hook events.
//!
//! Each handler reads one JSON payload from stdin and answers on stdout,
//! stderr or the exit code:
//!
//! ```text
//! SessionStart     → session reset → {"hookSpecificOutput": {...}} on stdout
//! UserPromptSubmit → mode machine → {"hookSpecificOutput": {...}} on stdout
//! PreToolUse       → tool gate    → exit 0 (allow) / exit 2 + reason (deny)
//! statusline       → status report → two plain lines on stdout
//! ```

use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};
use sessions_core::mode::{self, PromptInput};
use sessions_core::storage::PROJECT_DIR_ENV;
use sessions_core::{
    SessionsError, StatusInput, StatusReport, StorageConfig, Store, ToolDecision,
};

use crate::error::{HookError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Payloads
// ═══════════════════════════════════════════════════════════════════════════════

/// The prompt hook sends a bare model id; the statusline sends an object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ModelField {
    Name(String),
    Info {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        display_name: Option<String>,
    },
}

impl ModelField {
    /// Id and display name joined, so either can carry the extended-context marker.
    pub fn describe(&self) -> String {
        match self {
            ModelField::Name(name) => name.clone(),
            ModelField::Info { id, display_name } => [id.as_deref(), display_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PromptHookInput {
    pub prompt: String,
    pub transcript_path: Option<PathBuf>,
    pub model: Option<ModelField>,
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SessionHookInput {
    pub source: Option<String>,
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ToolHookInput {
    pub tool_name: String,
    pub tool_input: Value,
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Workspace {
    pub current_dir: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatuslineInput {
    pub transcript_path: Option<PathBuf>,
    pub model: Option<ModelField>,
    pub workspace: Workspace,
    pub cwd: Option<PathBuf>,
}

impl StatuslineInput {
    fn working_dir(&self) -> Option<&Path> {
        self.workspace
            .current_dir
            .as_deref()
            .or(self.cwd.as_deref())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Plumbing
// ═══════════════════════════════════════════════════════════════════════════════

/// Reads stdin and parses it. Empty input yields `None`.
fn read_payload<T: serde::de::DeserializeOwned>() -> Result<Option<T>> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(HookError::Stdin)?;
    parse_payload(&input)
}

fn parse_payload<T: serde::de::DeserializeOwned>(input: &str) -> Result<Option<T>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(input)
        .map(Some)
        .map_err(HookError::Parse)
}

/// Resolves the project for a hook. `CLAUDE_PROJECT_DIR` wins over the
/// payload's working directory. Outside any project yields `None`.
pub fn open_store(cwd: Option<&Path>) -> Result<Option<Store>> {
    let explicit = env::var_os(PROJECT_DIR_ENV).is_some_and(|v| !v.is_empty());
    let storage = match cwd {
        Some(dir) if !explicit => StorageConfig::discover_from(dir),
        _ => StorageConfig::discover(),
    };
    match storage {
        Ok(storage) => Ok(Some(Store::new(storage))),
        Err(SessionsError::ProjectRootNotFound(_)) => {
            tracing::debug!(cwd = ?cwd, "No project root; hook is a no-op");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SessionStart
// ═══════════════════════════════════════════════════════════════════════════════

pub fn run_session_start() -> Result<()> {
    let input = read_payload::<SessionHookInput>()?.unwrap_or_default();
    let Some(store) = open_store(input.cwd.as_deref())? else {
        return Ok(());
    };
    println!("{}", session_start_output(&store, &input)?);
    Ok(())
}

pub fn session_start_output(store: &Store, input: &SessionHookInput) -> Result<Value> {
    let start = mode::on_session_start(store)?;
    tracing::info!(
        source = input.source.as_deref().unwrap_or("unknown"),
        restored_todos = start.restored.len(),
        "Session start handled"
    );

    Ok(json!({
        "hookSpecificOutput": {
            "hookEventName": "SessionStart",
            "additionalContext": start.context,
        }
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// UserPromptSubmit
// ═══════════════════════════════════════════════════════════════════════════════

pub fn run_user_prompt() -> Result<()> {
    let Some(input) = read_payload::<PromptHookInput>()? else {
        return Ok(());
    };
    let Some(store) = open_store(input.cwd.as_deref())? else {
        return Ok(());
    };
    println!("{}", user_prompt_output(&store, &input)?);
    Ok(())
}

pub fn user_prompt_output(store: &Store, input: &PromptHookInput) -> Result<Value> {
    let model = input.model.as_ref().map(ModelField::describe);
    let outcome = mode::on_user_message(
        store,
        &PromptInput {
            prompt: &input.prompt,
            transcript_path: input.transcript_path.as_deref(),
            model: model.as_deref(),
        },
    )?;

    for event in &outcome.events {
        tracing::info!(event = ?event, "Prompt event");
    }

    Ok(json!({
        "hookSpecificOutput": {
            "hookEventName": "UserPromptSubmit",
            "additionalContext": outcome.context,
        }
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// PreToolUse
// ═══════════════════════════════════════════════════════════════════════════════

pub fn run_pre_tool_use() -> Result<ToolDecision> {
    let Some(input) = read_payload::<ToolHookInput>()? else {
        return Ok(ToolDecision::Allow);
    };
    let Some(store) = open_store(input.cwd.as_deref())? else {
        return Ok(ToolDecision::Allow);
    };
    Ok(tool_decision(&store, &input))
}

pub fn tool_decision(store: &Store, input: &ToolHookInput) -> ToolDecision {
    let decision = mode::on_tool_use(
        &store.load_config(),
        &store.load_state(),
        &input.tool_name,
        &input.tool_input,
    );
    if let ToolDecision::Deny { reason } = &decision {
        tracing::info!(tool = %input.tool_name, reason = %reason, "Tool call denied");
    }
    decision
}

// ═══════════════════════════════════════════════════════════════════════════════
// Statusline
// ═══════════════════════════════════════════════════════════════════════════════

pub fn run_statusline() -> Result<()> {
    let input = read_payload::<StatuslineInput>()?.unwrap_or_default();
    println!("{}", statusline_text(&input)?);
    Ok(())
}

/// Renders the report. Outside a project, the working directory stands in
/// as the root and every document reads as its default.
pub fn statusline_text(input: &StatuslineInput) -> Result<String> {
    let cwd = input.working_dir();
    let store = match open_store(input.workspace.project_dir.as_deref().or(cwd))? {
        Some(store) => store,
        None => {
            let root = match cwd {
                Some(dir) => dir.to_path_buf(),
                None => env::current_dir().map_err(|e| SessionsError::Io {
                    context: "resolving working directory".to_string(),
                    source: e,
                })?,
            };
            Store::new(StorageConfig::with_root(root))
        }
    };
    Ok(render_status(&store, input))
}

pub fn render_status(store: &Store, input: &StatuslineInput) -> String {
    let model = input.model.as_ref().map(ModelField::describe);
    let report = StatusReport::collect(
        store,
        &StatusInput {
            transcript_path: input.transcript_path.as_deref(),
            model: model.as_deref(),
            workspace_dir: input.working_dir(),
        },
    );
    report.to_string()
}
