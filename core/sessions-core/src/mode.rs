//! Discussion/implementation mode state machine.
//!
//! Three entry points, one per hook:
//!
//! - [`on_user_message`]: scans the prompt for trigger phrases, switches
//!   mode, activates protocols and raises context warnings. The whole
//!   evaluation runs inside a single state edit scope.
//! - [`on_tool_use`]: decides whether a tool call may run. Pure; reads the
//!   already-loaded config and state.
//! - [`on_session_start`]: re-arms the context warnings and restores
//!   stashed todos for a fresh context window.
//!
//! Only trigger phrases move the machine into implementation mode. Anything
//! may move it back to discussion.

use std::path::{Component, Path};

use serde_json::Value;

use crate::classifier::{classify, CommandClass};
use crate::config::{SessionsConfig, TriggerCategory};
use crate::error::Result;
use crate::patterns::RE_TASK_REFERENCE;
use crate::protocols::Protocol;
use crate::state::{Mode, SessionFlags, SessionsState, Store, TaskState, Todo};
use crate::storage::StorageConfig;
use crate::tasks;
use crate::telemetry::{self, ContextUsage};

/// Prompts starting with this manage trigger phrases and are never scanned.
pub const ADD_TRIGGER_COMMAND: &str = "/add-trigger";
pub const ULTRATHINK_PREFIX: &str = "[[ ultrathink ]]\n\n";

pub const BASH_TOOL: &str = "Bash";
const FILE_EDIT_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];
const STATE_FILE_NAME: &str = "sessions-state.json";

const IMPLEMENTATION_NOTICE: &str = "[DAIC: Implementation Mode Activated]
CRITICAL RULES:
- Convert your proposed todos to TodoWrite EXACTLY as written
- Do NOT add new todos - only implement approved items
- Do NOT remove todos - complete them or return to discussion
- Check off each todo as you complete it
- If you discover you need to change your approach, return to discussion mode (`sessions-hook mode discussion`) and explain
- Todo list defines your execution boundary
";

const EMERGENCY_STOP_NOTICE: &str = "[DAIC: EMERGENCY STOP] All tools locked. You are now in discussion mode. Re-align with your pair programmer.\n";

// ═══════════════════════════════════════════════════════════════════════════════
// Transitions
// ═══════════════════════════════════════════════════════════════════════════════

pub fn next_mode(current: Mode, category: TriggerCategory) -> Mode {
    match category {
        TriggerCategory::DiscussionMode => Mode::Discussion,
        TriggerCategory::ImplementationMode => Mode::Implementation,
        TriggerCategory::TaskCreation
        | TriggerCategory::TaskStartup
        | TriggerCategory::TaskCompletion
        | TriggerCategory::ContextCompaction => current,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningLevel {
    /// 85% of usable context.
    Elevated,
    /// 90% of usable context.
    Critical,
}

impl WarningLevel {
    pub fn threshold(self) -> u8 {
        match self {
            WarningLevel::Elevated => 85,
            WarningLevel::Critical => 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeEvent {
    ModeChanged { from: Mode, to: Mode },
    EmergencyStop { cleared_todos: usize },
    ProtocolActivated { protocol: Protocol, stashed_todos: usize },
    TaskLoaded { file: String },
    ContextWarning { level: WarningLevel, used_tokens: u64, limit: u64 },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptInput<'a> {
    pub prompt: &'a str,
    pub transcript_path: Option<&'a Path>,
    pub model: Option<&'a str>,
}

/// What the prompt hook reports back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOutcome {
    pub mode: Mode,
    pub events: Vec<ModeEvent>,
    /// Text injected into the agent's context.
    pub context: String,
}

impl PromptOutcome {
    pub fn mode_changed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, ModeEvent::ModeChanged { .. }))
    }
}

/// Everything a prompt evaluation needs that lives outside the state document.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub prompt: &'a str,
    pub usage: Option<ContextUsage>,
    pub referenced_task: Option<TaskState>,
    pub storage: &'a StorageConfig,
}

pub fn is_add_trigger_command(prompt: &str) -> bool {
    prompt.trim_start().starts_with(ADD_TRIGGER_COMMAND)
}

/// Handles an inbound user prompt: one load of config, one state edit.
pub fn on_user_message(store: &Store, input: &PromptInput<'_>) -> Result<PromptOutcome> {
    let config = store.load_config();

    let usage = input
        .transcript_path
        .filter(|path| path.is_file())
        .map(|path| telemetry::compute(Some(path), input.model));

    let startup_requested = !is_add_trigger_command(input.prompt)
        && config
            .trigger_phrases
            .detect(input.prompt)
            .is_some_and(|(category, _)| category == TriggerCategory::TaskStartup);
    let referenced_task = if startup_requested {
        load_referenced_task(store.storage(), input.prompt)
    } else {
        None
    };

    let context = PromptContext {
        prompt: input.prompt,
        usage,
        referenced_task,
        storage: store.storage(),
    };
    store.edit_state(|state| Ok(evaluate_prompt(&config, state, &context)))
}

/// Applies a prompt to `state` in place.
pub fn evaluate_prompt(
    config: &SessionsConfig,
    state: &mut SessionsState,
    ctx: &PromptContext<'_>,
) -> PromptOutcome {
    let mut events = Vec::new();
    let mut context = String::new();
    let is_add_trigger = is_add_trigger_command(ctx.prompt);

    if config.features.auto_ultrathink && !is_add_trigger {
        context.push_str(ULTRATHINK_PREFIX);
    }

    if let Some(usage) = ctx.usage {
        if let Some(level) = context_warning(config, &state.flags, &usage) {
            match level {
                WarningLevel::Critical => state.flags.context_90 = true,
                WarningLevel::Elevated => state.flags.context_85 = true,
            }
            context.push_str(&warning_notice(level, &usage));
            events.push(ModeEvent::ContextWarning {
                level,
                used_tokens: usage.used_tokens,
                limit: usage.limit,
            });
        }
    }

    if !is_add_trigger {
        if let Some((category, phrase)) = config.trigger_phrases.detect(ctx.prompt) {
            tracing::info!(category = %category, phrase = %phrase, "Trigger phrase detected");
            apply_trigger(config, state, category, ctx, &mut events, &mut context);
        }
    }

    PromptOutcome {
        mode: state.mode,
        events,
        context,
    }
}

fn apply_trigger(
    config: &SessionsConfig,
    state: &mut SessionsState,
    category: TriggerCategory,
    ctx: &PromptContext<'_>,
    events: &mut Vec<ModeEvent>,
    context: &mut String,
) {
    let from = state.mode;
    let to = next_mode(from, category);

    match category {
        TriggerCategory::DiscussionMode => {
            state.mode = to;
            let cleared = state.todos.clear_active();
            if from != to {
                events.push(ModeEvent::ModeChanged { from, to });
            }
            events.push(ModeEvent::EmergencyStop {
                cleared_todos: cleared,
            });
            context.push_str(EMERGENCY_STOP_NOTICE);
        }
        TriggerCategory::ImplementationMode => {
            if from != to {
                state.mode = to;
                events.push(ModeEvent::ModeChanged { from, to });
                context.push_str(IMPLEMENTATION_NOTICE);
            }
        }
        _ => {
            if let Some(protocol) = Protocol::for_category(category) {
                activate_protocol(config, state, protocol, ctx, events, context);
            }
        }
    }
}

fn activate_protocol(
    config: &SessionsConfig,
    state: &mut SessionsState,
    protocol: Protocol,
    ctx: &PromptContext<'_>,
    events: &mut Vec<ModeEvent>,
    context: &mut String,
) {
    let todos = &mut state.todos;
    let stashed = if protocol.stashes_unfinished() && !todos.all_complete() {
        todos.stash_active()
    } else {
        0
    };
    todos.active = protocol.todos();
    events.push(ModeEvent::ProtocolActivated {
        protocol,
        stashed_todos: stashed,
    });

    let document = ctx.storage.protocol_file(protocol.document_name());
    let document = document.display();

    match protocol {
        Protocol::TaskCreation => {
            let phrases = config
                .trigger_phrases
                .get(TriggerCategory::TaskCreation)
                .iter()
                .collect::<Vec<_>>()
                .join(", ");
            context.push_str(&format!(
                "[Task Detection Notice]\nLanguage in the user prompt indicates that the user may want to create a task.\n\n\
                 Assess whether the user has explicitly asked to create a task, often evidenced by one of these trigger phrases: {phrases}\n\n\
                 If it is an explicit task creation request, immediately read {document} and follow the instructions therein to create the task. \
                 If you can't be sure, read the protocol after confirmation from the user.\n\n"
            ));
            if stashed > 0 {
                context.push_str("Your previous todos have been stashed and task creation protocol todos have been made active. They will be restored after the task creation todos are complete.\n\n");
            }
        }
        Protocol::TaskStartup => {
            context.push_str("[Task Startup Notice]\nLanguage in the user prompt indicates that the user may want to start a task. ");
            if let Some(task) = &ctx.referenced_task {
                state.current_task = task.clone();
                if let Some(file) = task.id() {
                    context.push_str(&format!(
                        "A task reference was detected in the user prompt: {file}. This task has been set as the current task. "
                    ));
                    events.push(ModeEvent::TaskLoaded {
                        file: file.to_string(),
                    });
                }
            }
            context.push_str(&format!(
                "If the user wants to begin a task, you *MUST* follow the task startup protocol: {document}\n"
            ));
        }
        Protocol::TaskCompletion => {
            context.push_str(&format!(
                "[Task Completion Notice]\nLanguage in the user prompt indicates that the user may want to complete the current task.\n\n\
                 If you or the user believe the current task is complete, check the current task file and report back on its completion status. \
                 Before completing the task you *MUST* read {document} and follow the instructions therein.\n\n"
            ));
        }
        Protocol::ContextCompaction => {
            context.push_str(&format!(
                "[Context Compaction Notice]\nLanguage in the user prompt indicates that the user may want to compact context. \
                 You *MUST* read {document} and follow the instructions therein to compact context properly.\n"
            ));
            if stashed > 0 {
                context.push_str("Your todos have been stashed and will be restored after the user clears context. Do not update your previous todo list; context compaction todos are now active.\n");
            }
        }
    }
}

fn load_referenced_task(storage: &StorageConfig, prompt: &str) -> Option<TaskState> {
    let caps = RE_TASK_REFERENCE.captures(prompt)?;
    let reference = Path::new(&caps[1]);
    if reference
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        tracing::warn!(reference = %reference.display(), "Task reference escapes the tasks directory");
        return None;
    }
    let tasks_dir = storage.tasks_dir();
    let path = tasks_dir.join(reference);
    match tasks::load_task(&path, &tasks_dir) {
        Ok(task) => Some(task),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Referenced task could not be loaded");
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Context Warnings
// ═══════════════════════════════════════════════════════════════════════════════

/// The warning to raise, if any. Each level fires once until its flag is cleared.
pub fn context_warning(
    config: &SessionsConfig,
    flags: &SessionFlags,
    usage: &ContextUsage,
) -> Option<WarningLevel> {
    if usage.used_tokens == 0 {
        return None;
    }
    let enabled = &config.features.context_warnings;
    if usage.percent >= WarningLevel::Critical.threshold() && enabled.warn_90 && !flags.context_90
    {
        Some(WarningLevel::Critical)
    } else if usage.percent >= WarningLevel::Elevated.threshold()
        && enabled.warn_85
        && !flags.context_85
    {
        Some(WarningLevel::Elevated)
    } else {
        None
    }
}

fn warning_notice(level: WarningLevel, usage: &ContextUsage) -> String {
    let precise = usage.used_tokens as f64 * 100.0 / usage.limit as f64;
    let used = group_thousands(usage.used_tokens);
    let limit = group_thousands(usage.limit);
    match level {
        WarningLevel::Critical => format!(
            "\n[90% WARNING] {used}/{limit} tokens used ({precise:.1}%). CRITICAL: Run sessions/protocols/task-completion.md to wrap up this task cleanly!\n"
        ),
        WarningLevel::Elevated => format!(
            "\n[Warning] Context window is {precise:.1}% full ({used}/{limit} tokens). The danger zone is >90%. \
             Gently guide towards context compaction or task completion (if the task is nearly complete).\n"
        ),
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tool Gating
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolDecision {
    Allow,
    Deny { reason: String },
}

impl ToolDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ToolDecision::Allow)
    }
}

/// Decides whether a tool call may run in the current mode.
pub fn on_tool_use(
    config: &SessionsConfig,
    state: &SessionsState,
    tool_name: &str,
    tool_input: &Value,
) -> ToolDecision {
    if let Some(reason) = state_file_violation(config, tool_name, tool_input) {
        return ToolDecision::Deny { reason };
    }

    if state.mode == Mode::Implementation {
        return ToolDecision::Allow;
    }

    if tool_name == BASH_TOOL {
        let command = bash_command(tool_input);
        let class = classify(command, &config.blocked_actions);
        return if class.permits(config.blocked_actions.extrasafe) {
            ToolDecision::Allow
        } else {
            tracing::debug!(command = %command, class = %class, "Bash command blocked");
            ToolDecision::Deny {
                reason: format!(
                    "[DAIC] Blocked {} Bash command in discussion mode. Switch to implementation mode or explain what you intend to change.",
                    class.as_str().replace('_', "-")
                ),
            }
        };
    }

    if config.blocked_actions.is_tool_blocked(tool_name) {
        return ToolDecision::Deny {
            reason: format!(
                "[DAIC: Tool Blocked] You're in discussion mode. The {tool_name} tool is not allowed. You need to seek alignment first."
            ),
        };
    }

    ToolDecision::Allow
}

fn bash_command(tool_input: &Value) -> &str {
    tool_input
        .get("command")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
}

/// The state document is only written through the store, in any mode.
fn state_file_violation(
    config: &SessionsConfig,
    tool_name: &str,
    tool_input: &Value,
) -> Option<String> {
    let touches_state = if FILE_EDIT_TOOLS.contains(&tool_name) {
        ["file_path", "notebook_path"]
            .iter()
            .filter_map(|key| tool_input.get(*key).and_then(Value::as_str))
            .any(|path| is_state_file(Path::new(path)))
    } else if tool_name == BASH_TOOL {
        let command = bash_command(tool_input);
        command.contains(STATE_FILE_NAME)
            && classify(command, &config.blocked_actions) != CommandClass::ReadOnly
    } else {
        false
    };

    touches_state.then(|| {
        "[Security] Direct modification of sessions-state.json is not allowed. Use the sessions-hook commands instead.".to_string()
    })
}

fn is_state_file(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == STATE_FILE_NAME)
        && path
            .parent()
            .and_then(Path::file_name)
            .is_some_and(|dir| dir == "sessions")
}

// ═══════════════════════════════════════════════════════════════════════════════
// Explicit Switching
// ═══════════════════════════════════════════════════════════════════════════════

/// Returns to discussion mode outside the prompt path. Implementation mode
/// has no counterpart: it is entered through trigger phrases only.
pub fn enter_discussion(store: &Store) -> Result<Option<ModeEvent>> {
    store.edit_state(|state| {
        let from = state.mode;
        state.mode = Mode::Discussion;
        Ok((from != Mode::Discussion).then_some(ModeEvent::ModeChanged {
            from,
            to: Mode::Discussion,
        }))
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session Start
// ═══════════════════════════════════════════════════════════════════════════════

/// What a fresh context window starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStart {
    pub cleared_todos: usize,
    /// Todos brought back from the stash slot.
    pub restored: Vec<Todo>,
    pub context: String,
}

/// Handles a new session: one load of config, one state edit.
pub fn on_session_start(store: &Store) -> Result<SessionStart> {
    let config = store.load_config();
    store.edit_state(|state| Ok(start_session(&config, state)))
}

/// Resets per-session flags, drops the previous window's active todos and
/// brings back anything stashed by a protocol.
pub fn start_session(config: &SessionsConfig, state: &mut SessionsState) -> SessionStart {
    state.flags.clear_session_flags();
    let cleared_todos = state.todos.clear_active();
    let restored = match state.todos.restore_stashed() {
        0 => Vec::new(),
        _ => state.todos.active.clone(),
    };

    let mut context = format!(
        "You are beginning a new context window with the developer, {}.\n\n\
         Cleared session flags and active todos for new session.\n\n",
        config.environment.developer_name
    );
    if !restored.is_empty() {
        context.push_str(&format!(
            "Restored {} stashed todos from previous session:\n",
            restored.len()
        ));
        for todo in &restored {
            context.push_str(&format!("- {}\n", todo.content));
        }
        context.push('\n');
    }
    match state.current_task.id() {
        Some(task) => context.push_str(&format!(
            "Current task: {task}. Review the Work Log at the end of the task file and continue the task.\n"
        )),
        None => context.push_str("No active task set.\n"),
    }

    tracing::info!(
        cleared_todos,
        restored_todos = restored.len(),
        "Session started"
    );
    SessionStart {
        cleared_todos,
        restored,
        context,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Todo, TodoStatus};
    use crate::telemetry::DEFAULT_CONTEXT_LIMIT;
    use serde_json::json;
    use std::path::PathBuf;

    fn storage() -> StorageConfig {
        StorageConfig::with_root(PathBuf::from("/project"))
    }

    fn evaluate(config: &SessionsConfig, state: &mut SessionsState, prompt: &str) -> PromptOutcome {
        let storage = storage();
        let ctx = PromptContext {
            prompt,
            usage: None,
            referenced_task: None,
            storage: &storage,
        };
        evaluate_prompt(config, state, &ctx)
    }

    fn in_mode(mode: Mode) -> SessionsState {
        SessionsState {
            mode,
            ..SessionsState::default()
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // next_mode
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_implementation_phrase_yields_implementation() {
        assert_eq!(
            next_mode(Mode::Discussion, TriggerCategory::ImplementationMode),
            Mode::Implementation
        );
    }

    #[test]
    fn test_discussion_phrase_yields_discussion() {
        assert_eq!(
            next_mode(Mode::Implementation, TriggerCategory::DiscussionMode),
            Mode::Discussion
        );
    }

    #[test]
    fn test_protocol_phrases_keep_mode() {
        for category in [
            TriggerCategory::TaskCreation,
            TriggerCategory::TaskStartup,
            TriggerCategory::TaskCompletion,
            TriggerCategory::ContextCompaction,
        ] {
            assert_eq!(next_mode(Mode::Discussion, category), Mode::Discussion);
            assert_eq!(next_mode(Mode::Implementation, category), Mode::Implementation);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Prompt evaluation
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_trigger_switches_to_implementation() {
        let config = SessionsConfig::default();
        let mut state = SessionsState::default();
        let outcome = evaluate(&config, &mut state, "looks good, yert");

        assert_eq!(outcome.mode, Mode::Implementation);
        assert_eq!(state.mode, Mode::Implementation);
        assert!(outcome.mode_changed());
        assert!(outcome.context.contains("Implementation Mode Activated"));
    }

    #[test]
    fn test_discussion_wins_when_both_present() {
        let config = SessionsConfig::default();
        let mut state = SessionsState::default();
        let outcome = evaluate(&config, &mut state, "yert no wait SILENCE");

        assert_eq!(outcome.mode, Mode::Discussion);
        assert!(!outcome.mode_changed());
        assert!(outcome.context.contains("EMERGENCY STOP"));
    }

    #[test]
    fn test_emergency_stop_clears_active_todos() {
        let config = SessionsConfig::default();
        let mut state = in_mode(Mode::Implementation);
        state.todos.active = vec![Todo::pending("a", "doing a"), Todo::pending("b", "doing b")];

        let outcome = evaluate(&config, &mut state, "SILENCE");
        assert!(state.todos.active.is_empty());
        assert_eq!(
            outcome.events,
            vec![
                ModeEvent::ModeChanged {
                    from: Mode::Implementation,
                    to: Mode::Discussion
                },
                ModeEvent::EmergencyStop { cleared_todos: 2 }
            ]
        );
    }

    #[test]
    fn test_implementation_phrase_in_implementation_is_quiet() {
        let config = SessionsConfig::default();
        let mut state = in_mode(Mode::Implementation);
        let outcome = evaluate(&config, &mut state, "yert");
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.context, ULTRATHINK_PREFIX);
    }

    #[test]
    fn test_add_trigger_command_skips_detection_and_ultrathink() {
        let config = SessionsConfig::default();
        let mut state = SessionsState::default();
        let outcome = evaluate(&config, &mut state, "/add-trigger go yert");
        assert_eq!(state.mode, Mode::Discussion);
        assert!(outcome.events.is_empty());
        assert!(outcome.context.is_empty());
    }

    #[test]
    fn test_ultrathink_can_be_disabled() {
        let mut config = SessionsConfig::default();
        config.features.auto_ultrathink = false;
        let mut state = SessionsState::default();
        assert!(evaluate(&config, &mut state, "hello").context.is_empty());
    }

    #[test]
    fn test_no_match_is_no_transition() {
        let config = SessionsConfig::default();
        let mut state = SessionsState::default();
        let outcome = evaluate(&config, &mut state, "what does this function do?");
        assert_eq!(outcome.mode, Mode::Discussion);
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn test_protocol_loads_todos_without_mode_change() {
        let config = SessionsConfig::default();
        let mut state = SessionsState::default();
        let outcome = evaluate(&config, &mut state, "mek: a login fix");

        assert_eq!(state.mode, Mode::Discussion);
        assert_eq!(state.todos.active, Protocol::TaskCreation.todos());
        assert_eq!(
            outcome.events,
            vec![ModeEvent::ProtocolActivated {
                protocol: Protocol::TaskCreation,
                stashed_todos: 0
            }]
        );
        assert!(outcome
            .context
            .contains("/project/sessions/protocols/task-creation.md"));
    }

    #[test]
    fn test_task_creation_stashes_unfinished_todos() {
        let config = SessionsConfig::default();
        let mut state = SessionsState::default();
        state.todos.active = vec![Todo::pending("mine", "doing mine")];

        let outcome = evaluate(&config, &mut state, "mek: something");
        assert_eq!(state.todos.stashed[0].content, "mine");
        assert!(outcome.context.contains("stashed"));
    }

    #[test]
    fn test_task_completion_replaces_todos() {
        let config = SessionsConfig::default();
        let mut state = SessionsState::default();
        state.todos.active = vec![Todo::pending("mine", "doing mine")];

        evaluate(&config, &mut state, "finito");
        assert!(state.todos.stashed.is_empty());
        assert_eq!(state.todos.active, Protocol::TaskCompletion.todos());
    }

    #[test]
    fn test_completed_todos_are_not_stashed() {
        let config = SessionsConfig::default();
        let mut state = SessionsState::default();
        let mut done = Todo::pending("done", "doing done");
        done.status = TodoStatus::Completed;
        state.todos.active = vec![done];

        evaluate(&config, &mut state, "squish");
        assert!(state.todos.stashed.is_empty());
    }

    #[test]
    fn test_task_startup_sets_referenced_task() {
        let config = SessionsConfig::default();
        let mut state = SessionsState::default();
        let storage = storage();
        let task = TaskState {
            name: Some("h-fix".to_string()),
            file: Some("h-fix.md".to_string()),
            ..TaskState::default()
        };
        let ctx = PromptContext {
            prompt: "start^: @sessions/tasks/h-fix.md",
            usage: None,
            referenced_task: Some(task.clone()),
            storage: &storage,
        };

        let outcome = evaluate_prompt(&config, &mut state, &ctx);
        assert_eq!(state.current_task, task);
        assert!(outcome.events.contains(&ModeEvent::TaskLoaded {
            file: "h-fix.md".to_string()
        }));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Context warnings
    // ─────────────────────────────────────────────────────────────────────

    fn prompt_with_usage(state: &mut SessionsState, used: u64) -> PromptOutcome {
        let storage = storage();
        let ctx = PromptContext {
            prompt: "hello",
            usage: Some(ContextUsage::new(used, DEFAULT_CONTEXT_LIMIT)),
            referenced_task: None,
            storage: &storage,
        };
        evaluate_prompt(&SessionsConfig::default(), state, &ctx)
    }

    #[test]
    fn test_elevated_warning_fires_once() {
        let mut state = SessionsState::default();
        let first = prompt_with_usage(&mut state, 137_500);
        assert!(first
            .context
            .contains("[Warning] Context window is 85.9% full (137,500/160,000 tokens)"));
        assert!(state.flags.context_85);

        let second = prompt_with_usage(&mut state, 138_000);
        assert!(second.events.is_empty());
    }

    #[test]
    fn test_critical_warning_preempts_elevated() {
        let mut state = SessionsState::default();
        let outcome = prompt_with_usage(&mut state, 150_000);
        assert!(outcome.context.contains("[90% WARNING]"));
        assert!(state.flags.context_90);
        assert!(!state.flags.context_85);
        assert_eq!(outcome.events.len(), 1);
    }

    #[test]
    fn test_below_threshold_is_silent() {
        let mut state = SessionsState::default();
        assert!(prompt_with_usage(&mut state, 100_000).events.is_empty());
    }

    #[test]
    fn test_disabled_warning_is_silent() {
        let mut config = SessionsConfig::default();
        config.features.context_warnings.warn_90 = false;
        config.features.context_warnings.warn_85 = false;
        let usage = ContextUsage::new(155_000, DEFAULT_CONTEXT_LIMIT);
        assert_eq!(
            context_warning(&config, &SessionFlags::default(), &usage),
            None
        );
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(160_000), "160,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tool gating
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_blocked_tool_denied_in_discussion() {
        let config = SessionsConfig::default();
        let decision = on_tool_use(
            &config,
            &in_mode(Mode::Discussion),
            "Write",
            &json!({"file_path": "/project/src/main.rs", "content": ""}),
        );
        assert!(
            matches!(decision, ToolDecision::Deny { ref reason } if reason.contains("The Write tool is not allowed"))
        );
    }

    #[test]
    fn test_unblocked_tool_allowed_in_discussion() {
        let config = SessionsConfig::default();
        let decision = on_tool_use(
            &config,
            &in_mode(Mode::Discussion),
            "Read",
            &json!({"file_path": "/project/src/main.rs"}),
        );
        assert_eq!(decision, ToolDecision::Allow);
    }

    #[test]
    fn test_everything_allowed_in_implementation() {
        let config = SessionsConfig::default();
        let state = in_mode(Mode::Implementation);
        assert!(on_tool_use(&config, &state, "Write", &json!({"file_path": "a.rs"})).is_allowed());
        assert!(on_tool_use(&config, &state, "Bash", &json!({"command": "rm -rf target"})).is_allowed());
    }

    #[test]
    fn test_bash_gated_by_classifier() {
        let config = SessionsConfig::default();
        let state = in_mode(Mode::Discussion);
        assert!(on_tool_use(&config, &state, "Bash", &json!({"command": "git status"})).is_allowed());
        assert!(!on_tool_use(&config, &state, "Bash", &json!({"command": "rm -rf target"})).is_allowed());
        assert!(on_tool_use(&config, &state, "Bash", &json!({"command": "cargo test"})).is_allowed());
    }

    #[test]
    fn test_extrasafe_denies_unrecognized_bash() {
        let mut config = SessionsConfig::default();
        config.blocked_actions.extrasafe = true;
        let state = in_mode(Mode::Discussion);
        assert!(!on_tool_use(&config, &state, "Bash", &json!({"command": "cargo test"})).is_allowed());
    }

    #[test]
    fn test_bash_without_command_is_allowed() {
        let config = SessionsConfig::default();
        let state = in_mode(Mode::Discussion);
        assert!(on_tool_use(&config, &state, "Bash", &json!({})).is_allowed());
    }

    #[test]
    fn test_state_file_protected_in_any_mode() {
        let config = SessionsConfig::default();
        let state = in_mode(Mode::Implementation);
        let edit = on_tool_use(
            &config,
            &state,
            "Edit",
            &json!({"file_path": "/project/sessions/sessions-state.json"}),
        );
        assert!(!edit.is_allowed());

        let bash = on_tool_use(
            &config,
            &state,
            "Bash",
            &json!({"command": "echo '{}' > sessions/sessions-state.json"}),
        );
        assert!(!bash.is_allowed());

        let read = on_tool_use(
            &config,
            &state,
            "Bash",
            &json!({"command": "cat sessions/sessions-state.json"}),
        );
        assert!(read.is_allowed());
    }
    // ─────────────────────────────────────────────────────────────────────
    // Session start
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn test_session_start_rearms_context_warnings() {
        let mut state = SessionsState::default();
        assert!(!prompt_with_usage(&mut state, 140_000).events.is_empty());
        assert!(prompt_with_usage(&mut state, 140_000).events.is_empty());

        start_session(&SessionsConfig::default(), &mut state);
        assert!(!state.flags.context_85);
        assert!(!prompt_with_usage(&mut state, 140_000).events.is_empty());
    }

    #[test]
    fn test_session_start_restores_stash() {
        let mut state = SessionsState::default();
        state.todos.active = vec![Todo::pending("own work", "doing own work")];
        evaluate(&SessionsConfig::default(), &mut state, "squish");
        assert_eq!(state.todos.stashed.len(), 1);

        let start = start_session(&SessionsConfig::default(), &mut state);
        assert_eq!(start.cleared_todos, Protocol::ContextCompaction.todos().len());
        assert_eq!(start.restored, vec![Todo::pending("own work", "doing own work")]);
        assert_eq!(state.todos.active, start.restored);
        assert!(state.todos.stashed.is_empty());
        assert!(start
            .context
            .contains("Restored 1 stashed todos from previous session:\n- own work\n"));
    }

    #[test]
    fn test_session_start_without_stash() {
        let mut state = in_mode(Mode::Implementation);
        state.current_task.name = Some("m-fix-login".to_string());
        let start = start_session(&SessionsConfig::default(), &mut state);

        assert!(start.restored.is_empty());
        assert!(start.context.contains("Current task: m-fix-login."));
        assert!(start.context.starts_with(
            "You are beginning a new context window with the developer, the developer."
        ));
        assert_eq!(state.mode, Mode::Implementation);
    }

    #[test]
    fn test_task_reference_outside_tasks_dir_is_ignored() {
        let temp = tempfile::TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        std::fs::create_dir_all(storage.tasks_dir()).unwrap();
        std::fs::write(
            temp.path().join("secret.md"),
            "---\nname: secret\n---\n",
        )
        .unwrap();

        let escaped = load_referenced_task(&storage, "start^: @sessions/tasks/../../secret.md");
        assert!(escaped.is_none());
    }
}
