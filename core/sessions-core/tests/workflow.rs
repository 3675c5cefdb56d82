//! End-to-end flows across the store, mode machine, classifier and task scan.

use serde_json::json;
use sessions_core::mode::{self, on_tool_use, PromptInput};
use sessions_core::{
    classify, tasks, BlockedActions, CommandClass, Mode, ModeEvent, Protocol, StatusInput,
    StatusReport, StorageConfig, Store, Todo, ToolDecision,
};
use tempfile::TempDir;

fn project() -> (TempDir, Store) {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join(".claude")).unwrap();
    let store = Store::new(StorageConfig::with_root(temp.path().to_path_buf()));
    (temp, store)
}

fn prompt(store: &Store, text: &str) -> sessions_core::PromptOutcome {
    mode::on_user_message(
        store,
        &PromptInput {
            prompt: text,
            ..Default::default()
        },
    )
    .unwrap()
}

fn tool(store: &Store, name: &str, input: serde_json::Value) -> ToolDecision {
    on_tool_use(&store.load_config(), &store.load_state(), name, &input)
}

#[test]
fn test_yert_silence_then_write_is_denied() {
    let (_temp, store) = project();
    std::fs::create_dir_all(store.storage().sessions_dir()).unwrap();
    std::fs::write(store.storage().state_file(), "").unwrap();

    let go = prompt(&store, "yert");
    assert_eq!(go.mode, Mode::Implementation);
    assert_eq!(store.load_state().mode, Mode::Implementation);
    assert!(tool(&store, "Write", json!({"file_path": "src/lib.rs"})).is_allowed());

    let stop = prompt(&store, "SILENCE");
    assert_eq!(stop.mode, Mode::Discussion);
    assert_eq!(store.load_state().mode, Mode::Discussion);

    let decision = tool(&store, "Write", json!({"file_path": "src/lib.rs"}));
    assert!(matches!(decision, ToolDecision::Deny { .. }));
}

#[test]
fn test_bash_gating_follows_mode_and_extrasafe() {
    let (_temp, store) = project();

    assert!(tool(&store, "Bash", json!({"command": "ls -la"})).is_allowed());
    assert!(!tool(&store, "Bash", json!({"command": "touch x"})).is_allowed());
    assert!(tool(&store, "Bash", json!({"command": "python build.py"})).is_allowed());

    store
        .edit_config(|config| {
            config.blocked_actions.extrasafe = true;
            Ok(())
        })
        .unwrap();
    assert!(!tool(&store, "Bash", json!({"command": "python build.py"})).is_allowed());

    prompt(&store, "yert");
    assert!(tool(&store, "Bash", json!({"command": "python build.py"})).is_allowed());
}

#[test]
fn test_user_write_override_beats_builtin_read() {
    let blocked = BlockedActions {
        bash_write_patterns: vec!["grep".to_string()],
        bash_read_patterns: vec!["grep".to_string()],
        ..BlockedActions::default()
    };
    assert_eq!(classify("grep -r TODO src", &blocked), CommandClass::WriteLike);
}

#[test]
fn test_custom_phrase_added_through_store_is_honored() {
    let (_temp, store) = project();
    store
        .edit_config(|config| {
            config.trigger_phrases.implementation_mode.add("make it so");
            Ok(())
        })
        .unwrap();

    assert_eq!(prompt(&store, "ok, make it so").mode, Mode::Implementation);
}

#[test]
fn test_task_startup_loads_referenced_task() {
    let (_temp, store) = project();
    let tasks_dir = store.storage().tasks_dir();
    std::fs::create_dir_all(&tasks_dir).unwrap();
    std::fs::write(
        tasks_dir.join("h-fix-auth.md"),
        "---\nname: h-fix-auth\nbranch: fix/auth\nstatus: pending\n---\n# Fix auth\n",
    )
    .unwrap();

    let outcome = prompt(&store, "start^: @sessions/tasks/h-fix-auth.md");
    assert!(outcome.events.contains(&ModeEvent::ProtocolActivated {
        protocol: Protocol::TaskStartup,
        stashed_todos: 0
    }));

    let state = store.load_state();
    assert_eq!(state.current_task.name.as_deref(), Some("h-fix-auth"));
    assert_eq!(state.current_task.branch.as_deref(), Some("fix/auth"));
    assert_eq!(state.todos.active, Protocol::TaskStartup.todos());
    assert_eq!(state.mode, Mode::Discussion);
}

#[test]
fn test_unreadable_task_reference_leaves_task_unchanged() {
    let (_temp, store) = project();
    let outcome = prompt(&store, "start^: @sessions/tasks/missing.md");

    assert!(!outcome
        .events
        .iter()
        .any(|e| matches!(e, ModeEvent::TaskLoaded { .. })));
    assert!(!store.load_state().current_task.is_active());
}

#[test]
fn test_context_warning_persists_flag() {
    let (temp, store) = project();
    let transcript = temp.path().join("transcript.jsonl");
    std::fs::write(
        &transcript,
        r#"{"timestamp":"2025-03-01T10:00:00Z","message":{"usage":{"input_tokens":150000}}}"#,
    )
    .unwrap();

    let input = PromptInput {
        prompt: "how are we doing",
        transcript_path: Some(&transcript),
        model: None,
    };
    let first = mode::on_user_message(&store, &input).unwrap();
    assert!(first.context.contains("[90% WARNING]"));
    assert!(store.load_state().flags.context_90);

    let second = mode::on_user_message(&store, &input).unwrap();
    assert!(!second.context.contains("[90% WARNING]"));
}

#[test]
fn test_session_start_rearms_warnings_and_restores_stash() {
    let (temp, store) = project();
    let transcript = temp.path().join("transcript.jsonl");
    std::fs::write(
        &transcript,
        r#"{"timestamp":"2025-03-01T10:00:00Z","message":{"usage":{"input_tokens":140000}}}"#,
    )
    .unwrap();
    let input = PromptInput {
        prompt: "keep going",
        transcript_path: Some(&transcript),
        model: None,
    };

    assert!(mode::on_user_message(&store, &input)
        .unwrap()
        .context
        .contains("[Warning] Context window is 87.5% full"));
    assert!(!mode::on_user_message(&store, &input)
        .unwrap()
        .context
        .contains("[Warning]"));

    store
        .edit_state(|state| {
            state.todos.active = vec![Todo::pending("wire parser", "wiring parser")];
            Ok(())
        })
        .unwrap();
    prompt(&store, "squish");
    assert_eq!(store.load_state().todos.stashed.len(), 1);

    let start = mode::on_session_start(&store).unwrap();
    assert_eq!(start.restored, vec![Todo::pending("wire parser", "wiring parser")]);
    let state = store.load_state();
    assert_eq!(state.todos.active, start.restored);
    assert!(state.todos.stashed.is_empty());
    assert!(!state.flags.context_85);

    assert!(mode::on_user_message(&store, &input)
        .unwrap()
        .context
        .contains("[Warning] Context window is 87.5% full"));
}

#[test]
fn test_enter_discussion_reports_change_once() {
    let (_temp, store) = project();
    prompt(&store, "yert");

    assert!(mode::enter_discussion(&store).unwrap().is_some());
    assert!(mode::enter_discussion(&store).unwrap().is_none());
    assert_eq!(store.load_state().mode, Mode::Discussion);
}

#[test]
fn test_open_task_count() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    std::fs::write(dir.join("a.md"), "---\nname: a\nstatus: done\n---\n").unwrap();
    std::fs::write(dir.join("b.md"), "---\nname: b\nStatus: Completed\n---\n").unwrap();
    std::fs::write(dir.join("c.md"), "# No status marker\n").unwrap();

    assert_eq!(tasks::count_open(dir), 1);
}

#[test]
fn test_status_report_reflects_state() {
    let (_temp, store) = project();
    let tasks_dir = store.storage().tasks_dir();
    std::fs::create_dir_all(&tasks_dir).unwrap();
    std::fs::write(tasks_dir.join("m-one.md"), "status: pending").unwrap();
    std::fs::write(tasks_dir.join("m-two.md"), "status: in-progress").unwrap();
    prompt(&store, "yert");

    let report = StatusReport::collect(&store, &StatusInput::default());
    assert_eq!(report.mode, Mode::Implementation);
    assert_eq!(report.open_tasks, 2);
    assert!(report.to_string().contains("DAIC: Implementation"));
}
