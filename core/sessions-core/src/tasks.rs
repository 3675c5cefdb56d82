//! Task file inspection.
//!
//! Task files are markdown documents under `sessions/tasks/` carrying a
//! `status: <value>` marker. Only the top level of the directory counts;
//! archived tasks in subdirectories such as `done/` are ignored.

use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Result, SessionsError};
use crate::patterns::{RE_FRONTMATTER, RE_STATUS_MARKER};
use crate::state::TaskState;

/// Status values that close a task. Compared case-insensitively.
pub const CLOSED_STATUSES: &[&str] = &["done", "completed"];

const TASK_EXTENSION: &str = "md";

/// Whether a task file's content describes an open task.
///
/// The first status marker decides. A file without one is open.
pub fn is_open(content: &str) -> bool {
    let Some(caps) = RE_STATUS_MARKER.captures(content) else {
        return true;
    };
    let value = caps[1].trim_matches(|c| c == '"' || c == '\'').trim();
    !CLOSED_STATUSES
        .iter()
        .any(|closed| value.eq_ignore_ascii_case(closed))
}

/// Counts open task files directly under `tasks_dir`.
///
/// A missing directory counts as zero; unreadable files are skipped.
pub fn count_open(tasks_dir: &Path) -> usize {
    if !tasks_dir.is_dir() {
        return 0;
    }

    WalkDir::new(tasks_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == TASK_EXTENSION))
        .filter(|e| match fs_err::read_to_string(e.path()) {
            Ok(content) => is_open(&content),
            Err(err) => {
                tracing::debug!(path = %e.path().display(), error = %err, "Skipping unreadable task file");
                false
            }
        })
        .count()
}

/// Loads a task file's frontmatter into a [`TaskState`].
///
/// `file` is recorded relative to `tasks_root` when the task lives under it,
/// otherwise as the bare file name.
pub fn load_task(path: &Path, tasks_root: &Path) -> Result<TaskState> {
    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(SessionsError::TaskNotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(SessionsError::Io {
                context: format!("reading task {}", path.display()),
                source,
            })
        }
    };

    let frontmatter = RE_FRONTMATTER
        .captures(&content)
        .and_then(|c| c.get(1))
        .ok_or_else(|| SessionsError::MalformedTask {
            path: path.to_path_buf(),
            reason: "missing frontmatter".to_string(),
        })?
        .as_str();

    let mut task = parse_frontmatter(frontmatter);
    let relative = path
        .strip_prefix(tasks_root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .or_else(|| path.file_name().map(|n| n.to_string_lossy().to_string()));
    task.file = relative;
    Ok(task)
}

fn parse_frontmatter(frontmatter: &str) -> TaskState {
    let mut task = TaskState::default();
    for line in frontmatter.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        let text = (!value.is_empty()).then(|| value.to_string());
        match key.trim() {
            "name" | "task" => task.name = text,
            "branch" => task.branch = text,
            "status" => task.status = text,
            "created" => task.created = text,
            "started" => task.started = text,
            "updated" => task.updated = text,
            "submodules" => {
                task.submodules = Some(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect(),
                )
            }
            _ => {}
        }
    }
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_open_without_marker() {
        assert!(is_open("# Just a heading\n"));
    }

    #[test]
    fn test_closed_statuses_case_insensitive() {
        assert!(!is_open("status: done"));
        assert!(!is_open("---\nStatus: Completed\n---"));
        assert!(!is_open("STATUS: \"DONE\""));
        assert!(is_open("status: in-progress"));
        assert!(is_open("status: pending"));
    }

    #[test]
    fn test_count_open_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert_eq!(count_open(&temp.path().join("nope")), 0);
    }

    #[test]
    fn test_count_open_ignores_other_extensions_and_subdirs() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        std::fs::write(dir.join("a.md"), "status: open").unwrap();
        std::fs::write(dir.join("notes.txt"), "status: open").unwrap();
        std::fs::create_dir(dir.join("done")).unwrap();
        std::fs::write(dir.join("done").join("old.md"), "status: open").unwrap();

        assert_eq!(count_open(dir), 1);
    }

    #[test]
    fn test_count_open_skips_unreadable_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        std::fs::write(dir.join("open.md"), "status: pending").unwrap();
        std::fs::write(dir.join("garbled.md"), b"status: pending\n\xff\xfe").unwrap();

        assert_eq!(count_open(dir), 1);
    }

    #[test]
    fn test_load_task_frontmatter() {
        let temp = TempDir::new().unwrap();
        let tasks = temp.path().join("tasks");
        std::fs::create_dir_all(tasks.join("m-api")).unwrap();
        let path = tasks.join("m-api").join("README.md");
        std::fs::write(
            &path,
            "---\nname: m-api\nbranch: feature/api\nstatus: pending\ncreated: 2025-01-02\nsubmodules: web, server,\n---\n# Body\n",
        )
        .unwrap();

        let task = load_task(&path, &tasks).unwrap();
        assert_eq!(task.name.as_deref(), Some("m-api"));
        assert_eq!(task.branch.as_deref(), Some("feature/api"));
        assert_eq!(task.status.as_deref(), Some("pending"));
        assert_eq!(task.started, None);
        assert_eq!(task.file.as_deref(), Some("m-api/README.md"));
        assert_eq!(
            task.submodules,
            Some(vec!["web".to_string(), "server".to_string()])
        );
    }

    #[test]
    fn test_load_task_outside_root_uses_file_name() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("loose.md");
        std::fs::write(&path, "---\nname: loose\n---\n").unwrap();

        let task = load_task(&path, &temp.path().join("tasks")).unwrap();
        assert_eq!(task.file.as_deref(), Some("loose.md"));
    }

    #[test]
    fn test_load_task_errors() {
        let temp = TempDir::new().unwrap();
        let missing = load_task(&temp.path().join("x.md"), temp.path()).unwrap_err();
        assert!(matches!(missing, SessionsError::TaskNotFound(_)));

        let path = temp.path().join("bare.md");
        std::fs::write(&path, "# no frontmatter").unwrap();
        let malformed = load_task(&path, temp.path()).unwrap_err();
        assert!(matches!(malformed, SessionsError::MalformedTask { .. }));
    }
}
