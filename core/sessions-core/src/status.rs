//! Statusline report: context usage, mode, current task, edited files and
//! open tasks, gathered fresh on every render.

use std::fmt;
use std::path::Path;

use crate::git;
use crate::state::{Mode, Store};
use crate::tasks;
use crate::telemetry::{self, ContextUsage};

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusInput<'a> {
    pub transcript_path: Option<&'a Path>,
    pub model: Option<&'a str>,
    /// Directory for the git query. Defaults to the project root.
    pub workspace_dir: Option<&'a Path>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub usage: ContextUsage,
    pub mode: Mode,
    pub task: Option<String>,
    pub modified_files: usize,
    pub open_tasks: usize,
    pub nerd_fonts: bool,
}

impl StatusReport {
    pub fn collect(store: &Store, input: &StatusInput<'_>) -> Self {
        let config = store.load_config();
        let state = store.load_state();
        let storage = store.storage();

        let workspace = input.workspace_dir.unwrap_or_else(|| storage.root());

        Self {
            usage: telemetry::compute(input.transcript_path, input.model),
            mode: state.mode,
            task: state
                .current_task
                .name
                .clone()
                .or_else(|| state.current_task.id().map(str::to_string)),
            modified_files: git::count_modified_files(workspace),
            open_tasks: tasks::count_open(&storage.tasks_dir()),
            nerd_fonts: config.features.use_nerd_fonts,
        }
    }
}

/// Token counts in whole thousands, e.g. `17k`.
fn kilo(tokens: u64) -> String {
    format!("{}k", tokens / 1000)
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Discussion => "Discussion",
            Mode::Implementation => "Implementation",
        };
        let edit_icon = if self.nerd_fonts { "✎" } else { "*" };

        writeln!(
            f,
            "{} {}/{} ({}%)",
            self.usage.bar.render(self.nerd_fonts),
            kilo(self.usage.used_tokens),
            kilo(self.usage.limit),
            self.usage.percent
        )?;
        write!(
            f,
            "DAIC: {} | Task: {} | {} {} files | [{} open]",
            mode,
            self.task.as_deref().unwrap_or("None"),
            edit_icon,
            self.modified_files,
            self.open_tasks
        )
    }
}
