//! Compiled regex patterns for task files and prompts.
//!
//! Compiled once on first use. Update these when the task file template
//! changes.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Task File Regexes
// ═══════════════════════════════════════════════════════════════════════════════

/// A `status: <value>` marker line, matched case-insensitively anywhere in the file.
pub static RE_STATUS_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*status[ \t]*:[ \t]*([^\r\n]*?)[ \t]*\r?$").unwrap());

/// Leading `---` delimited frontmatter block.
pub static RE_FRONTMATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---[ \t]*\r?\n(.*?)\r?\n---").unwrap());

// ═══════════════════════════════════════════════════════════════════════════════
// Prompt Regexes
// ═══════════════════════════════════════════════════════════════════════════════

/// `@path/to/sessions/tasks/<file>.md` mention; captures the tasks-relative file.
pub static RE_TASK_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)@\S*?sessions/tasks/(\S+\.md)(?:\s|$)").unwrap());
