//! Shell command classification for Bash gating in discussion mode.
//!
//! A command line is split on unquoted `|`, `||`, `&&`, `&`, `;` and
//! newlines. Each segment is classified on its own and the results combine
//! pessimistically: one write-like segment makes the whole command
//! write-like; otherwise one unrecognized segment makes it unrecognized.
//!
//! Per segment, first match wins:
//!
//! 1. unquoted output redirection to anything but `/dev/null` → write-like
//!    (command substitutions are classified recursively and folded in)
//! 2. user write-like prefix → write-like
//! 3. built-in write-like command → write-like
//! 4. user read-only prefix → read-only
//! 5. built-in read-only command → read-only
//! 6. otherwise → unrecognized

use std::fmt;

use crate::config::BlockedActions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandClass {
    ReadOnly,
    WriteLike,
    Unrecognized,
}

impl CommandClass {
    /// Whether discussion mode lets a command of this class run.
    pub fn permits(self, extrasafe: bool) -> bool {
        match self {
            CommandClass::ReadOnly => true,
            CommandClass::WriteLike => false,
            CommandClass::Unrecognized => !extrasafe,
        }
    }

    fn combine(self, other: CommandClass) -> CommandClass {
        use CommandClass::*;
        match (self, other) {
            (WriteLike, _) | (_, WriteLike) => WriteLike,
            (Unrecognized, _) | (_, Unrecognized) => Unrecognized,
            _ => ReadOnly,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommandClass::ReadOnly => "read_only",
            CommandClass::WriteLike => "write_like",
            CommandClass::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for CommandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Built-in Command Sets
// ═══════════════════════════════════════════════════════════════════════════════

const READ_ONLY_COMMANDS: &[&str] = &[
    "cat", "less", "more", "grep", "egrep", "fgrep", "rg", "head", "tail", "sort", "uniq", "cut",
    "awk", "sed", "wc", "printf", "echo", "pwd", "ls", "find", "which", "type", "env", "printenv",
    "whoami", "date", "df", "du", "stat", "basename", "dirname", "diff", "tree", "realpath",
    "readlink", "file", "ps", "top", "uptime", "cal", "comm", "cmp", "md5sum", "sha256sum", "jq",
    "cd", "true", "false", "test", "id", "uname", "hostname",
];

const READ_ONLY_SUBCOMMANDS: &[(&str, &str)] = &[
    ("git", "status"),
    ("git", "log"),
    ("git", "diff"),
    ("git", "show"),
    ("git", "describe"),
    ("git", "rev-parse"),
    ("git", "blame"),
    ("git", "ls-files"),
    ("docker", "ps"),
    ("docker", "images"),
    ("docker", "logs"),
    ("npm", "list"),
    ("npm", "ls"),
    ("pip", "list"),
    ("pip", "show"),
    ("yarn", "list"),
    ("cargo", "tree"),
    // The workflow's own API stays usable while discussing.
    ("sessions-hook", "state"),
    ("sessions-hook", "mode"),
    ("sessions-hook", "phrases"),
];

const WRITE_COMMANDS: &[&str] = &[
    "rm", "mv", "cp", "chmod", "chown", "chgrp", "mkdir", "rmdir", "ln", "install", "tee",
    "truncate", "touch", "chattr", "setfacl", "dd", "shred", "patch", "sudo", "kill", "pkill",
    "killall", "systemctl", "service", "apt", "apt-get", "yum", "dnf", "make", "cmake",
];

const WRITE_SUBCOMMANDS: &[(&str, &str)] = &[
    ("git", "add"),
    ("git", "commit"),
    ("git", "push"),
    ("git", "pull"),
    ("git", "merge"),
    ("git", "rebase"),
    ("git", "reset"),
    ("git", "checkout"),
    ("git", "switch"),
    ("git", "restore"),
    ("git", "stash"),
    ("git", "rm"),
    ("git", "mv"),
    ("git", "clean"),
    ("git", "tag"),
    ("git", "cherry-pick"),
    ("git", "revert"),
    ("git", "apply"),
    ("npm", "install"),
    ("npm", "uninstall"),
    ("npm", "ci"),
    ("npm", "publish"),
    ("pip", "install"),
    ("pip", "uninstall"),
    ("yarn", "add"),
    ("yarn", "remove"),
    ("yarn", "install"),
    ("cargo", "install"),
    ("cargo", "publish"),
];

// ═══════════════════════════════════════════════════════════════════════════════
// Classification
// ═══════════════════════════════════════════════════════════════════════════════

/// Classifies a shell command line against the built-in sets and the user's
/// configured prefixes. An empty command is read-only.
pub fn classify(command: &str, blocked: &BlockedActions) -> CommandClass {
    split_segments(command)
        .iter()
        .filter(|segment| !segment.text.trim().is_empty() || segment.writes_output)
        .map(|segment| classify_segment(segment, blocked))
        .fold(CommandClass::ReadOnly, CommandClass::combine)
}

fn classify_segment(segment: &Segment, blocked: &BlockedActions) -> CommandClass {
    if segment.writes_output {
        return CommandClass::WriteLike;
    }
    segment
        .substitutions
        .iter()
        .map(|inner| classify(inner, blocked))
        .fold(classify_words(segment, blocked), CommandClass::combine)
}

fn classify_words(segment: &Segment, blocked: &BlockedActions) -> CommandClass {

    let Some(words) = shlex::split(&segment.text) else {
        return CommandClass::Unrecognized;
    };
    let words = strip_wrappers(&words);
    let Some(first) = words.first() else {
        // Bare assignments.
        return CommandClass::ReadOnly;
    };

    let executable = executable_name(first);
    let subcommand = words.get(1).map(String::as_str);
    let normalized = std::iter::once(executable.as_str())
        .chain(words[1..].iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");

    if matches_any_prefix(&normalized, &blocked.bash_write_patterns) {
        return CommandClass::WriteLike;
    }
    if is_builtin_write(&executable, subcommand, &words[1..]) {
        return CommandClass::WriteLike;
    }
    if matches_any_prefix(&normalized, &blocked.bash_read_patterns) {
        return CommandClass::ReadOnly;
    }
    if is_builtin_read(&executable, subcommand, &words[1..]) {
        return CommandClass::ReadOnly;
    }
    CommandClass::Unrecognized
}

fn is_builtin_write(executable: &str, subcommand: Option<&str>, args: &[String]) -> bool {
    if WRITE_COMMANDS.contains(&executable) {
        return true;
    }
    if let Some(sub) = subcommand {
        if WRITE_SUBCOMMANDS.contains(&(executable, sub)) {
            return true;
        }
    }
    // Read-only tools with writing flags.
    match executable {
        "sed" => args
            .iter()
            .any(|a| a.starts_with("--in-place") || has_short_flag(a, 'i', "efl")),
        "perl" => args.iter().any(|a| has_short_flag(a, 'i', "eEIMmxCdDl0")),
        "find" => args.iter().any(|a| {
            matches!(a.as_str(), "-delete" | "-exec" | "-execdir" | "-ok" | "-okdir")
                || a.starts_with("-fprint")
                || a == "-fls"
        }),
        "sort" => args
            .iter()
            .any(|a| a.starts_with("--output") || has_short_flag(a, 'o', "kStT")),
        "git" => matches!(subcommand, Some("branch") | Some("remote")) && !is_git_listing(args),
        _ => false,
    }
}

fn is_builtin_read(executable: &str, subcommand: Option<&str>, args: &[String]) -> bool {
    READ_ONLY_COMMANDS.contains(&executable)
        || subcommand.is_some_and(|sub| READ_ONLY_SUBCOMMANDS.contains(&(executable, sub)))
        || (executable == "git"
            && matches!(subcommand, Some("branch") | Some("remote"))
            && is_git_listing(args))
}

/// `flag` appears in a short-option cluster (`-Ei`, `-no`) before any
/// option in `takes_value`, whose value would swallow the rest.
fn has_short_flag(arg: &str, flag: char, takes_value: &str) -> bool {
    let Some(cluster) = arg.strip_prefix('-') else {
        return false;
    };
    if cluster.starts_with('-') {
        return false;
    }
    for c in cluster.chars() {
        if c == flag {
            return true;
        }
        if takes_value.contains(c) {
            return false;
        }
    }
    false
}

/// `git branch` / `git remote` invocations that only list. `args` starts
/// at the subcommand.
fn is_git_listing(args: &[String]) -> bool {
    let Some((sub, rest)) = args.split_first() else {
        return false;
    };
    match sub.as_str() {
        "branch" => {
            const LISTING: &[&str] = &[
                "-a", "--all", "-r", "--remotes", "-v", "-vv", "--verbose", "--show-current",
                "--no-color", "--color",
            ];
            let listing_mode = rest.iter().any(|a| a == "--list" || a == "-l");
            rest.iter().all(|a| {
                LISTING.contains(&a.as_str())
                    || a == "--list"
                    || a == "-l"
                    || (listing_mode && !a.starts_with('-'))
            })
        }
        "remote" => match rest.first().map(String::as_str) {
            None => true,
            Some("-v") | Some("--verbose") => rest.len() == 1,
            Some("show") | Some("get-url") => true,
            _ => false,
        },
        _ => false,
    }
}

/// Drops leading `VAR=value` assignments and `env`/`time` wrappers so the
/// wrapped command is what gets classified.
fn strip_wrappers(words: &[String]) -> &[String] {
    let mut rest = words;
    loop {
        let before = rest.len();
        while rest.first().is_some_and(|w| is_assignment(w)) {
            rest = &rest[1..];
        }
        if let Some(first) = rest.first() {
            let exe = executable_name(first);
            if (exe == "env" || exe == "time") && rest.len() > 1 {
                let mut tail = &rest[1..];
                while tail.first().is_some_and(|w| w.starts_with('-')) {
                    tail = &tail[1..];
                }
                if !tail.is_empty() {
                    rest = tail;
                }
            }
        }
        if rest.len() == before {
            return rest;
        }
    }
}

fn is_assignment(word: &str) -> bool {
    let Some((name, _)) = word.split_once('=') else {
        return false;
    };
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Lowercased file name of the executable token (`/usr/bin/RM` → `rm`).
fn executable_name(word: &str) -> String {
    word.rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or(word)
        .to_ascii_lowercase()
}

/// `prefix` matches when the segment equals it or continues with whitespace.
/// Comparison is ASCII case-insensitive and whitespace-normalized.
fn matches_any_prefix(segment: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        let prefix = prefix.split_whitespace().collect::<Vec<_>>().join(" ");
        if prefix.is_empty() || segment.len() < prefix.len() {
            return false;
        }
        if !segment.is_char_boundary(prefix.len()) {
            return false;
        }
        let (head, tail) = segment.split_at(prefix.len());
        head.eq_ignore_ascii_case(&prefix) && (tail.is_empty() || tail.starts_with(' '))
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Lexing
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Segment {
    text: String,
    /// An unquoted output redirection targets a real file.
    writes_output: bool,
    /// Bodies of `$(...)`, `<(...)` and backtick substitutions.
    substitutions: Vec<String>,
}

const TARGET_TERMINATORS: &[char] = &['|', ';', '&', '<', '>', '(', ')'];

fn split_segments(command: &str) -> Vec<Segment> {
    let chars: Vec<char> = command.chars().collect();
    let mut segments = Vec::new();
    let mut current = Segment::default();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if quote == Some('"') && starts_substitution(&chars, i) {
            i = scan_substitution(&chars, i, &mut current);
            continue;
        }

        if let Some(q) = quote {
            current.text.push(c);
            if c == q {
                quote = None;
            } else if c == '\\' && q == '"' {
                if let Some(&next) = chars.get(i + 1) {
                    current.text.push(next);
                    i += 1;
                }
            }
            i += 1;
            continue;
        }

        if starts_substitution(&chars, i) || (c == '<' && chars.get(i + 1) == Some(&'(')) {
            i = scan_substitution(&chars, i, &mut current);
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.text.push(c);
            }
            '\\' => {
                current.text.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    current.text.push(next);
                    i += 1;
                }
            }
            '|' | ';' | '\n' => {
                segments.push(std::mem::take(&mut current));
                if c == '|' && chars.get(i + 1) == Some(&'|') {
                    i += 1;
                }
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                segments.push(std::mem::take(&mut current));
                i += 1;
            }
            '&' if chars.get(i + 1) != Some(&'>') => {
                segments.push(std::mem::take(&mut current));
            }
            '>' => {
                i = scan_redirect(&chars, i, &mut current);
                continue;
            }
            _ => current.text.push(c),
        }
        i += 1;
    }

    segments.push(current);
    segments
}

fn starts_substitution(chars: &[char], i: usize) -> bool {
    chars[i] == '`' || (chars[i] == '$' && chars.get(i + 1) == Some(&'('))
}

/// Consumes a substitution starting at `chars[start]` (`` ` ``, `$(` or `<(`),
/// recording its body. Returns the index just past its end.
fn scan_substitution(chars: &[char], start: usize, segment: &mut Segment) -> usize {
    let backtick = chars[start] == '`';
    let body_start = if backtick { start + 1 } else { start + 2 };
    let mut end = body_start;

    if backtick {
        while end < chars.len() && chars[end] != '`' {
            end += if chars[end] == '\\' { 2 } else { 1 };
        }
    } else {
        let mut depth = 1;
        let mut quote: Option<char> = None;
        while end < chars.len() {
            let c = chars[end];
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '\'' || c == '"' => quote = Some(c),
                None if c == '(' => depth += 1,
                None if c == ')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                None => {}
            }
            end += 1;
        }
    }

    let end = end.min(chars.len());
    let next = (end + 1).min(chars.len());
    segment
        .substitutions
        .push(chars[body_start..end].iter().collect());
    segment.text.extend(&chars[start..next]);
    next
}

/// Consumes an output redirection starting at `chars[start] == '>'`.
/// Returns the index just past its target.
fn scan_redirect(chars: &[char], start: usize, segment: &mut Segment) -> usize {
    let mut i = start + 1;
    if matches!(chars.get(i), Some('>') | Some('|')) {
        i += 1;
    }

    if chars.get(i) == Some(&'&') {
        if chars
            .get(i + 1)
            .is_some_and(|c| c.is_ascii_digit() || *c == '-')
        {
            // File descriptor duplication: `2>&1`, `>&-`.
            i += 2;
            while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            segment.text.extend(&chars[start..i]);
            return i;
        }
        i += 1;
    }

    while chars.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }

    let mut target = String::new();
    let mut quote: Option<char> = None;
    while let Some(&c) = chars.get(i) {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => target.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c.is_whitespace() || TARGET_TERMINATORS.contains(&c) => break,
            None => target.push(c),
        }
        i += 1;
    }

    if target != "/dev/null" {
        segment.writes_output = true;
    }
    segment.text.extend(&chars[start..i]);
    i
}
