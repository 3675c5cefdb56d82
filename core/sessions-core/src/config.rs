//! Configuration document (`sessions/sessions-config.json`).
//!
//! Every struct here is `#[serde(default)]` so documents written by older
//! versions keep loading after a field is added. Enumerated fields accept
//! any string on load and fall back to their default when the value is not
//! recognized; user edits go through the strict `parse` constructors.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionsError};

// ═══════════════════════════════════════════════════════════════════════════════
// Enumerated Fields
// ═══════════════════════════════════════════════════════════════════════════════

/// Declares a closed string enum that serializes as its canonical name and
/// deserializes leniently (unknown → default).
macro_rules! lenient_enum {
    (
        $(#[$meta:meta])*
        $name:ident, field = $field:literal, default = $default:ident,
        { $($variant:ident => $canonical:literal $(| $alias:literal)*),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $canonical),+
                }
            }

            /// Strict parse for user-supplied values.
            pub fn parse(value: &str) -> Result<Self> {
                let normalized = value.trim().to_ascii_lowercase();
                match normalized.as_str() {
                    $($canonical $(| $alias)* => Ok($name::$variant),)+
                    _ => Err(SessionsError::InvalidValue {
                        field: $field,
                        value: value.to_string(),
                        expected: Self::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    }),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::parse(&value).unwrap_or_else(|_| {
                    tracing::warn!(field = $field, value = %value, "Unrecognized value, using default");
                    Self::default()
                })
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.as_str().to_string()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

lenient_enum! {
    /// How changes are staged before a commit.
    StagingPolicy, field = "add_pattern", default = Ask,
    { Ask => "ask", StageAll => "all" | "stage-all" | "stage_all" }
}

lenient_enum! {
    CommitStyle, field = "commit_style", default = Conventional,
    { Detailed => "detailed", Conventional => "conventional", Simple => "simple" }
}

lenient_enum! {
    UserOs, field = "os", default = Linux,
    { Windows => "windows", Linux => "linux", Macos => "macos" | "darwin" | "osx" }
}

lenient_enum! {
    UserShell, field = "shell", default = Bash,
    {
        Bash => "bash",
        Zsh => "zsh",
        Fish => "fish",
        Powershell => "powershell" | "pwsh",
        Cmd => "cmd"
    }
}

impl UserOs {
    /// The OS this binary was built for.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => UserOs::Windows,
            "macos" => UserOs::Macos,
            _ => UserOs::Linux,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sections
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitPreferences {
    pub default_branch: String,
    pub has_submodules: bool,
    pub add_pattern: StagingPolicy,
    pub commit_style: CommitStyle,
    pub auto_merge: bool,
    pub auto_push: bool,
}

impl Default for GitPreferences {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            has_submodules: false,
            add_pattern: StagingPolicy::default(),
            commit_style: CommitStyle::default(),
            auto_merge: false,
            auto_push: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub developer_name: String,
    pub os: UserOs,
    pub shell: UserShell,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            developer_name: "the developer".to_string(),
            os: UserOs::current(),
            shell: UserShell::default(),
        }
    }
}

/// What is gated while in discussion mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockedActions {
    /// Tool names denied outside implementation mode.
    pub implementation_only_tools: Vec<String>,
    /// Extra command prefixes treated as read-only.
    pub bash_read_patterns: Vec<String>,
    /// Extra command prefixes treated as write-like. Checked before any read-only list.
    pub bash_write_patterns: Vec<String>,
    /// Deny commands that match neither list.
    pub extrasafe: bool,
}

impl Default for BlockedActions {
    fn default() -> Self {
        Self {
            implementation_only_tools: ["Edit", "Write", "MultiEdit", "NotebookEdit"]
                .into_iter()
                .map(String::from)
                .collect(),
            bash_read_patterns: Vec::new(),
            bash_write_patterns: Vec::new(),
            extrasafe: false,
        }
    }
}

impl BlockedActions {
    pub fn is_tool_blocked(&self, tool_name: &str) -> bool {
        self.implementation_only_tools
            .iter()
            .any(|tool| tool == tool_name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Trigger Phrases
// ═══════════════════════════════════════════════════════════════════════════════

/// The six phrase sets, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerCategory {
    DiscussionMode,
    ImplementationMode,
    TaskCreation,
    TaskStartup,
    TaskCompletion,
    ContextCompaction,
}

impl TriggerCategory {
    /// Detection priority: the emergency stop outranks everything else.
    pub const PRIORITY: [TriggerCategory; 6] = [
        TriggerCategory::DiscussionMode,
        TriggerCategory::ImplementationMode,
        TriggerCategory::TaskCreation,
        TriggerCategory::TaskStartup,
        TriggerCategory::TaskCompletion,
        TriggerCategory::ContextCompaction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerCategory::DiscussionMode => "discussion_mode",
            TriggerCategory::ImplementationMode => "implementation_mode",
            TriggerCategory::TaskCreation => "task_creation",
            TriggerCategory::TaskStartup => "task_startup",
            TriggerCategory::TaskCompletion => "task_completion",
            TriggerCategory::ContextCompaction => "context_compaction",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        let category = match normalized.as_str() {
            "discussion_mode" | "discussion" | "no" => TriggerCategory::DiscussionMode,
            "implementation_mode" | "implementation" | "go" => TriggerCategory::ImplementationMode,
            "task_creation" | "create" => TriggerCategory::TaskCreation,
            "task_startup" | "start" => TriggerCategory::TaskStartup,
            "task_completion" | "complete" => TriggerCategory::TaskCompletion,
            "context_compaction" | "compact" => TriggerCategory::ContextCompaction,
            _ => return Err(SessionsError::UnknownCategory(value.to_string())),
        };
        Ok(category)
    }

    fn default_phrase(self) -> &'static str {
        match self {
            TriggerCategory::DiscussionMode => "SILENCE",
            TriggerCategory::ImplementationMode => "yert",
            TriggerCategory::TaskCreation => "mek:",
            TriggerCategory::TaskStartup => "start^:",
            TriggerCategory::TaskCompletion => "finito",
            TriggerCategory::ContextCompaction => "squish",
        }
    }
}

impl std::fmt::Display for TriggerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered list of trigger phrases for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhraseList(Vec<String>);

impl PhraseList {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(phrases.into_iter().map(Into::into).collect())
    }

    /// Appends unconditionally; duplicates are kept.
    pub fn append(&mut self, phrase: impl Into<String>) {
        self.0.push(phrase.into());
    }

    /// Appends only if the phrase is not already present. Returns whether it was added.
    pub fn add(&mut self, phrase: &str) -> bool {
        if self.contains(phrase) {
            return false;
        }
        self.0.push(phrase.to_string());
        true
    }

    pub fn contains(&self, phrase: &str) -> bool {
        self.0.iter().any(|p| p == phrase)
    }

    /// First phrase contained in `text`. Exact, case-sensitive substring match.
    /// Empty phrases never match.
    pub fn find_in(&self, text: &str) -> Option<&str> {
        self.0
            .iter()
            .map(String::as_str)
            .find(|phrase| !phrase.is_empty() && text.contains(phrase))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerPhrases {
    pub implementation_mode: PhraseList,
    pub discussion_mode: PhraseList,
    pub task_creation: PhraseList,
    pub task_startup: PhraseList,
    pub task_completion: PhraseList,
    pub context_compaction: PhraseList,
}

impl Default for TriggerPhrases {
    fn default() -> Self {
        let mut phrases = Self {
            implementation_mode: PhraseList::default(),
            discussion_mode: PhraseList::default(),
            task_creation: PhraseList::default(),
            task_startup: PhraseList::default(),
            task_completion: PhraseList::default(),
            context_compaction: PhraseList::default(),
        };
        phrases.ensure_defaults();
        phrases
    }
}

impl TriggerPhrases {
    pub fn get(&self, category: TriggerCategory) -> &PhraseList {
        match category {
            TriggerCategory::DiscussionMode => &self.discussion_mode,
            TriggerCategory::ImplementationMode => &self.implementation_mode,
            TriggerCategory::TaskCreation => &self.task_creation,
            TriggerCategory::TaskStartup => &self.task_startup,
            TriggerCategory::TaskCompletion => &self.task_completion,
            TriggerCategory::ContextCompaction => &self.context_compaction,
        }
    }

    pub fn get_mut(&mut self, category: TriggerCategory) -> &mut PhraseList {
        match category {
            TriggerCategory::DiscussionMode => &mut self.discussion_mode,
            TriggerCategory::ImplementationMode => &mut self.implementation_mode,
            TriggerCategory::TaskCreation => &mut self.task_creation,
            TriggerCategory::TaskStartup => &mut self.task_startup,
            TriggerCategory::TaskCompletion => &mut self.task_completion,
            TriggerCategory::ContextCompaction => &mut self.context_compaction,
        }
    }

    /// Re-seeds any empty category with its default phrase.
    /// Returns the categories that were re-seeded.
    pub fn ensure_defaults(&mut self) -> Vec<TriggerCategory> {
        let mut seeded = Vec::new();
        for category in TriggerCategory::PRIORITY {
            let list = self.get_mut(category);
            if list.is_empty() {
                list.append(category.default_phrase());
                seeded.push(category);
            }
        }
        seeded
    }

    /// Removes a phrase. A category is never left empty.
    pub fn remove(&mut self, category: TriggerCategory, phrase: &str) -> Result<bool> {
        let list = self.get_mut(category);
        if !list.contains(phrase) {
            return Ok(false);
        }
        if list.len() == 1 {
            return Err(SessionsError::LastPhrase {
                category: category.as_str(),
            });
        }
        list.0.retain(|p| p != phrase);
        Ok(true)
    }

    /// First category (in priority order) with a phrase contained in `text`.
    pub fn detect(&self, text: &str) -> Option<(TriggerCategory, &str)> {
        TriggerCategory::PRIORITY
            .into_iter()
            .find_map(|category| self.get(category).find_in(text).map(|p| (category, p)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Features
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextWarnings {
    pub warn_85: bool,
    pub warn_90: bool,
}

impl Default for ContextWarnings {
    fn default() -> Self {
        Self {
            warn_85: true,
            warn_90: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub branch_enforcement: bool,
    pub task_detection: bool,
    pub auto_ultrathink: bool,
    pub use_nerd_fonts: bool,
    pub context_warnings: ContextWarnings,
    pub statusline: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            branch_enforcement: true,
            task_detection: true,
            auto_ultrathink: true,
            use_nerd_fonts: true,
            context_warnings: ContextWarnings::default(),
            statusline: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Command-Line Editing
// ═══════════════════════════════════════════════════════════════════════════════

/// Sections that `sessions-hook config` can show and set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Git,
    Env,
    Features,
}

impl ConfigSection {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSection::Git => "git",
            ConfigSection::Env => "env",
            ConfigSection::Features => "features",
        }
    }

    fn keys(self) -> &'static [&'static str] {
        match self {
            ConfigSection::Git => &[
                "add_pattern",
                "default_branch",
                "commit_style",
                "auto_merge",
                "auto_push",
                "has_submodules",
            ],
            ConfigSection::Env => &["os", "shell", "developer_name"],
            ConfigSection::Features => &[
                "branch_enforcement",
                "task_detection",
                "auto_ultrathink",
                "use_nerd_fonts",
                "statusline",
                "warn_85",
                "warn_90",
            ],
        }
    }

    /// Current values, in display order.
    pub fn settings(self, config: &SessionsConfig) -> Vec<(&'static str, String)> {
        let git = &config.git_preferences;
        let env = &config.environment;
        let features = &config.features;
        let values: Vec<String> = match self {
            ConfigSection::Git => vec![
                git.add_pattern.to_string(),
                git.default_branch.clone(),
                git.commit_style.to_string(),
                git.auto_merge.to_string(),
                git.auto_push.to_string(),
                git.has_submodules.to_string(),
            ],
            ConfigSection::Env => vec![
                env.os.to_string(),
                env.shell.to_string(),
                env.developer_name.clone(),
            ],
            ConfigSection::Features => vec![
                features.branch_enforcement.to_string(),
                features.task_detection.to_string(),
                features.auto_ultrathink.to_string(),
                features.use_nerd_fonts.to_string(),
                features.statusline.to_string(),
                features.context_warnings.warn_85.to_string(),
                features.context_warnings.warn_90.to_string(),
            ],
        };
        self.keys().iter().copied().zip(values).collect()
    }

    /// Sets one field with strict parsing. Nothing changes on error.
    pub fn set(self, config: &mut SessionsConfig, key: &str, value: &str) -> Result<()> {
        let key = key.trim().to_ascii_lowercase();
        let git = &mut config.git_preferences;
        let env = &mut config.environment;
        let features = &mut config.features;

        match (self, key.as_str()) {
            (ConfigSection::Git, "add_pattern") => git.add_pattern = StagingPolicy::parse(value)?,
            (ConfigSection::Git, "default_branch") => {
                git.default_branch = non_empty("default_branch", value)?
            }
            (ConfigSection::Git, "commit_style") => git.commit_style = CommitStyle::parse(value)?,
            (ConfigSection::Git, "auto_merge") => git.auto_merge = parse_bool("auto_merge", value)?,
            (ConfigSection::Git, "auto_push") => git.auto_push = parse_bool("auto_push", value)?,
            (ConfigSection::Git, "has_submodules") => {
                git.has_submodules = parse_bool("has_submodules", value)?
            }
            (ConfigSection::Env, "os") => env.os = UserOs::parse(value)?,
            (ConfigSection::Env, "shell") => env.shell = UserShell::parse(value)?,
            (ConfigSection::Env, "developer_name") => {
                env.developer_name = non_empty("developer_name", value)?
            }
            (ConfigSection::Features, "branch_enforcement") => {
                return Err(SessionsError::ProtectedSetting("branch_enforcement"))
            }
            (ConfigSection::Features, "task_detection") => {
                features.task_detection = parse_bool("task_detection", value)?
            }
            (ConfigSection::Features, "auto_ultrathink") => {
                features.auto_ultrathink = parse_bool("auto_ultrathink", value)?
            }
            (ConfigSection::Features, "use_nerd_fonts") => {
                features.use_nerd_fonts = parse_bool("use_nerd_fonts", value)?
            }
            (ConfigSection::Features, "statusline") => {
                features.statusline = parse_bool("statusline", value)?
            }
            (ConfigSection::Features, "warn_85") => {
                features.context_warnings.warn_85 = parse_bool("warn_85", value)?
            }
            (ConfigSection::Features, "warn_90") => {
                features.context_warnings.warn_90 = parse_bool("warn_90", value)?
            }
            _ => {
                return Err(SessionsError::UnknownSetting {
                    section: self.as_str(),
                    key: key.clone(),
                    expected: self.keys().join(", "),
                })
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for ConfigSection {
    type Err = SessionsError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "git" => Ok(ConfigSection::Git),
            "env" | "environment" => Ok(ConfigSection::Env),
            "features" => Ok(ConfigSection::Features),
            _ => Err(SessionsError::InvalidValue {
                field: "section",
                value: value.to_string(),
                expected: "git, env, features".to_string(),
            }),
        }
    }
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SessionsError::InvalidValue {
            field,
            value: value.to_string(),
            expected: "true, false".to_string(),
        }),
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SessionsError::InvalidValue {
            field,
            value: value.to_string(),
            expected: "a non-empty string".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Document
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub git_preferences: GitPreferences,
    pub environment: Environment,
    pub blocked_actions: BlockedActions,
    pub trigger_phrases: TriggerPhrases,
    pub features: Features,
}

impl SessionsConfig {
    /// Applied after every load so downstream code can rely on invariants.
    pub(crate) fn normalize(&mut self) {
        let seeded = self.trigger_phrases.ensure_defaults();
        if !seeded.is_empty() {
            tracing::warn!(
                categories = ?seeded.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
                "Empty trigger phrase categories re-seeded with defaults"
            );
        }
    }

    /// Problems a hand-edited document can carry past the lenient loader.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.git_preferences.default_branch.trim().is_empty() {
            issues.push("Git default_branch is empty".to_string());
        }
        if self.environment.developer_name.trim().is_empty() {
            issues.push("Developer name is empty".to_string());
        }
        if self.blocked_actions.implementation_only_tools.is_empty() {
            issues.push("No tools are blocked in discussion mode".to_string());
        }
        issues
    }
}
