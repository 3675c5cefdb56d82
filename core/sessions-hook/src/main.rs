//! sessions-hook: CLI hook handler for cc-sessions mode gating.
//!
//! Invoked by the host's hooks and statusline as configured in
//! `.claude/settings.json`, and by the agent itself for the management
//! subcommands.
//!
//! ## Subcommands
//!
//! - `session-start`: SessionStart hook, resets per-session state
//! - `user-prompt`: UserPromptSubmit hook, reads JSON from stdin
//! - `pre-tool-use`: PreToolUse hook; exit 2 blocks the tool
//! - `statusline`: renders the two-line status report
//! - `mode`, `phrases`, `config`, `state`: inspect and adjust the stored documents

mod commands;
mod error;
mod hook;
mod logging;

use clap::{Parser, Subcommand};
use sessions_core::{ConfigSection, ToolDecision};

use crate::error::Result;

#[derive(Parser)]
#[command(name = "sessions-hook")]
#[command(about = "Discussion/implementation mode gate for AI coding agents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a SessionStart hook event (reads JSON from stdin)
    SessionStart,

    /// Handle a UserPromptSubmit hook event (reads JSON from stdin)
    UserPrompt,

    /// Handle a PreToolUse hook event (reads JSON from stdin)
    PreToolUse,

    /// Render the statusline (reads the host's statusline JSON from stdin)
    Statusline,

    /// Show the current mode, or switch back to discussion mode
    Mode {
        /// Target mode (only `discussion` is accepted)
        #[arg(value_name = "MODE")]
        target: Option<String>,
    },

    /// Manage trigger phrases
    Phrases {
        #[command(subcommand)]
        action: PhrasesCommand,
    },

    /// Show or change configuration settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Print the runtime state document as JSON
    State,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Git preferences
    Git {
        #[command(subcommand)]
        action: Option<SettingAction>,
    },

    /// Developer environment
    Env {
        #[command(subcommand)]
        action: Option<SettingAction>,
    },

    /// Feature toggles
    Features {
        #[command(subcommand)]
        action: Option<SettingAction>,
    },

    /// Check the configuration for missing values
    Validate,
}

#[derive(Subcommand)]
enum SettingAction {
    /// Print every setting in the section (default)
    Show,

    /// Change one setting
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
}

#[derive(Subcommand)]
enum PhrasesCommand {
    /// List phrases, for one category or all of them
    List {
        #[arg(value_name = "CATEGORY")]
        category: Option<String>,
    },

    /// Add a phrase to a category
    Add {
        #[arg(value_name = "CATEGORY")]
        category: String,
        #[arg(value_name = "PHRASE")]
        phrase: String,
    },

    /// Remove a phrase from a category
    Remove {
        #[arg(value_name = "CATEGORY")]
        category: String,
        #[arg(value_name = "PHRASE")]
        phrase: String,
    },
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::SessionStart => {
            if let Err(e) = hook::run_session_start() {
                tracing::error!(error = %e, "sessions-hook session-start failed");
                std::process::exit(1);
            }
        }
        Commands::UserPrompt => {
            if let Err(e) = hook::run_user_prompt() {
                tracing::error!(error = %e, "sessions-hook user-prompt failed");
                std::process::exit(1);
            }
        }
        Commands::PreToolUse => match hook::run_pre_tool_use() {
            Ok(ToolDecision::Allow) => {}
            Ok(ToolDecision::Deny { reason }) => {
                eprintln!("{reason}");
                std::process::exit(2);
            }
            Err(e) => {
                tracing::error!(error = %e, "sessions-hook pre-tool-use failed");
                std::process::exit(1);
            }
        },
        Commands::Statusline => {
            if let Err(e) = hook::run_statusline() {
                tracing::error!(error = %e, "sessions-hook statusline failed");
                std::process::exit(1);
            }
        }
        Commands::Mode { target } => {
            report(run_command(|store| commands::mode_command(store, target.as_deref())))
        }
        Commands::Phrases { action } => report(run_command(|store| match &action {
            PhrasesCommand::List { category } => commands::list_phrases(store, category.as_deref()),
            PhrasesCommand::Add { category, phrase } => {
                commands::add_phrase(store, category, phrase)
            }
            PhrasesCommand::Remove { category, phrase } => {
                commands::remove_phrase(store, category, phrase)
            }
        })),
        Commands::Config { action } => report(run_command(|store| {
            let (section, action) = match action {
                ConfigCommand::Git { action } => (ConfigSection::Git, action),
                ConfigCommand::Env { action } => (ConfigSection::Env, action),
                ConfigCommand::Features { action } => (ConfigSection::Features, action),
                ConfigCommand::Validate => return commands::validate_config(store),
            };
            match action {
                None | Some(SettingAction::Show) => commands::show_config(store, section),
                Some(SettingAction::Set { key, value }) => {
                    commands::set_config(store, section, &key, &value)
                }
            }
        })),
        Commands::State => report(run_command(commands::show_state)),
    }
}

fn run_command(command: impl FnOnce(&sessions_core::Store) -> Result<String>) -> Result<String> {
    let store = sessions_core::Store::discover()?;
    command(&store)
}

fn report(result: Result<String>) {
    match result {
        Ok(output) => println!("{output}"),
        Err(e) => {
            tracing::error!(error = %e, "sessions-hook command failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
