//! Management subcommands: `mode`, `phrases`, `config` and `state`.
//!
//! These are also reachable from Bash in discussion mode, so the agent can
//! inspect its own gate and step back to discussion without a trigger phrase.

use sessions_core::config::{ConfigSection, TriggerCategory};
use sessions_core::{mode, Mode, Store};

use crate::error::{HookError, Result};

pub fn mode_command(store: &Store, target: Option<&str>) -> Result<String> {
    let Some(target) = target else {
        return Ok(mode_name(store.load_state().mode).to_string());
    };

    match TriggerCategory::parse(target) {
        Ok(TriggerCategory::DiscussionMode) => Ok(match mode::enter_discussion(store)? {
            Some(_) => "Switched to discussion mode".to_string(),
            None => "Already in discussion mode".to_string(),
        }),
        Ok(TriggerCategory::ImplementationMode) => Err(HookError::Usage(
            "Implementation mode can only be entered with a trigger phrase from the user"
                .to_string(),
        )),
        _ => Err(HookError::Usage(format!(
            "Unknown mode '{target}' (expected: discussion)"
        ))),
    }
}

fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Discussion => "discussion",
        Mode::Implementation => "implementation",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trigger Phrases
// ─────────────────────────────────────────────────────────────────────────────

pub fn list_phrases(store: &Store, category: Option<&str>) -> Result<String> {
    let categories = match category {
        Some(name) => vec![TriggerCategory::parse(name)?],
        None => TriggerCategory::PRIORITY.to_vec(),
    };

    let config = store.load_config();
    let lines: Vec<String> = categories
        .into_iter()
        .map(|category| {
            let phrases: Vec<&str> = config.trigger_phrases.get(category).iter().collect();
            format!("{}: {}", category.as_str(), phrases.join(", "))
        })
        .collect();
    Ok(lines.join("\n"))
}

pub fn add_phrase(store: &Store, category: &str, phrase: &str) -> Result<String> {
    let category = TriggerCategory::parse(category)?;
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return Err(HookError::Usage("Trigger phrase cannot be empty".to_string()));
    }

    let added = store.edit_config(|config| Ok(config.trigger_phrases.get_mut(category).add(phrase)))?;
    Ok(if added {
        format!("Added '{phrase}' to {category}")
    } else {
        format!("'{phrase}' is already a {category} phrase")
    })
}

pub fn remove_phrase(store: &Store, category: &str, phrase: &str) -> Result<String> {
    let category = TriggerCategory::parse(category)?;
    let removed = store.edit_config(|config| config.trigger_phrases.remove(category, phrase))?;
    Ok(if removed {
        format!("Removed '{phrase}' from {category}")
    } else {
        format!("'{phrase}' is not a {category} phrase")
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

pub fn show_config(store: &Store, section: ConfigSection) -> Result<String> {
    let config = store.load_config();
    let lines: Vec<String> = section
        .settings(&config)
        .into_iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect();
    Ok(lines.join("\n"))
}

pub fn set_config(store: &Store, section: ConfigSection, key: &str, value: &str) -> Result<String> {
    store.edit_config(|config| section.set(config, key, value))?;
    tracing::info!(section = section.as_str(), key, value, "Configuration updated");
    Ok(format!("Updated {}.{} to {}", section.as_str(), key.trim(), value.trim()))
}

pub fn validate_config(store: &Store) -> Result<String> {
    let issues = store.load_config().validate();
    if issues.is_empty() {
        return Ok("Configuration is valid".to_string());
    }
    let mut report = String::from("Configuration issues found:");
    for issue in issues {
        report.push_str("\n  - ");
        report.push_str(&issue);
    }
    Ok(report)
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

pub fn show_state(store: &Store) -> Result<String> {
    serde_json::to_string_pretty(&store.load_state()).map_err(|e| {
        HookError::Sessions(sessions_core::SessionsError::Serialize {
            context: "runtime state".to_string(),
            source: e,
        })
    })
}
