//! Context window usage derived from the agent's JSONL transcript.
//!
//! The transcript is append-only; each line is one record. Only main-chain
//! records (`isSidechain` false or absent) carrying `message.usage` count,
//! and the one with the latest timestamp wins. Its input, cache-read and
//! cache-creation token counts sum to the current context size.

use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

/// Usable tokens before the host compacts context.
pub const DEFAULT_CONTEXT_LIMIT: u64 = 160_000;
/// Usable tokens for extended-context models.
pub const EXTENDED_CONTEXT_LIMIT: u64 = 800_000;
/// Reported when there is no transcript yet (system prompt plus tools).
pub const FALLBACK_USED_TOKENS: u64 = 17_900;

pub const BAR_CELLS: u8 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub cache_creation_input_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.cache_read_input_tokens)
            .saturating_add(self.cache_creation_input_tokens)
    }
}

#[derive(Debug, Deserialize)]
struct LogRecord {
    #[serde(rename = "isSidechain", default)]
    is_sidechain: bool,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    message: Option<LogMessage>,
}

#[derive(Debug, Deserialize)]
struct LogMessage {
    #[serde(default)]
    usage: Option<Usage>,
}

/// Filled cells of a fixed-width progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBar {
    pub filled: u8,
}

impl ContextBar {
    pub fn from_percent(percent: u8) -> Self {
        Self {
            filled: (percent / 10).min(BAR_CELLS),
        }
    }

    pub fn empty(&self) -> u8 {
        BAR_CELLS - self.filled
    }

    pub fn render(&self, nerd_fonts: bool) -> String {
        let (full, empty) = if nerd_fonts { ('█', '░') } else { ('#', '-') };
        let mut bar = String::with_capacity(usize::from(BAR_CELLS) * full.len_utf8());
        bar.extend(std::iter::repeat(full).take(usize::from(self.filled)));
        bar.extend(std::iter::repeat(empty).take(usize::from(self.empty())));
        bar
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextUsage {
    pub used_tokens: u64,
    pub limit: u64,
    /// Integer percent of `limit`, clamped to 0..=100.
    pub percent: u8,
    pub bar: ContextBar,
}

impl ContextUsage {
    pub fn new(used_tokens: u64, limit: u64) -> Self {
        let limit = limit.max(1);
        let percent = (u128::from(used_tokens) * 100 / u128::from(limit)).min(100) as u8;
        Self {
            used_tokens,
            limit,
            percent,
            bar: ContextBar::from_percent(percent),
        }
    }
}

/// Context limit for a model. Extended-context models are marked `[1m]` or
/// advertise "1M context" in their display name.
pub fn limit_for_model(model: Option<&str>) -> u64 {
    let Some(model) = model else {
        return DEFAULT_CONTEXT_LIMIT;
    };
    let lowered = model.to_ascii_lowercase();
    if lowered.contains("[1m]") || lowered.contains("1m context") {
        EXTENDED_CONTEXT_LIMIT
    } else {
        DEFAULT_CONTEXT_LIMIT
    }
}

/// Usage of the latest main-chain record, or `None` if no record qualifies.
///
/// Malformed lines and records without a parseable RFC 3339 timestamp are
/// skipped. On equal timestamps the later line wins.
pub fn latest_usage(reader: impl BufRead) -> Option<Usage> {
    let mut latest: Option<(DateTime<FixedOffset>, Usage)> = None;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) if err.kind() == ErrorKind::InvalidData => continue,
            Err(err) => {
                tracing::debug!(error = %err, "Transcript read interrupted");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let Ok(record) = serde_json::from_str::<LogRecord>(&line) else {
            continue;
        };
        if record.is_sidechain {
            continue;
        }
        let Some(usage) = record.message.and_then(|m| m.usage) else {
            continue;
        };
        let Some(timestamp) = record
            .timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        else {
            continue;
        };

        if latest.map_or(true, |(best, _)| timestamp >= best) {
            latest = Some((timestamp, usage));
        }
    }

    latest.map(|(_, usage)| usage)
}

/// Computes context usage from a transcript.
///
/// No path, a missing file, or a file that cannot be opened reports
/// [`FALLBACK_USED_TOKENS`]. A readable transcript without usage reports 0.
pub fn compute(log_path: Option<&Path>, model: Option<&str>) -> ContextUsage {
    let limit = limit_for_model(model);

    let Some(path) = log_path.filter(|p| !p.as_os_str().is_empty()) else {
        return ContextUsage::new(FALLBACK_USED_TOKENS, limit);
    };

    let file = match fs_err::File::open(path) {
        Ok(file) => file,
        Err(err) => {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %err, "Failed to open transcript");
            }
            return ContextUsage::new(FALLBACK_USED_TOKENS, limit);
        }
    };

    let used = latest_usage(BufReader::new(file))
        .map(|usage| usage.total())
        .unwrap_or(0);
    ContextUsage::new(used, limit)
}
