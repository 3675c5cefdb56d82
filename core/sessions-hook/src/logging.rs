//! Log sink for hook processes.
//!
//! stdout carries hook output to the host, so logs go to a daily rolling
//! file under `~/.cc-sessions/logs/`. Without a usable home directory, warnings
//! and errors go to stderr instead.

use std::env;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

pub const DEBUG_LOG_ENV: &str = "SESSIONS_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "sessions-hook";

fn debug_enabled() -> bool {
    env::var(DEBUG_LOG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn env_filter() -> EnvFilter {
    if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cc-sessions").join("logs"))
}

/// Installs the global subscriber. Hold the returned guard for the life of
/// the process so buffered lines are flushed on exit.
pub fn init() -> Option<WorkerGuard> {
    let appender = log_dir().and_then(|dir| {
        fs_err::create_dir_all(&dir).ok()?;
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .build(&dir)
            .ok()
    });

    match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("warn"))
                .with_writer(std::io::stderr)
                .try_init();
            None
        }
    }
}
