//! Modified-file count from `git status --porcelain`.
//!
//! Git is an outside collaborator: a missing binary, a non-repository, a
//! non-zero exit or a slow repository all report zero.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt;

pub const GIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Files added or modified in the index or worktree under `dir`.
pub fn count_modified_files(dir: &Path) -> usize {
    count_modified_files_with(dir, GIT_TIMEOUT)
}

pub fn count_modified_files_with(dir: &Path, timeout: Duration) -> usize {
    porcelain_status(dir, timeout)
        .map(|output| count_porcelain(&output))
        .unwrap_or(0)
}

/// Counts porcelain lines whose index or worktree column is `A` or `M`.
pub fn count_porcelain(output: &str) -> usize {
    output
        .lines()
        .filter(|line| {
            let bytes = line.as_bytes();
            [bytes.first(), bytes.get(1)]
                .into_iter()
                .flatten()
                .any(|b| matches!(b, b'A' | b'M'))
        })
        .count()
}

fn porcelain_status(dir: &Path, timeout: Duration) -> Option<String> {
    if !dir.is_dir() {
        return None;
    }

    let mut child = match Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            tracing::debug!(dir = %dir.display(), error = %err, "Failed to spawn git");
            return None;
        }
    };

    // Drain stdout concurrently so a large status cannot fill the pipe and stall git.
    let mut stdout = child.stdout.take()?;
    let reader = thread::spawn(move || {
        let mut buf = String::new();
        stdout.read_to_string(&mut buf).map(|_| buf)
    });

    match child.wait_timeout(timeout) {
        Ok(Some(status)) if status.success() => reader.join().ok()?.ok(),
        Ok(Some(status)) => {
            tracing::debug!(dir = %dir.display(), status = %status, "git status failed");
            None
        }
        Ok(None) => {
            tracing::warn!(dir = %dir.display(), timeout_ms = timeout.as_millis() as u64, "git status timed out");
            let _ = child.kill();
            let _ = child.wait();
            None
        }
        Err(err) => {
            tracing::debug!(dir = %dir.display(), error = %err, "Failed waiting for git");
            let _ = child.kill();
            None
        }
    }
}
