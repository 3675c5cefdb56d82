//! Advisory cross-process edit lock.
//!
//! A lock is a directory created with a single `mkdir`, which either
//! succeeds or fails atomically on every platform we care about. The guard
//! removes it on drop.
//!
//! ```text
//! sessions/sessions-state.lock/
//! └── pid          # Plain text: holder process ID (diagnostics only)
//! ```
//!
//! Hook processes hold the lock for milliseconds. A lock directory older
//! than [`STALE_LOCK_AGE`] is assumed to belong to a crashed process and is
//! broken. Readers never take the lock; atomic rename keeps them safe.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use fs_err as fs;

use crate::error::{Result, SessionsError};

pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %err, "Failed to release lock");
        }
    }
}

pub fn acquire(lock_dir: &Path) -> Result<LockGuard> {
    acquire_with(lock_dir, LOCK_TIMEOUT, STALE_LOCK_AGE)
}

pub fn acquire_with(lock_dir: &Path, timeout: Duration, stale_after: Duration) -> Result<LockGuard> {
    if let Some(parent) = lock_dir.parent() {
        fs::create_dir_all(parent).map_err(|source| SessionsError::Io {
            context: format!("creating {}", parent.display()),
            source,
        })?;
    }

    let start = Instant::now();
    loop {
        match std::fs::create_dir(lock_dir) {
            Ok(()) => {
                let _ = fs::write(lock_dir.join("pid"), std::process::id().to_string());
                return Ok(LockGuard {
                    path: lock_dir.to_path_buf(),
                });
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                if is_stale(lock_dir, stale_after) {
                    tracing::warn!(path = %lock_dir.display(), "Breaking stale lock");
                    let _ = fs::remove_dir_all(lock_dir);
                    continue;
                }
                if start.elapsed() >= timeout {
                    return Err(SessionsError::LockTimeout {
                        path: lock_dir.to_path_buf(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                return Err(SessionsError::Io {
                    context: format!("creating lock {}", lock_dir.display()),
                    source,
                })
            }
        }
    }
}

fn is_stale(lock_dir: &Path, stale_after: Duration) -> bool {
    std::fs::metadata(lock_dir)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > stale_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_and_drop_releases() {
        let temp = TempDir::new().unwrap();
        let lock_dir = temp.path().join("doc.lock");

        let guard = acquire(&lock_dir).unwrap();
        assert!(lock_dir.is_dir());
        assert!(lock_dir.join("pid").exists());
        drop(guard);
        assert!(!lock_dir.exists());
    }

    #[test]
    fn test_held_lock_times_out() {
        let temp = TempDir::new().unwrap();
        let lock_dir = temp.path().join("doc.lock");
        let _held = acquire(&lock_dir).unwrap();

        let err = acquire_with(
            &lock_dir,
            Duration::from_millis(120),
            Duration::from_secs(3600),
        )
        .unwrap_err();
        assert!(matches!(err, SessionsError::LockTimeout { .. }));
    }

    #[test]
    fn test_stale_lock_is_broken() {
        let temp = TempDir::new().unwrap();
        let lock_dir = temp.path().join("doc.lock");
        std::fs::create_dir(&lock_dir).unwrap();
        thread::sleep(Duration::from_millis(30));

        let guard = acquire_with(&lock_dir, Duration::from_secs(1), Duration::from_millis(10));
        assert!(guard.is_ok());
    }

    #[test]
    fn test_creates_missing_parent() {
        let temp = TempDir::new().unwrap();
        let lock_dir = temp.path().join("sessions").join("doc.lock");
        let guard = acquire(&lock_dir).unwrap();
        assert_eq!(guard.path(), lock_dir.as_path());
    }
}
