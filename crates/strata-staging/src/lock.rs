// lock.rs — Advisory cross-process lock.
//
// The lock is a directory: `fs::create_dir` either creates it or fails with
// AlreadyExists, atomically, on every platform we care about. Waiters poll
// until a deadline. The guard removes the directory on drop, so the lock is
// released on every exit path including early returns and panics.
//
// The lock is advisory. Two processes that both skip it can still
// interleave sequence-number assignment on the same changeset.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::StagingConfig;
use crate::error::StagingError;

/// Held lock; released when dropped.
#[derive(Debug)]
pub struct ProjectLock {
    path: PathBuf,
}

impl ProjectLock {
    /// Acquire the lock at `path`, polling every `poll` until `timeout`.
    pub fn acquire(
        path: impl AsRef<Path>,
        timeout: Duration,
        poll: Duration,
    ) -> Result<Self, StagingError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StagingError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let started = Instant::now();
        loop {
            match fs::create_dir(&path) {
                Ok(()) => {
                    // Owner info is diagnostic only.
                    let _ = fs::write(path.join("owner"), std::process::id().to_string());
                    tracing::debug!("acquired lock {}", path.display());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        return Err(StagingError::LockTimeout {
                            path,
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    thread::sleep(poll.min(timeout - waited));
                }
                Err(source) => return Err(StagingError::IoError { path, source }),
            }
        }
    }

    /// Acquire the lock for a project with its configured timeout and poll.
    pub fn for_project(config: &StagingConfig) -> Result<Self, StagingError> {
        Self::acquire(config.lock_path(), config.lock_timeout(), config.lock_poll())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            tracing::warn!("failed to release lock {}: {}", self.path.display(), e);
        } else {
            tracing::debug!("released lock {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_and_release() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join(".lock");
        {
            let lock = ProjectLock::acquire(
                &lock_path,
                Duration::from_millis(100),
                Duration::from_millis(10),
            )
            .unwrap();
            assert!(lock.path().exists());
        }
        assert!(!lock_path.exists());
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join(".lock");
        let _held =
            ProjectLock::acquire(&lock_path, Duration::from_millis(100), Duration::from_millis(10))
                .unwrap();

        let started = Instant::now();
        let err =
            ProjectLock::acquire(&lock_path, Duration::from_millis(80), Duration::from_millis(10))
                .unwrap_err();
        assert!(matches!(err, StagingError::LockTimeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn waiter_acquires_after_release() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join(".lock");
        let held =
            ProjectLock::acquire(&lock_path, Duration::from_millis(100), Duration::from_millis(5))
                .unwrap();

        let waiter_path = lock_path.clone();
        let waiter = thread::spawn(move || {
            ProjectLock::acquire(&waiter_path, Duration::from_secs(5), Duration::from_millis(5))
                .map(|_| ())
        });

        thread::sleep(Duration::from_millis(30));
        drop(held);
        waiter.join().unwrap().unwrap();
    }

    #[test]
    fn for_project_uses_configured_path() {
        let dir = tempdir().unwrap();
        let config = StagingConfig::for_project(dir.path());
        let lock = ProjectLock::for_project(&config).unwrap();
        assert_eq!(lock.path(), config.lock_path());
        assert!(config.lock_path().is_dir());
    }

    #[test]
    fn released_on_early_return() {
        fn fails_while_locked(path: &Path) -> Result<(), StagingError> {
            let _lock =
                ProjectLock::acquire(path, Duration::from_millis(50), Duration::from_millis(5))?;
            Err(StagingError::NotFound("x".into()))
        }

        let dir = tempdir().unwrap();
        let lock_path = dir.path().join(".lock");
        assert!(fails_while_locked(&lock_path).is_err());
        assert!(!lock_path.exists());
    }
}
