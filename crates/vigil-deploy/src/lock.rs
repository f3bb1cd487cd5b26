//! Exclusive operations lock.
//!
//! Only one mutating run (deploy, rollback, restore, standalone backup)
//! may touch the platform at a time. The lock is a file created with
//! `create_new`; the holder writes its identity and acquisition time so
//! a competing invocation can report who is running, and so a lock left
//! behind by a crashed process can be taken over once it is older than
//! the stale threshold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};
use vigil_common::{Error, Result};

/// Contents of the lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub holder: String,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OpsLock {
    path: PathBuf,
    stale_after: Duration,
}

impl OpsLock {
    pub fn new(path: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            path: path.into(),
            stale_after,
        }
    }

    /// Acquire the lock for `holder`, failing with [`Error::Busy`] when
    /// another live holder has it.
    pub fn acquire(&self, holder: &str) -> Result<LockGuard> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // One retry: the first pass may remove a stale lock file.
        for _ in 0..2 {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
            {
                Ok(mut file) => {
                    let info = LockInfo {
                        holder: holder.to_string(),
                        pid: std::process::id(),
                        acquired_at: Utc::now(),
                    };
                    file.write_all(&serde_json::to_vec_pretty(&info)?)?;
                    file.sync_all()?;
                    debug!(holder, path = %self.path.display(), "ops lock acquired");
                    return Ok(LockGuard {
                        path: self.path.clone(),
                        released: false,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    match self.read_holder() {
                        Some(info) if !self.is_stale(&info) => {
                            return Err(Error::Busy(format!(
                                "{} (pid {}) since {}",
                                info.holder, info.pid, info.acquired_at
                            )));
                        }
                        Some(info) => {
                            warn!(
                                "taking over stale ops lock held by {} (pid {}) since {}",
                                info.holder, info.pid, info.acquired_at
                            );
                            std::fs::remove_file(&self.path)?;
                        }
                        None => {
                            if self.file_is_stale()? {
                                warn!("removing unreadable stale lock file");
                                std::fs::remove_file(&self.path)?;
                            } else {
                                return Err(Error::Busy(
                                    "unreadable lock file present".to_string(),
                                ));
                            }
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::Busy(
            "lock contention while taking over a stale lock".to_string(),
        ))
    }

    fn read_holder(&self) -> Option<LockInfo> {
        let data = std::fs::read(&self.path).ok()?;
        serde_json::from_slice(&data).ok()
    }

    fn is_stale(&self, info: &LockInfo) -> bool {
        Utc::now()
            .signed_duration_since(info.acquired_at)
            .to_std()
            .map(|age| age >= self.stale_after)
            .unwrap_or(false)
    }

    fn file_is_stale(&self) -> Result<bool> {
        let modified = std::fs::metadata(&self.path)?.modified()?;
        Ok(modified
            .elapsed()
            .map(|age| age >= self.stale_after)
            .unwrap_or(false))
    }
}

/// Held lock; released explicitly or best-effort on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    /// Release explicitly, surfacing unlink errors.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
