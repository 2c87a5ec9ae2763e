// ABOUTME: Exclusive lock file guarding writes to the on-disk state.
// ABOUTME: Uses atomic create-new so two processes can never both hold it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::error::{IoSnafu, LockHeldSnafu, StoreError};

/// Locks older than this belong to a process that died mid-write.
const STALE_AFTER_SECS: i64 = 30;

/// How long to wait for a live holder before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Information about who holds the state lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
}

impl LockInfo {
    /// Create lock info for the current process.
    pub fn current() -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
        }
    }

    pub fn is_stale(&self) -> bool {
        (Utc::now() - self.started_at).num_seconds() >= STALE_AFTER_SECS
    }

    /// Lock file path for a state file.
    pub fn lock_path(state_path: &Path) -> PathBuf {
        let mut name = state_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        state_path.with_file_name(name)
    }
}

/// A held state lock. Release it explicitly with [`StateLock::release`].
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    /// Acquire the lock for `state_path`, waiting for a live holder and
    /// breaking stale or unreadable locks.
    pub async fn acquire(state_path: &Path) -> Result<Self, StoreError> {
        let path = LockInfo::lock_path(state_path);
        let info = LockInfo::current();
        let body = serde_json::to_vec(&info).unwrap_or_default();
        let deadline = tokio::time::Instant::now() + ACQUIRE_TIMEOUT;

        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&body).await.context(IoSnafu {
                        action: "write lock",
                        path: &path,
                    })?;
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => {
                    return Err(e).context(IoSnafu {
                        action: "create lock",
                        path: &path,
                    });
                }
            }

            match Self::read_holder(&path).await {
                Some(existing) if !existing.is_stale() => {
                    if tokio::time::Instant::now() >= deadline {
                        return LockHeldSnafu {
                            path: &path,
                            holder: existing.holder,
                            pid: existing.pid,
                            started_at: existing.started_at,
                        }
                        .fail();
                    }
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
                Some(existing) => {
                    tracing::warn!(
                        holder = %existing.holder,
                        pid = existing.pid,
                        since = %existing.started_at,
                        "breaking stale state lock"
                    );
                    let _ = tokio::fs::remove_file(&path).await;
                }
                None => {
                    // The holder may still be writing its info; give it one
                    // interval before treating the file as corrupt.
                    tokio::time::sleep(RETRY_INTERVAL).await;
                    if Self::read_holder(&path).await.is_none() {
                        tracing::warn!(path = %path.display(), "lock info unreadable, breaking lock");
                        let _ = tokio::fs::remove_file(&path).await;
                    }
                }
            }
        }
    }

    async fn read_holder(path: &Path) -> Option<LockInfo> {
        let bytes = tokio::fs::read(path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Release the lock.
    pub async fn release(self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context(IoSnafu {
                action: "release lock",
                path: &self.path,
            }),
        }
    }
}
