//! File-backed store: one JSON file per key.

use super::{KeyValueStore, Updater};
use crate::error::StoreError;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const LOCK_FILE_NAME: &str = ".lock";

/// Held while a stale lock is being removed, so only one waiter removes it.
const BREAKER_FILE_NAME: &str = ".lock.break";

/// How long `update` waits for another process to release the lock.
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Lock files older than this were left behind by a crashed process.
const STALE_LOCK_AGE: Duration = Duration::from_secs(60);

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Store keeping `<key>.json` files in a data directory.
///
/// Updates are serialized within the process by a mutex and across
/// processes by an exclusive lock file. Files are replaced atomically.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    guard: Mutex<()>,
    lock_timeout: Duration,
}

/// Removes the lock file when dropped.
struct LockFile {
    path: PathBuf,
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

impl FileStore {
    /// Open a store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        debug!("Opened store at {}", dir.display());

        Ok(Self {
            dir,
            guard: Mutex::new(()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let path = self.path(key);
        let content = serde_json::to_string_pretty(value).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| StoreError::io(&path, e.error))?;
        Ok(())
    }

    fn acquire_lock(&self) -> Result<LockFile, StoreError> {
        let path = self.dir.join(LOCK_FILE_NAME);
        let deadline = Instant::now() + self.lock_timeout;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(LockFile { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) && self.break_stale_lock(&path)? {
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(StoreError::LockTimeout(path.display().to_string()));
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
    }

    /// Remove `lock` if it is still stale. Returns whether it was removed.
    ///
    /// Staleness is checked again while holding the breaker file: another
    /// waiter may already have removed the stale lock and taken a fresh one.
    fn break_stale_lock(&self, lock: &Path) -> Result<bool, StoreError> {
        let breaker = self.dir.join(BREAKER_FILE_NAME);
        match OpenOptions::new().write(true).create_new(true).open(&breaker) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // A breaker this old belongs to a crashed process.
                if is_stale(&breaker) {
                    let _ = fs::remove_file(&breaker);
                }
                return Ok(false);
            }
            Err(e) => return Err(StoreError::io(&breaker, e)),
        }
        let _breaker = LockFile { path: breaker };

        if !is_stale(lock) {
            return Ok(false);
        }
        warn!("Removing stale lock {}", lock.display());
        match fs::remove_file(lock) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(StoreError::io(lock, e)),
        }
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.read(key)
    }

    fn update(&self, key: &str, updater: Updater<'_>) -> Result<Value, StoreError> {
        let _guard = self.guard.lock().map_err(|_| StoreError::Poisoned)?;
        let _lock = self.acquire_lock()?;

        let next = updater(self.read(key)?)?;
        self.write(key, &next)?;
        Ok(next)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.guard.lock().map_err(|_| StoreError::Poisoned)?;
        let _lock = self.acquire_lock()?;

        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}
