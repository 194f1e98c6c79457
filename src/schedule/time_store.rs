//! Persistence of the "next check due" instant.
//!
//! The updater's only persistent state is a single timestamp. It is stored as
//! an opaque RFC 3339 string so the file stays inspectable and editable by
//! hand, and so alternative backends can substitute without touching the
//! scheduling logic.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// How far into the future a corrupt state file pushes the next check.
const CORRUPT_BACKOFF_HOURS: i64 = 1000;

/// Stores and retrieves a single timestamp.
///
/// The two degraded read paths are deliberately asymmetric and load-bearing:
///
/// - a *missing* value reads as the Unix epoch, so a fresh installation is
///   due for a check immediately;
/// - an *unreadable or unparsable* value reads as far in the future, so a
///   damaged file suppresses checks instead of firing one on every start and
///   stampeding the update source. The next successful
///   [`store`](TimeStore::store) rewrites the file and recovers.
pub trait TimeStore: Send {
    /// Load the persisted instant, applying the missing/corrupt asymmetry.
    fn load(&self) -> DateTime<Utc>;

    /// Persist `at`, replacing any previous value.
    fn store(&self, at: DateTime<Utc>) -> Result<()>;
}

fn far_future() -> DateTime<Utc> {
    Utc::now() + Duration::hours(CORRUPT_BACKOFF_HOURS)
}

/// [`TimeStore`] backed by a plain text file.
pub struct FsTimeStore {
    path: PathBuf,
}

impl FsTimeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TimeStore for FsTimeStore {
    fn load(&self) -> DateTime<Utc> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return DateTime::UNIX_EPOCH;
            }
            Err(_) => return far_future(),
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(at) => at.with_timezone(&Utc),
            Err(_) => far_future(),
        }
    }

    fn store(&self, at: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        // Write-then-rename keeps a torn write from producing a corrupt file
        // that would suppress checks for a long time.
        let staged = self.path.with_extension("tmp");
        std::fs::write(&staged, at.to_rfc3339())
            .with_context(|| format!("failed to write {}", staged.display()))?;
        std::fs::rename(&staged, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory [`TimeStore`] for tests and embedders that manage persistence
/// themselves.
#[derive(Default)]
pub struct MemoryTimeStore {
    at: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryTimeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeStore for MemoryTimeStore {
    fn load(&self) -> DateTime<Utc> {
        self.at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    fn store(&self, at: DateTime<Utc>) -> Result<()> {
        *self.at.lock().unwrap_or_else(PoisonError::into_inner) = Some(at);
        Ok(())
    }
}
