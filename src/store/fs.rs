//! Filesystem-backed promotion stores.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use crate::manifest::TrackedVersion;
use crate::promote::{ObjectStore, TrackedStore};

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Write-then-rename so readers never observe a torn object.
async fn atomic_write(path: &Path, body: &[u8]) -> Result<()> {
    ensure_parent(path).await?;
    let staged = path.with_extension("tmp");
    fs::write(&staged, body)
        .await
        .with_context(|| format!("failed to write {}", staged.display()))?;
    fs::rename(&staged, path)
        .await
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// [`ObjectStore`] over a directory tree; object keys are slash-separated
/// relative paths under the root.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir));
        if escapes {
            bail!("invalid object key: {key}");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        fs::read(&path)
            .await
            .with_context(|| format!("failed to read object {key}"))
    }

    async fn put(&self, key: &str, body: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        atomic_write(&path, body)
            .await
            .with_context(|| format!("failed to write object {key}"))
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let source = self.resolve(from)?;
        let dest = self.resolve(to)?;
        ensure_parent(&dest).await?;
        fs::copy(&source, &dest)
            .await
            .with_context(|| format!("failed to copy object {from} -> {to}"))?;
        Ok(())
    }
}

/// [`TrackedStore`] over a single JSON file mapping version -> record.
///
/// Writes go through an in-process lock plus write-then-rename, which is
/// enough for the single-scanner deployment model; the conditional-update
/// check still guards against a second promoter process racing the file.
pub struct FsTrackedStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FsTrackedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, TrackedVersion>> {
        match fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .with_context(|| format!("malformed tracking file {}", self.path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read tracking file {}", self.path.display())),
        }
    }

    async fn save(&self, records: &BTreeMap<String, TrackedVersion>) -> Result<()> {
        let raw = serde_json::to_vec_pretty(records)?;
        atomic_write(&self.path, &raw).await
    }

    /// Insert or replace a record unconditionally. This is the publisher
    /// side of the lifecycle (a version entering `dev`); the promoter only
    /// ever goes through [`TrackedStore::update_if`].
    pub async fn insert(&self, record: TrackedVersion) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.insert(record.version.clone(), record);
        self.save(&records).await
    }
}

#[async_trait]
impl TrackedStore for FsTrackedStore {
    async fn scan(&self) -> Result<Vec<TrackedVersion>> {
        Ok(self.load().await?.into_values().collect())
    }

    async fn update_if(&self, expected: &TrackedVersion, updated: &TrackedVersion) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let Some(current) = records.get(&expected.version) else {
            return Ok(false);
        };
        let unchanged = current.channel == expected.channel
            && current.dev_approved == expected.dev_approved
            && current.beta_approved == expected.beta_approved;
        if !unchanged {
            return Ok(false);
        }
        records.insert(updated.version.clone(), updated.clone());
        self.save(&records).await?;
        Ok(true)
    }
}
