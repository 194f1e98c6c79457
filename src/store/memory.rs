//! In-memory promotion stores for tests and embedders.

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use crate::manifest::TrackedVersion;
use crate::promote::{ObjectStore, TrackedStore};

/// [`ObjectStore`] over a `HashMap`.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing the trait.
    pub fn insert(&self, key: &str, body: Vec<u8>) {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), body);
    }

    /// Current contents of `key`, if present.
    pub fn snapshot(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        match self.snapshot(key) {
            Some(body) => Ok(body),
            None => bail!("no such object: {key}"),
        }
    }

    async fn put(&self, key: &str, body: &[u8]) -> Result<()> {
        self.insert(key, body.to_vec());
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let body = self.get(from).await?;
        self.insert(to, body);
        Ok(())
    }
}

/// [`TrackedStore`] over a `BTreeMap`.
#[derive(Default)]
pub struct MemoryTrackedStore {
    records: Mutex<BTreeMap<String, TrackedVersion>>,
}

impl MemoryTrackedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record unconditionally (the publisher side of the
    /// lifecycle).
    pub fn insert(&self, record: TrackedVersion) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.version.clone(), record);
    }

    /// Current record for `version`, if tracked.
    pub fn get(&self, version: &str) -> Option<TrackedVersion> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(version)
            .cloned()
    }
}

#[async_trait]
impl TrackedStore for MemoryTrackedStore {
    async fn scan(&self) -> Result<Vec<TrackedVersion>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    async fn update_if(&self, expected: &TrackedVersion, updated: &TrackedVersion) -> Result<bool> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
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
        Ok(true)
    }
}
