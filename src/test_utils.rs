//! Shared helpers for unit and integration tests.
//!
//! Available to integration tests through the `test-utils` feature (the
//! crate depends on itself with that feature in dev-dependencies).

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Mutex, Once, PoisonError};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::fetch::Requester;
use crate::manifest::{Channel, UpdateManifest, sha256};

static INIT_LOGGING: Once = Once::new();

/// Initialize tracing for tests. Honors `RUST_LOG` when no level is given;
/// stays silent when neither is set.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Scripted [`Requester`] serving canned responses by exact URL and
/// recording every fetch it sees.
#[derive(Default)]
pub struct MapRequester {
    responses: Mutex<HashMap<String, Vec<u8>>>,
    empty: Mutex<HashSet<String>>,
    requests: Mutex<Vec<String>>,
}

impl MapRequester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn insert(&self, url: &str, body: Vec<u8>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), body);
    }

    /// Serve the degenerate "success with no content" response for `url`.
    pub fn insert_empty(&self, url: &str) {
        self.empty
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string());
    }

    /// Every URL fetched so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Requester for MapRequester {
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        if self
            .empty
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
        {
            return Ok(None);
        }
        let body = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned();
        match body {
            Some(body) => Ok(Some(body)),
            None => bail!("not found: {url}"),
        }
    }
}

/// Gzip `bytes` the way the publisher does.
pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// A wire manifest for `binary` as the publisher would emit it.
pub fn manifest_json(version: &str, channel: &str, binary: &[u8]) -> Vec<u8> {
    let manifest = UpdateManifest {
        version: version.to_string(),
        sha256: sha256(binary).to_vec(),
        channel: Channel::new(channel),
        date: Utc::now(),
    };
    serde_json::to_vec(&manifest).expect("serialize manifest")
}
