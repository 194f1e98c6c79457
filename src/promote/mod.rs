//! Channel promotion: dev -> beta -> stable.
//!
//! [`ChannelPromoter::run_once`] is triggered periodically by an external
//! signal (a cron tick, a scheduled cloud function, the `rollout promote`
//! subcommand). Each run scans every tracked version and independently
//! evaluates the time/approval gates:
//!
//! - `dev`, at least [`min_time_in_dev`](PromotionGates::min_time_in_dev)
//!   old, not yet dev-approved: promote to `beta`.
//! - `beta`, at least [`min_time_in_beta`](PromotionGates::min_time_in_beta)
//!   old, dev-approved but not beta-approved: promote to `stable`.
//!
//! Promotion copies the manifest (with refreshed channel and date) and the
//! binary object to the destination channel, then records the approval with a
//! *conditional* write through [`TrackedStore::update_if`]. Overlapping scans
//! may both copy the objects - the copies are byte-identical, so that is
//! harmless - but at most one of them records the promotion. Per-record
//! failures are logged and never abort the rest of the scan.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::manifest::{Channel, TrackedVersion, UpdateManifest};
use crate::paths;

/// Read/write/copy contract of the channel-addressed artifact store.
///
/// The production backend is an S3-like object store owned by the deployment;
/// this crate ships filesystem and in-memory implementations in
/// [`store`](crate::store).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn put(&self, key: &str, body: &[u8]) -> Result<()>;
    async fn copy(&self, from: &str, to: &str) -> Result<()>;
}

/// Scan/conditional-update contract of the tracked-version record store.
#[async_trait]
pub trait TrackedStore: Send + Sync {
    /// All tracked records, in no particular order.
    async fn scan(&self) -> Result<Vec<TrackedVersion>>;

    /// Write `updated` only if the stored record for the same version still
    /// carries `expected`'s channel and approval flags. Returns `false`
    /// (without writing) when the record changed since it was read or no
    /// longer exists - the caller lost the race to a concurrent scan.
    async fn update_if(&self, expected: &TrackedVersion, updated: &TrackedVersion) -> Result<bool>;
}

/// Minimum ages a version must accumulate before leaving a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionGates {
    /// Minimum time in `dev` before promotion to `beta`.
    pub min_time_in_dev: Duration,
    /// Minimum time in `beta` before promotion to `stable`.
    pub min_time_in_beta: Duration,
}

impl Default for PromotionGates {
    fn default() -> Self {
        Self {
            min_time_in_dev: Duration::hours(24),
            min_time_in_beta: Duration::hours(72),
        }
    }
}

/// One recorded promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub version: String,
    pub from: Channel,
    pub to: Channel,
}

/// Result of one promotion scan.
#[derive(Debug, Default)]
pub struct PromotionReport {
    /// Records examined.
    pub examined: usize,
    /// Promotions recorded this run.
    pub promoted: Vec<Promotion>,
    /// Records whose promotion failed (logged, scan continued).
    pub failed: usize,
}

/// Advances tracked versions through the channel lifecycle.
pub struct ChannelPromoter {
    app_name: String,
    platforms: Vec<String>,
    gates: PromotionGates,
    objects: Arc<dyn ObjectStore>,
    tracked: Arc<dyn TrackedStore>,
}

impl ChannelPromoter {
    pub fn new(
        app_name: impl Into<String>,
        objects: Arc<dyn ObjectStore>,
        tracked: Arc<dyn TrackedStore>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            platforms: vec![paths::platform()],
            gates: PromotionGates::default(),
            objects,
            tracked,
        }
    }

    /// Set the platforms whose manifest/binary pairs are copied on
    /// promotion. Defaults to the platform the promoter itself runs on.
    pub fn with_platforms(mut self, platforms: Vec<String>) -> Self {
        self.platforms = platforms;
        self
    }

    /// Override the promotion age gates.
    pub fn with_gates(mut self, gates: PromotionGates) -> Self {
        self.gates = gates;
        self
    }

    /// Scan all tracked versions and promote every record that passes its
    /// gate. One bad record never stalls the rest of the scan.
    pub async fn run_once(&self) -> Result<PromotionReport> {
        let records = self
            .tracked
            .scan()
            .await
            .context("failed to scan tracked versions")?;

        let mut report = PromotionReport::default();
        for record in records {
            report.examined += 1;
            let Some((from, to)) = self.eligible(&record, Utc::now()) else {
                continue;
            };
            match self.promote(&record, &from, &to).await {
                Ok(true) => {
                    info!(version = %record.version, %from, %to, "promoted");
                    report.promoted.push(Promotion {
                        version: record.version.clone(),
                        from,
                        to,
                    });
                }
                // A concurrent scan recorded this promotion first.
                Ok(false) => {}
                Err(err) => {
                    warn!(version = %record.version, %from, %to, error = %format!("{err:#}"), "promotion failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    fn eligible(&self, record: &TrackedVersion, now: DateTime<Utc>) -> Option<(Channel, Channel)> {
        let age = now - record.date;
        match record.channel.as_str() {
            "dev" if age >= self.gates.min_time_in_dev && !record.dev_approved => {
                Some((Channel::dev(), Channel::beta()))
            }
            "beta"
                if age >= self.gates.min_time_in_beta
                    && record.dev_approved
                    && !record.beta_approved =>
            {
                Some((Channel::beta(), Channel::stable()))
            }
            _ => None,
        }
    }

    async fn promote(&self, record: &TrackedVersion, from: &Channel, to: &Channel) -> Result<bool> {
        let now = Utc::now();

        for platform in &self.platforms {
            let source_key = paths::manifest_key(&self.app_name, from, platform);
            let raw = self
                .objects
                .get(&source_key)
                .await
                .with_context(|| format!("failed to read source manifest {source_key}"))?;
            let manifest: UpdateManifest = serde_json::from_slice(&raw)
                .with_context(|| format!("malformed manifest at {source_key}"))?;

            if manifest.version != record.version {
                // The channel head has already moved past this version.
                warn!(
                    platform,
                    head = %manifest.version,
                    tracked = %record.version,
                    "source channel no longer serves the tracked version, skipping platform"
                );
                continue;
            }

            let promoted = manifest.promoted(to.clone(), now);
            let dest_key = paths::manifest_key(&self.app_name, to, platform);
            self.objects
                .put(&dest_key, &serde_json::to_vec(&promoted)?)
                .await
                .with_context(|| format!("failed to write manifest {dest_key}"))?;

            // The digest travels with the manifest; the binary is copied
            // verbatim, no re-verification.
            let bin_from = paths::binary_key(&self.app_name, from, &record.version, platform);
            let bin_to = paths::binary_key(&self.app_name, to, &record.version, platform);
            self.objects
                .copy(&bin_from, &bin_to)
                .await
                .with_context(|| format!("failed to copy binary {bin_from} -> {bin_to}"))?;
        }

        let mut updated = record.clone();
        updated.channel = to.clone();
        updated.date = now;
        if *to == Channel::beta() {
            updated.dev_approved = true;
        }
        if *to == Channel::stable() {
            updated.beta_approved = true;
        }

        let applied = self
            .tracked
            .update_if(record, &updated)
            .await
            .with_context(|| format!("failed to update tracked record for {}", record.version))?;
        if !applied {
            info!(version = %record.version, "tracked record changed under us; promotion not recorded");
        }
        Ok(applied)
    }
}
