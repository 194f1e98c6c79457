//! The promotion pipeline over filesystem stores, plus the hand-off to the
//! update pipeline: a version promoted to stable becomes fetchable by a
//! stable-channel updater.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rollout::manifest::{Channel, TrackedVersion, UpdateManifest, sha256};
use rollout::paths;
use rollout::promote::{ChannelPromoter, ObjectStore, PromotionGates, TrackedStore};
use rollout::store::{FsObjectStore, FsTrackedStore};
use rollout::test_utils::gzip;
use tempfile::TempDir;

const PLATFORM: &str = "linux-x86_64";

struct Layout {
    _root: TempDir,
    objects: Arc<FsObjectStore>,
    tracked: Arc<FsTrackedStore>,
    promoter: ChannelPromoter,
}

fn layout() -> Layout {
    let root = TempDir::new().unwrap();
    let objects = Arc::new(FsObjectStore::new(root.path()));
    let tracked = Arc::new(FsTrackedStore::new(root.path().join("tracking.json")));
    let promoter = ChannelPromoter::new(
        "myapp",
        Arc::clone(&objects) as Arc<dyn ObjectStore>,
        Arc::clone(&tracked) as Arc<dyn TrackedStore>,
    )
    .with_platforms(vec![PLATFORM.to_string()]);
    Layout {
        _root: root,
        objects,
        tracked,
        promoter,
    }
}

async fn publish(layout: &Layout, version: &str, channel: &Channel, binary: &[u8], age_hours: i64) {
    let manifest = UpdateManifest {
        version: version.to_string(),
        sha256: sha256(binary).to_vec(),
        channel: channel.clone(),
        date: Utc::now() - Duration::hours(age_hours),
    };
    layout
        .objects
        .put(
            &paths::manifest_key("myapp", channel, PLATFORM),
            &serde_json::to_vec(&manifest).unwrap(),
        )
        .await
        .unwrap();
    layout
        .objects
        .put(
            &paths::binary_key("myapp", channel, version, PLATFORM),
            &gzip(binary),
        )
        .await
        .unwrap();
    layout
        .tracked
        .insert(TrackedVersion {
            version: version.to_string(),
            channel: channel.clone(),
            date: Utc::now() - Duration::hours(age_hours),
            dev_approved: false,
            beta_approved: false,
        })
        .await
        .unwrap();
}

/// A version walks the whole lifecycle: published to dev, promoted to beta
/// after the dev soak, then to stable after the beta soak - one approval
/// flag per hop, never more than one hop per scan.
#[tokio::test]
async fn version_walks_dev_to_stable() {
    let layout = layout();
    let binary = b"release build 1.0".to_vec();
    publish(&layout, "1.0", &Channel::dev(), &binary, 25).await;

    // First scan: dev -> beta.
    let report = layout.promoter.run_once().await.unwrap();
    assert_eq!(report.promoted.len(), 1);
    assert_eq!(report.promoted[0].to, Channel::beta());

    let records = layout.tracked.scan().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].channel, Channel::beta());
    assert!(records[0].dev_approved);
    assert!(!records[0].beta_approved);

    // Immediately after: the beta clock restarted, nothing moves. This is
    // the "promoted exactly once even if the promoter runs twice" property.
    let report = layout.promoter.run_once().await.unwrap();
    assert!(report.promoted.is_empty());
    assert_eq!(report.failed, 0);

    // Age the beta record past the 72h soak and scan again: beta -> stable.
    let mut aged = layout.tracked.scan().await.unwrap().remove(0);
    aged.date = Utc::now() - Duration::hours(73);
    layout.tracked.insert(aged).await.unwrap();

    let report = layout.promoter.run_once().await.unwrap();
    assert_eq!(report.promoted.len(), 1);
    assert_eq!(report.promoted[0].from, Channel::beta());
    assert_eq!(report.promoted[0].to, Channel::stable());

    let record = &layout.tracked.scan().await.unwrap()[0];
    assert_eq!(record.channel, Channel::stable());
    assert!(record.dev_approved && record.beta_approved);

    // The stable manifest sits at the channel-less key with the same digest,
    // and the binary object was copied verbatim.
    let raw = layout
        .objects
        .get(&paths::manifest_key("myapp", &Channel::stable(), PLATFORM))
        .await
        .unwrap();
    let stable: UpdateManifest = serde_json::from_slice(&raw).unwrap();
    assert_eq!(stable.version, "1.0");
    assert_eq!(stable.channel, Channel::stable());
    assert_eq!(stable.sha256, sha256(&binary));

    let stable_binary = layout
        .objects
        .get(&paths::binary_key("myapp", &Channel::stable(), "1.0", PLATFORM))
        .await
        .unwrap();
    assert_eq!(stable_binary, gzip(&binary));

    // Fully promoted records are terminal; further scans are no-ops.
    let report = layout.promoter.run_once().await.unwrap();
    assert!(report.promoted.is_empty());
}

/// A record younger than the dev soak never moves, whatever the scan count.
#[tokio::test]
async fn young_version_stays_in_dev() {
    let layout = layout();
    publish(&layout, "1.1", &Channel::dev(), b"too young", 2).await;

    for _ in 0..3 {
        let report = layout.promoter.run_once().await.unwrap();
        assert!(report.promoted.is_empty());
    }
    let record = &layout.tracked.scan().await.unwrap()[0];
    assert_eq!(record.channel, Channel::dev());
    assert!(!record.dev_approved);
}

/// A record whose artifacts are missing fails alone; the rest of the scan
/// proceeds.
#[tokio::test]
async fn broken_record_does_not_stall_others() {
    let layout = layout();
    publish(&layout, "1.0", &Channel::dev(), b"good", 30).await;
    // Track a version that was never actually published.
    layout
        .tracked
        .insert(TrackedVersion {
            version: "0.9".to_string(),
            channel: Channel::dev(),
            date: Utc::now() - Duration::hours(30),
            dev_approved: false,
            beta_approved: false,
        })
        .await
        .unwrap();

    let report = layout.promoter.run_once().await.unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.promoted.len(), 1);
    assert_eq!(report.promoted[0].version, "1.0");
}

/// Custom gates shorten the soak times; a deployment that wants a faster
/// pipeline configures them rather than editing records.
#[tokio::test]
async fn custom_gates_apply() {
    let layout = layout();
    let promoter = ChannelPromoter::new(
        "myapp",
        Arc::clone(&layout.objects) as Arc<dyn ObjectStore>,
        Arc::clone(&layout.tracked) as Arc<dyn TrackedStore>,
    )
    .with_platforms(vec![PLATFORM.to_string()])
    .with_gates(PromotionGates {
        min_time_in_dev: Duration::hours(1),
        min_time_in_beta: Duration::hours(2),
    });

    publish(&layout, "3.0", &Channel::dev(), b"fast lane", 2).await;
    let report = promoter.run_once().await.unwrap();
    assert_eq!(report.promoted.len(), 1);
    assert_eq!(report.promoted[0].to, Channel::beta());
}
