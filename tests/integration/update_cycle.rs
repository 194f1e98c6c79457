//! End-to-end update cycles against a scripted transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rollout::core::UpdateError;
use rollout::manifest::Channel;
use rollout::schedule::{IntervalSchedule, MemoryTimeStore, UpdateSchedule};
use rollout::test_utils::{MapRequester, gzip, manifest_json};
use rollout::updater::{UpdateOutcome, Updater};
use tempfile::TempDir;

const PLATFORM: &str = "linux-x86_64";
const MANIFEST_URL: &str = "https://meta.test/myapp/linux-x86_64.json";
const BINARY_URL: &str = "https://bin.test/myapp/2.0/linux-x86_64.gz";

fn schedule() -> Box<dyn UpdateSchedule> {
    Box::new(IntervalSchedule::new(24, 0, Box::new(MemoryTimeStore::new())))
}

fn updater(install: &TempDir, version: &str, requester: Arc<MapRequester>) -> Updater {
    Updater::new(
        "myapp",
        version,
        "https://meta.test",
        "https://bin.test",
        schedule(),
    )
    .with_platform(PLATFORM)
    .with_exec_path(install.path().join("myapp"))
    .with_state_dir(install.path().join("update"))
    .with_requester(requester)
}

/// The full happy path: a newer stable version is published, the cycle
/// fetches and verifies it, swaps the binary, and fires the callback exactly
/// once. A follow-up cycle from the new version is a pure manifest check.
#[tokio::test]
async fn update_then_steady_state() {
    let install = TempDir::new().unwrap();
    std::fs::write(install.path().join("myapp"), b"binary v1").unwrap();

    let new_binary = b"binary v2, now with more bytes".to_vec();
    let requester = Arc::new(MapRequester::new());
    requester.insert(MANIFEST_URL, manifest_json("2.0", "stable", &new_binary));
    requester.insert(BINARY_URL, gzip(&new_binary));

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let mut first = updater(&install, "1.0", Arc::clone(&requester)).on_update(move |manifest| {
        assert_eq!(manifest.version, "2.0");
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let outcome = first.run().await.unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            from: "1.0".to_string(),
            to: "2.0".to_string()
        }
    );
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(
        std::fs::read(install.path().join("myapp")).unwrap(),
        new_binary
    );
    // No staging residue.
    assert!(!install.path().join(".myapp.new").exists());
    assert!(!install.path().join(".myapp.old").exists());

    // The restarted binary reports 2.0; the identical manifest now
    // short-circuits on version equality without touching the binary URL.
    let mut second = updater(&install, "2.0", Arc::clone(&requester)).force_check(true);
    let outcome = second.run().await.unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::UpToDate {
            version: "2.0".to_string()
        }
    );

    let binary_fetches = requester
        .requests()
        .iter()
        .filter(|url| url.ends_with(".gz"))
        .count();
    assert_eq!(binary_fetches, 1, "steady state must not fetch the binary");
    assert_eq!(
        std::fs::read(install.path().join("myapp")).unwrap(),
        new_binary
    );
}

/// A manifest served under the wrong channel fails the cycle before any
/// binary fetch and leaves the installation untouched.
#[tokio::test]
async fn channel_mismatch_aborts_before_binary_fetch() {
    let install = TempDir::new().unwrap();
    std::fs::write(install.path().join("myapp"), b"binary v1").unwrap();

    let requester = Arc::new(MapRequester::new());
    // The beta endpoint is (mis)serving a stable manifest.
    requester.insert(
        "https://meta.test/myapp/beta/linux-x86_64.json",
        manifest_json("2.0", "stable", b"binary v2"),
    );

    let mut updater =
        updater(&install, "1.0", Arc::clone(&requester)).with_channel(Channel::beta());
    let err = updater.run().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<UpdateError>(),
        Some(UpdateError::ChannelMismatch { .. })
    ));

    // Exactly one request went out - the manifest - and no file changed.
    assert_eq!(requester.requests().len(), 1);
    assert!(requester.requests()[0].ends_with(".json"));
    assert_eq!(
        std::fs::read(install.path().join("myapp")).unwrap(),
        b"binary v1"
    );
    assert!(!install.path().join(".myapp.new").exists());
}

/// A corrupted payload is rejected by hash verification and never applied.
#[tokio::test]
async fn corrupted_binary_is_never_applied() {
    let install = TempDir::new().unwrap();
    std::fs::write(install.path().join("myapp"), b"binary v1").unwrap();

    let advertised = b"binary v2".to_vec();
    let requester = Arc::new(MapRequester::new());
    requester.insert(MANIFEST_URL, manifest_json("2.0", "stable", &advertised));
    requester.insert(BINARY_URL, gzip(b"something else entirely"));

    let mut updater = updater(&install, "1.0", Arc::clone(&requester));
    let err = updater.run().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<UpdateError>(),
        Some(UpdateError::HashMismatch { .. })
    ));
    assert_eq!(
        std::fs::read(install.path().join("myapp")).unwrap(),
        b"binary v1"
    );
}
