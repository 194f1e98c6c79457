//! One unattended update cycle.
//!
//! [`Updater::run`] walks the whole pipeline: due-check, pre-flight
//! permission probe, manifest fetch, version comparison, binary
//! fetch-and-verify, atomic apply. Any step's failure aborts the cycle only -
//! the schedule was already advanced, so a persistent failure retries on the
//! normal cadence instead of hammering the update source.
//!
//! Two orderings here are deliberate and easy to break:
//!
//! - `schedule_next()` runs *before* the network and apply steps. A crash
//!   mid-update therefore waits for the next regular interval instead of
//!   re-firing immediately in a tight loop.
//! - Version equality short-circuits the cycle *successfully* before any
//!   binary bytes move. This is the steady-state path; it must stay cheap.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use crate::apply;
use crate::config::{ScheduleConfig, UpdateConfig};
use crate::fetch::{ReleaseFetcher, Requester};
use crate::manifest::{Channel, UpdateManifest};
use crate::paths;
use crate::schedule::{DailySchedule, FsTimeStore, IntervalSchedule, TIME_FILE, UpdateSchedule};

/// How one update cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The schedule said no check was due; nothing was fetched.
    NotDue,
    /// The published version matches the running version; no binary fetched.
    UpToDate {
        /// The version both sides agree on.
        version: String,
    },
    /// A new binary was fetched, verified, and installed.
    Updated {
        /// Version that was running when the cycle started.
        from: String,
        /// Version now installed at the canonical path.
        to: String,
    },
}

type UpdateCallback = Box<dyn Fn(&UpdateManifest) + Send + Sync>;

/// Drives the self-update pipeline for one installed binary.
///
/// Exactly one `Updater` may act on a given installation directory; mutual
/// exclusion across processes is the deployment's responsibility, not this
/// type's.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rollout::fetch::HttpRequester;
/// use rollout::manifest::Channel;
/// use rollout::schedule::{FsTimeStore, IntervalSchedule};
/// use rollout::updater::Updater;
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = FsTimeStore::new("/opt/myapp/update/cktime");
/// let schedule = IntervalSchedule::new(24, 6, Box::new(store));
/// let mut updater = Updater::new(
///     "myapp",
///     env!("CARGO_PKG_VERSION"),
///     "https://updates.example.com/meta",
///     "https://updates.example.com/bin",
///     Box::new(schedule),
/// )
/// .with_channel(Channel::beta())
/// .with_requester(Arc::new(HttpRequester::new()?));
///
/// updater.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Updater {
    app_name: String,
    current_version: String,
    manifest_url: String,
    binary_url: String,
    channel: Channel,
    state_dir: PathBuf,
    platform: String,
    force_check: bool,
    schedule: Box<dyn UpdateSchedule>,
    requester: Option<Arc<dyn Requester>>,
    exec_path: Option<PathBuf>,
    on_update: Option<UpdateCallback>,
    latest: Option<UpdateManifest>,
}

impl Updater {
    pub fn new(
        app_name: impl Into<String>,
        current_version: impl Into<String>,
        manifest_url: impl Into<String>,
        binary_url: impl Into<String>,
        schedule: Box<dyn UpdateSchedule>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            current_version: current_version.into(),
            manifest_url: manifest_url.into(),
            binary_url: binary_url.into(),
            channel: Channel::default(),
            state_dir: PathBuf::from("update"),
            platform: paths::platform(),
            force_check: false,
            schedule,
            requester: None,
            exec_path: None,
            on_update: None,
            latest: None,
        }
    }

    /// Build an updater from a loaded [`UpdateConfig`]. A relative state
    /// directory resolves against the executable's own directory. No
    /// requester is attached; callers wire their transport explicitly.
    pub fn from_config(config: &UpdateConfig) -> Result<Self> {
        let state_dir = if config.state_dir.is_absolute() {
            config.state_dir.clone()
        } else {
            executable_dir()?.join(&config.state_dir)
        };

        let store = Box::new(FsTimeStore::new(state_dir.join(TIME_FILE)));
        let schedule: Box<dyn UpdateSchedule> = match config.schedule {
            ScheduleConfig::Daily { hour } => Box::new(DailySchedule::new(hour, store)?),
            ScheduleConfig::Interval {
                base_hours,
                jitter_hours,
            } => Box::new(IntervalSchedule::new(base_hours, jitter_hours, store)),
        };

        Ok(Self::new(
            config.app_name.as_str(),
            config.current_version.as_str(),
            config.manifest_url.as_str(),
            config.binary_url.as_str(),
            schedule,
        )
        .with_channel(config.channel.clone())
        .with_state_dir(state_dir)
        .force_check(config.force_check))
    }

    /// Set the release channel to follow. Defaults to `stable`.
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    /// Set the directory holding updater state (the `cktime` file).
    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    /// Attach the transport used for manifest and binary fetches.
    pub fn with_requester(mut self, requester: Arc<dyn Requester>) -> Self {
        self.requester = Some(requester);
        self
    }

    /// Override the platform string used to address the release layout.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Override the executable to replace. Defaults to the running binary
    /// (symlinks resolved); embedders and tests point this elsewhere.
    pub fn with_exec_path(mut self, exec_path: impl Into<PathBuf>) -> Self {
        self.exec_path = Some(exec_path.into());
        self
    }

    /// Check now regardless of the persisted schedule. Dev builds stay
    /// exempt even when forced.
    pub fn force_check(mut self, force: bool) -> Self {
        self.force_check = force;
        self
    }

    /// Run `callback` after a successful update, once per applied update.
    /// Typical use is prompting for or triggering a restart.
    pub fn on_update(mut self, callback: impl Fn(&UpdateManifest) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Box::new(callback));
        self
    }

    /// The version this updater believes is currently running.
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// When the next check is due according to the persisted schedule.
    pub fn next_check(&self) -> DateTime<Utc> {
        self.schedule.next_check()
    }

    /// The manifest seen on the most recent completed check, if any.
    pub fn latest_manifest(&self) -> Option<&UpdateManifest> {
        self.latest.as_ref()
    }

    async fn resolve_exec_path(&self) -> Result<PathBuf> {
        let path = match &self.exec_path {
            Some(path) => path.clone(),
            None => std::env::current_exe().context("failed to locate the running executable")?,
        };
        // Replace the symlink target, not the symlink.
        Ok(fs::canonicalize(&path).await.unwrap_or(path))
    }

    /// Run one update cycle.
    ///
    /// Fetch and verification failures abort this cycle only; the next
    /// attempt happens on the already-persisted schedule. See
    /// [`UpdateError`](crate::core::UpdateError) for the failure kinds worth
    /// branching on - in particular `RecoveryFailed`, which means the host
    /// needs an operator.
    pub async fn run(&mut self) -> Result<UpdateOutcome> {
        fs::create_dir_all(&self.state_dir)
            .await
            .with_context(|| format!("failed to create state dir {}", self.state_dir.display()))?;

        if !self
            .schedule
            .should_check(&self.current_version, self.force_check)
        {
            return Ok(UpdateOutcome::NotDue);
        }

        let exec_path = self.resolve_exec_path().await?;
        apply::can_update(&exec_path)
            .await
            .context("update not possible")?;

        // Advance the schedule before any network traffic: a failure below
        // retries on the next regular cadence, not immediately.
        self.schedule.schedule_next();

        let fetcher = self.fetcher();
        let manifest = fetcher
            .fetch_manifest()
            .await
            .context("failed to fetch update manifest")?;

        if manifest.version == self.current_version {
            info!(version = %self.current_version, "already at the published version");
            self.latest = Some(manifest);
            return Ok(UpdateOutcome::UpToDate {
                version: self.current_version.clone(),
            });
        }

        let binary = fetcher
            .fetch_binary(&manifest)
            .await
            .context("failed to fetch update binary")?;
        apply::replace_executable(&exec_path, &binary)
            .await
            .context("failed to apply update")?;

        info!(from = %self.current_version, to = %manifest.version, "update installed");
        if let Some(callback) = &self.on_update {
            callback(&manifest);
        }

        let outcome = UpdateOutcome::Updated {
            from: self.current_version.clone(),
            to: manifest.version.clone(),
        };
        self.latest = Some(manifest);
        Ok(outcome)
    }

    fn fetcher(&self) -> ReleaseFetcher {
        let mut fetcher = ReleaseFetcher::new(
            self.app_name.as_str(),
            self.channel.clone(),
            self.manifest_url.as_str(),
            self.binary_url.as_str(),
        )
        .with_platform(self.platform.as_str());
        if let Some(requester) = &self.requester {
            fetcher = fetcher.with_requester(Arc::clone(requester));
        }
        fetcher
    }
}

fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to locate the running executable")?;
    Ok(exe
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf())
}
