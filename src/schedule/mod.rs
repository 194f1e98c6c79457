//! Update check scheduling.
//!
//! An [`UpdateSchedule`] decides whether a check is due now and persists the
//! next due instant through a [`TimeStore`]. Two policies exist:
//!
//! - [`DailySchedule`]: check once per day at a fixed local hour. Suits
//!   fleets that want updates inside a maintenance window.
//! - [`IntervalSchedule`]: check every `base_hours`, plus a uniformly random
//!   spread of up to `jitter_hours` so a fleet rebooted together does not
//!   stampede the update source on the same tick.
//!
//! Both policies share two overrides, evaluated in this order: a binary whose
//! version is `dev` is never due (local builds must not replace themselves
//! with a published release, even when a check is forced), and `force` makes
//! the check due regardless of the persisted state.

mod time_store;

pub use time_store::{FsTimeStore, MemoryTimeStore, TimeStore};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, LocalResult, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, info, warn};

/// File name of the persisted "next check" timestamp, relative to the
/// updater's state directory.
pub const TIME_FILE: &str = "cktime";

/// Version string of binaries that never self-update.
const DEV_VERSION: &str = "dev";

/// Decides when update checks run.
pub trait UpdateSchedule: Send {
    /// Whether a check should run now.
    fn should_check(&self, current_version: &str, force: bool) -> bool;

    /// Compute and persist the next due instant.
    fn schedule_next(&mut self);

    /// The persisted next due instant.
    fn next_check(&self) -> DateTime<Utc>;
}

fn due_now(store: &dyn TimeStore, current_version: &str, force: bool) -> bool {
    if current_version == DEV_VERSION {
        debug!("dev build, skipping update check");
        return false;
    }
    if force {
        info!("forced update check requested");
        return true;
    }
    let next = store.load();
    if next > Utc::now() {
        debug!(next_check = %next.to_rfc3339(), "next update check scheduled for later");
        return false;
    }
    true
}

fn persist(store: &dyn TimeStore, next: DateTime<Utc>) {
    if let Err(err) = store.store(next) {
        warn!(%err, "failed to persist next check time");
    }
}

/// Check once per day at a fixed local hour.
pub struct DailySchedule {
    at: NaiveTime,
    store: Box<dyn TimeStore>,
}

impl DailySchedule {
    /// `hour` is the local hour of day, 0-23.
    pub fn new(hour: u32, store: Box<dyn TimeStore>) -> Result<Self> {
        let at = NaiveTime::from_hms_opt(hour, 0, 0)
            .with_context(|| format!("scheduled hour must be 0-23, got {hour}"))?;
        Ok(Self { at, store })
    }

    fn next_from(&self, now: DateTime<Local>) -> DateTime<Local> {
        let mut next = match now.with_time(self.at) {
            LocalResult::Single(at) => at,
            LocalResult::Ambiguous(earliest, _) => earliest,
            // The scheduled hour does not exist today (DST gap); push a day out.
            LocalResult::None => now + Duration::hours(24),
        };
        if next < now {
            next += Duration::hours(24);
        }
        next
    }
}

impl UpdateSchedule for DailySchedule {
    fn should_check(&self, current_version: &str, force: bool) -> bool {
        due_now(self.store.as_ref(), current_version, force)
    }

    fn schedule_next(&mut self) {
        let next = self.next_from(Local::now());
        persist(self.store.as_ref(), next.with_timezone(&Utc));
    }

    fn next_check(&self) -> DateTime<Utc> {
        self.store.load()
    }
}

/// Check every `base_hours`, plus up to `jitter_hours` of random spread.
pub struct IntervalSchedule {
    base_hours: u64,
    jitter_hours: u64,
    store: Box<dyn TimeStore>,
    rng: Box<dyn RngCore + Send>,
}

impl IntervalSchedule {
    pub fn new(base_hours: u64, jitter_hours: u64, store: Box<dyn TimeStore>) -> Self {
        Self {
            base_hours,
            jitter_hours,
            store,
            rng: Box::new(StdRng::from_os_rng()),
        }
    }

    /// Replace the jitter source, e.g. with a seeded generator in tests.
    pub fn with_rng(mut self, rng: Box<dyn RngCore + Send>) -> Self {
        self.rng = rng;
        self
    }
}

impl UpdateSchedule for IntervalSchedule {
    fn should_check(&self, current_version: &str, force: bool) -> bool {
        due_now(self.store.as_ref(), current_version, force)
    }

    fn schedule_next(&mut self) {
        let mut hours = self.base_hours;
        if self.jitter_hours > 0 {
            hours += self.rng.random_range(0..=self.jitter_hours);
        }
        let next = Utc::now() + Duration::hours(hours as i64);
        persist(self.store.as_ref(), next);
    }

    fn next_check(&self) -> DateTime<Utc> {
        self.store.load()
    }
}
