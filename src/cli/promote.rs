use anyhow::{Result, bail};
use chrono::Duration;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::paths;
use crate::promote::{ChannelPromoter, ObjectStore, PromotionGates, TrackedStore};
use crate::store::{FsObjectStore, FsTrackedStore};

/// Arguments for `rollout promote`.
///
/// One promotion pass over a filesystem release layout. Intended to be fired
/// by whatever scheduler the deployment already has - cron, a systemd timer,
/// a scheduled cloud function shelling out. All state lives in the layout
/// and the tracking file; the command itself is stateless.
#[derive(Parser, Debug)]
pub struct PromoteArgs {
    /// Root directory of the channel-addressed release layout
    #[arg(long, value_name = "DIR")]
    pub root: PathBuf,

    /// Path to the tracked-versions JSON file
    #[arg(long, value_name = "FILE")]
    pub tracking: PathBuf,

    /// Application name in the release layout
    #[arg(long)]
    pub app: String,

    /// Platform to promote, repeatable (default: the current platform)
    #[arg(long = "platform", value_name = "OS-ARCH")]
    pub platforms: Vec<String>,

    /// Minimum hours a version must sit in dev before promotion to beta
    #[arg(long, default_value_t = 24)]
    pub min_dev_hours: i64,

    /// Minimum hours a version must sit in beta before promotion to stable
    #[arg(long, default_value_t = 72)]
    pub min_beta_hours: i64,
}

impl PromoteArgs {
    pub async fn execute(self) -> Result<()> {
        let platforms = if self.platforms.is_empty() {
            vec![paths::platform()]
        } else {
            self.platforms.clone()
        };
        let gates = PromotionGates {
            min_time_in_dev: Duration::hours(self.min_dev_hours),
            min_time_in_beta: Duration::hours(self.min_beta_hours),
        };

        let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(&self.root));
        let tracked: Arc<dyn TrackedStore> = Arc::new(FsTrackedStore::new(&self.tracking));
        let promoter = ChannelPromoter::new(self.app.as_str(), objects, tracked)
            .with_platforms(platforms)
            .with_gates(gates);

        let report = promoter.run_once().await?;
        for promotion in &report.promoted {
            println!(
                "{} {} {} -> {}",
                "promoted:".green().bold(),
                promotion.version,
                promotion.from,
                promotion.to
            );
        }
        println!(
            "{} records examined, {} promoted, {} failed",
            report.examined,
            report.promoted.len(),
            report.failed
        );

        if report.failed > 0 {
            bail!("{} promotion(s) failed; see the log above", report.failed);
        }
        Ok(())
    }
}
