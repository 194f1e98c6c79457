use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::UpdateConfig;
use crate::fetch::HttpRequester;
use crate::updater::{UpdateOutcome, Updater};

/// Arguments for `rollout check`.
///
/// Runs one full update cycle against the configured release channel. The
/// cycle is a no-op unless the persisted schedule says a check is due (or
/// `--force` is given), and a no-op again when the published version matches
/// the running one.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Check now regardless of the persisted schedule
    #[arg(long)]
    pub force: bool,

    /// Path to the config file (default: ~/.rollout/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl CheckArgs {
    pub async fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => UpdateConfig::load_from(path).await?,
            None => UpdateConfig::load().await?,
        };

        let mut updater = Updater::from_config(&config)?
            .with_requester(Arc::new(HttpRequester::new()?))
            .force_check(config.force_check || self.force)
            .on_update(|manifest| {
                println!(
                    "{} restart to start running {}",
                    "note:".yellow().bold(),
                    manifest.version
                );
            });

        match updater.run().await? {
            UpdateOutcome::NotDue => {
                println!(
                    "no check due; next check at {}",
                    updater.next_check().to_rfc3339().dimmed()
                );
            }
            UpdateOutcome::UpToDate { version } => {
                println!("{} {version}", "up to date:".green());
            }
            UpdateOutcome::Updated { from, to } => {
                println!("{} {from} -> {to}", "updated:".green().bold());
            }
        }
        Ok(())
    }
}
