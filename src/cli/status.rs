use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;

use crate::config::UpdateConfig;
use crate::updater::Updater;

/// Arguments for `rollout status`.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Path to the config file (default: ~/.rollout/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl StatusArgs {
    pub async fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => UpdateConfig::load_from(path).await?,
            None => UpdateConfig::load().await?,
        };
        let updater = Updater::from_config(&config)?;

        println!("app:        {}", config.app_name);
        println!("version:    {}", config.current_version);
        println!("channel:    {}", config.channel);
        let next = updater.next_check();
        if next <= Utc::now() {
            println!("next check: due now");
        } else {
            println!("next check: {}", format_instant(next));
        }
        Ok(())
    }
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
