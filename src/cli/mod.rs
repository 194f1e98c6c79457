//! Command-line interface for rollout.
//!
//! Three subcommands cover both halves of the system:
//!
//! - `check` - run one update cycle (due-check, fetch, verify, apply)
//! - `status` - show the configured version, channel, and next scheduled check
//! - `promote` - run one promotion pass over a filesystem release layout;
//!   the deployment's scheduler (cron, a timer unit, a scheduled function)
//!   invokes this as its "tick"
//!
//! ```bash
//! rollout check --force
//! rollout status
//! rollout promote --root /srv/updates --tracking /srv/updates/tracking.json \
//!     --app myapp --platform linux-x86_64
//! ```

mod check;
mod promote;
mod status;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Top-level CLI definition.
#[derive(Parser)]
#[command(
    name = "rollout",
    version,
    about = "Self-updating binaries with staged channel rollout"
)]
pub struct Cli {
    /// Increase log verbosity (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one update cycle: check the schedule, fetch, verify, and apply
    Check(check::CheckArgs),
    /// Show the configured version and the next scheduled check
    Status(status::StatusArgs),
    /// Run one promotion pass over a filesystem release layout
    Promote(promote::PromoteArgs),
}

impl Cli {
    /// Install the tracing subscriber. `RUST_LOG` wins when set.
    pub fn init_logging(&self) {
        let filter = match self.verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            1 => EnvFilter::new("info"),
            _ => EnvFilter::new("debug"),
        };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }

    /// Dispatch to the selected subcommand.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Check(cmd) => cmd.execute().await,
            Commands::Status(cmd) => cmd.execute().await,
            Commands::Promote(cmd) => cmd.execute().await,
        }
    }
}
