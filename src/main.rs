//! rollout CLI entry point.
//!
//! Parses arguments, installs the tracing subscriber, and dispatches to the
//! subcommands in [`rollout::cli`].

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use rollout::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}
