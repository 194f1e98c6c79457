//! rollout - self-updating binaries with staged channel rollout.
//!
//! A deployed binary discovers, verifies, and atomically replaces itself with a
//! newer build published on a release channel (dev/beta/stable). A separate
//! control loop promotes a build between channels once it has accumulated
//! enough age and approval.
//!
//! # Architecture Overview
//!
//! The crate is organized around three coupled pieces:
//!
//! - The client-side **update pipeline**: [`schedule`] decides when a check is
//!   due, [`fetch`] retrieves and validates the published manifest and binary,
//!   [`apply`] swaps the running executable on disk, and [`updater`] ties them
//!   into one unattended cycle.
//! - The **atomic replacement protocol** in [`apply`], which survives
//!   interruption at any step without leaving the host with a missing or
//!   truncated executable.
//! - The **channel promotion loop** in [`promote`], a time-gated approval
//!   workflow that moves a version's visibility forward (dev -> beta ->
//!   stable) without ever recording the same promotion twice.
//!
//! # Release Layout
//!
//! Updates are published as a channel-addressed object layout. The channel
//! path segment is omitted for `stable`:
//!
//! ```text
//! {app}/[{channel}/]{os}-{arch}.json          update manifest
//! {app}/[{channel}/]{version}/{os}-{arch}.gz  gzipped binary payload
//! ```
//!
//! The manifest is a small JSON record carrying the version, the SHA-256
//! digest of the uncompressed binary, the channel it was published to, and the
//! publication time. A binary is never applied without verifying it against
//! the manifest digest.
//!
//! # Core Modules
//!
//! - [`updater`] - one update cycle: due-check, fetch, verify, apply
//! - [`schedule`] - daily and interval-with-jitter check scheduling
//! - [`fetch`] - transport trait plus manifest/binary retrieval and validation
//! - [`apply`] - atomic executable replacement with rollback
//! - [`promote`] - channel promotion over pluggable object/record stores
//! - [`store`] - filesystem and in-memory store backends
//! - [`manifest`] - wire-format data model shared by all of the above
//! - [`config`] - TOML configuration consumed by the CLI and embedders
//! - [`cli`] - the `rollout` command-line interface
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rollout::fetch::HttpRequester;
//! use rollout::updater::Updater;
//! use rollout::config::UpdateConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdateConfig::load().await?;
//! let mut updater = Updater::from_config(&config)?
//!     .with_requester(Arc::new(HttpRequester::new()?));
//! updater.run().await?;
//! # Ok(())
//! # }
//! ```

// Client-side update pipeline
pub mod apply;
pub mod fetch;
pub mod schedule;
pub mod updater;

// Channel promotion control loop
pub mod promote;
pub mod store;

// Shared data model and plumbing
pub mod config;
pub mod core;
pub mod manifest;
pub mod paths;

// Command-line interface
pub mod cli;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
