//! Error handling for rollout.
//!
//! Fallible functions in this crate return [`anyhow::Result`] and attach
//! human-readable context as errors travel up the call chain. The failure
//! kinds a caller may need to branch on are expressed as [`UpdateError`]
//! variants placed into that chain, recoverable with
//! `err.downcast_ref::<UpdateError>()`.
//!
//! Two variants deserve special attention:
//!
//! - [`UpdateError::ApplyFailed`] means a swap step failed but the previous
//!   binary was restored. The installation is intact and the update will be
//!   retried on the next scheduled cycle.
//! - [`UpdateError::RecoveryFailed`] means the swap failed *and* restoring the
//!   previous binary failed. The canonical executable path may now be empty.
//!   This is the one state the updater cannot recover from on its own and it
//!   must be surfaced to an operator rather than silently retried.

use thiserror::Error;

/// Failure kinds produced by the update and promotion pipelines.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// No transport was configured for update checks.
    ///
    /// The updater refuses to guess at a default transport; construct one
    /// explicitly (e.g. [`HttpRequester`](crate::fetch::HttpRequester)) and
    /// attach it with [`Updater::with_requester`](crate::updater::Updater::with_requester).
    #[error("no requester configured")]
    NoRequester,

    /// The requester reported success but produced no content.
    #[error("fetch returned no content: {url}")]
    EmptyFetchResult {
        /// URL that produced the empty response.
        url: String,
    },

    /// The manifest's digest field is not a valid SHA-256 digest.
    #[error("invalid hash in update manifest: expected {expected} bytes, got {actual}")]
    InvalidHash {
        /// Expected digest length in bytes (32 for SHA-256).
        expected: usize,
        /// Length actually present in the manifest.
        actual: usize,
    },

    /// The manifest was published for a different channel than the one
    /// requested. Guards against cross-channel URL or cache poisoning.
    #[error("update channel mismatch: expected {expected}, got {actual}")]
    ChannelMismatch {
        /// Channel the client asked for.
        expected: String,
        /// Channel declared inside the fetched manifest.
        actual: String,
    },

    /// The downloaded binary does not match the digest declared in the
    /// manifest. The payload is discarded, never applied.
    #[error("binary hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Hex-encoded digest from the manifest.
        expected: String,
        /// Hex-encoded digest of the downloaded payload.
        actual: String,
    },

    /// The executable's directory is not writable. Raised by the pre-flight
    /// probe before any destructive step; nothing was modified.
    #[error("no write permission in {dir}")]
    PermissionDenied {
        /// Directory that failed the write probe.
        dir: String,
        #[source]
        source: std::io::Error,
    },

    /// A swap step failed but the previous binary is back in place at the
    /// canonical path. Safe to retry on the next scheduled cycle.
    #[error("failed to {step}; previous binary left in place")]
    ApplyFailed {
        /// The swap step that failed.
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The swap failed and rolling the previous binary back also failed. The
    /// canonical path may be missing an executable; requires operator
    /// intervention.
    #[error("failed to recover from update error: {rollback} (original error: {apply})")]
    RecoveryFailed {
        /// The error that broke the swap.
        apply: std::io::Error,
        /// The error that then broke the rollback.
        rollback: std::io::Error,
    },
}
