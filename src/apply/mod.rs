//! Atomic replacement of the running executable.
//!
//! At every observable instant the canonical path holds exactly one of the
//! old or the new binary - never a truncated file. The protocol stages the
//! verified binary next to the live one and then moves through single
//! filesystem renames, which are atomic on POSIX filesystems:
//!
//! 1. Remove stale `.{name}.new` / `.{name}.old` left by an interrupted
//!    earlier attempt (best effort).
//! 2. Write the verified binary to `.{name}.new`, mode 0755.
//! 3. Rename the live path to `.{name}.old`.
//! 4. Rename `.{name}.new` onto the live path.
//! 5. If step 4 fails, rename `.{name}.old` back. A failed rollback is
//!    [`UpdateError::RecoveryFailed`] - the one unrecoverable state, reported
//!    distinctly so operators notice.
//! 6. Remove `.{name}.old` (best effort; a leak, not a correctness problem).
//!
//! [`can_update`] probes for write permission up front so a cycle aborts
//! before any destructive step on hosts where the install dir is read-only.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::core::UpdateError;

fn stage_paths(exec_path: &Path) -> (PathBuf, PathBuf) {
    let dir = exec_path.parent().unwrap_or_else(|| Path::new("."));
    let name = exec_path
        .file_name()
        .map_or_else(|| "binary".to_string(), |n| n.to_string_lossy().into_owned());
    (
        dir.join(format!(".{name}.new")),
        dir.join(format!(".{name}.old")),
    )
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Verify the executable's directory is writable by creating and deleting a
/// probe file named like the staging file.
///
/// # Errors
///
/// [`UpdateError::PermissionDenied`]; nothing has been modified when it is
/// returned.
pub async fn can_update(exec_path: &Path) -> Result<()> {
    let (probe, _) = stage_paths(exec_path);
    let dir = exec_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .display()
        .to_string();

    if let Err(source) = fs::write(&probe, b"").await {
        return Err(UpdateError::PermissionDenied { dir, source }.into());
    }
    if let Err(source) = fs::remove_file(&probe).await {
        return Err(UpdateError::PermissionDenied { dir, source }.into());
    }
    Ok(())
}

/// Replace the binary at `exec_path` with `new_binary`.
///
/// # Errors
///
/// - [`UpdateError::ApplyFailed`]: a swap step failed but the previous binary
///   is back at the canonical path; safe to retry later.
/// - [`UpdateError::RecoveryFailed`]: the swap *and* the rollback failed; the
///   canonical path may be empty and an operator must intervene.
pub async fn replace_executable(exec_path: &Path, new_binary: &[u8]) -> Result<()> {
    let (new_path, old_path) = stage_paths(exec_path);

    // Leftovers from a previous interrupted attempt.
    let _ = fs::remove_file(&new_path).await;
    let _ = fs::remove_file(&old_path).await;

    fs::write(&new_path, new_binary)
        .await
        .with_context(|| format!("failed to stage new binary at {}", new_path.display()))?;
    mark_executable(&new_path)
        .await
        .with_context(|| format!("failed to mark {} executable", new_path.display()))?;

    // From here on the live path is only ever touched by single renames.
    if let Err(source) = fs::rename(exec_path, &old_path).await {
        return Err(UpdateError::ApplyFailed {
            step: "retire the current binary",
            source,
        }
        .into());
    }

    if let Err(apply) = fs::rename(&new_path, exec_path).await {
        return match fs::rename(&old_path, exec_path).await {
            Ok(()) => Err(UpdateError::ApplyFailed {
                step: "install the new binary",
                source: apply,
            }
            .into()),
            Err(rollback) => Err(UpdateError::RecoveryFailed { apply, rollback }.into()),
        };
    }

    debug!(path = %exec_path.display(), "binary replaced");
    if let Err(err) = fs::remove_file(&old_path).await {
        warn!(%err, path = %old_path.display(), "failed to remove retired binary");
    }
    Ok(())
}
