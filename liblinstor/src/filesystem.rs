//! Local filesystem helper: format, mount and unmount block devices.
//!
//! [`Filesystem`] is the seam the volume store mounts through;
//! [`HostFilesystem`] implements it with the host's `blkid`, `mkfs.<type>`
//! and `mount` tools plus `umount(2)`.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::error::LinstorError;

/// `blkid` exit status when the probed device holds no recognizable data.
const BLKID_NOTHING_FOUND: i32 = 2;

/// Format and mount operations needed on a node.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Create a `fs_type` filesystem on `device` unless it already has one.
    ///
    /// A device that already holds a different filesystem is never
    /// reformatted.
    async fn safe_format(
        &self,
        device: &str,
        fs_type: &str,
        fs_opts: &str,
    ) -> Result<(), LinstorError>;

    /// Mount `source` at `target`. `mount_opts` is a comma separated list.
    async fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        mount_opts: &str,
    ) -> Result<(), LinstorError>;

    /// Unmount whatever is mounted at `target`.
    async fn unmount(&self, target: &str) -> Result<(), LinstorError>;
}

/// [`Filesystem`] backed by the host's tools and mount table.
#[derive(Debug, Clone, Default)]
pub struct HostFilesystem;

impl HostFilesystem {
    pub fn new() -> Self {
        Self
    }

    /// Filesystem type currently on `device`, `None` if it is blank.
    async fn probe(&self, device: &str) -> Result<Option<String>, LinstorError> {
        let output = Command::new("blkid")
            .args(["-o", "value", "-s", "TYPE", device])
            .output()
            .await
            .map_err(|e| LinstorError::Format {
                device: device.to_owned(),
                reason: format!("failed to run blkid: {e}"),
            })?;

        match output.status.code() {
            Some(0) => {
                let fs = String::from_utf8_lossy(&output.stdout).trim().to_owned();
                Ok((!fs.is_empty()).then_some(fs))
            }
            Some(BLKID_NOTHING_FOUND) => Ok(None),
            code => Err(LinstorError::Format {
                device: device.to_owned(),
                reason: format!(
                    "blkid exited with {code:?}: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }),
        }
    }
}

/// Return `true` if `path` is currently listed as a mount point in
/// `/proc/self/mounts`.
///
/// `/proc/self/mounts` escapes whitespace in paths (`\040`); mount targets
/// handed to this crate are not expected to contain any.
async fn is_mountpoint(path: &str) -> bool {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    let contents = match tokio::fs::read_to_string("/proc/self/mounts").await {
        Ok(c) => c,
        Err(_) => return false,
    };
    // Format: <device> <mountpoint> <fstype> <options> <dump> <pass>
    contents
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(path))
}

/// Arguments for `mkfs.<type>`: the caller's options, then the device.
fn mkfs_args(device: &str, fs_opts: &str) -> Vec<String> {
    fs_opts
        .split_whitespace()
        .chain(std::iter::once(device))
        .map(str::to_owned)
        .collect()
}

/// Arguments for `mount`.
fn mount_args(source: &str, target: &str, fs_type: &str, mount_opts: &str) -> Vec<String> {
    let mut args = vec!["-t".to_owned(), fs_type.to_owned()];
    if !mount_opts.is_empty() {
        args.extend(["-o".to_owned(), mount_opts.to_owned()]);
    }
    args.extend([source.to_owned(), target.to_owned()]);
    args
}

#[async_trait]
impl Filesystem for HostFilesystem {
    #[instrument(skip(self))]
    async fn safe_format(
        &self,
        device: &str,
        fs_type: &str,
        fs_opts: &str,
    ) -> Result<(), LinstorError> {
        match self.probe(device).await? {
            Some(existing) if existing == fs_type => {
                debug!(device, fs_type, "device already formatted");
                return Ok(());
            }
            Some(existing) => {
                return Err(LinstorError::Format {
                    device: device.to_owned(),
                    reason: format!(
                        "device already holds a {existing} filesystem, refusing to format as {fs_type}"
                    ),
                });
            }
            None => {}
        }

        let mkfs = format!("mkfs.{fs_type}");
        let output = Command::new(&mkfs)
            .args(mkfs_args(device, fs_opts))
            .output()
            .await
            .map_err(|e| LinstorError::Format {
                device: device.to_owned(),
                reason: format!("failed to run {mkfs}: {e}"),
            })?;
        if !output.status.success() {
            return Err(LinstorError::Format {
                device: device.to_owned(),
                reason: format!(
                    "{mkfs} exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        info!(device, fs_type, "device formatted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        mount_opts: &str,
    ) -> Result<(), LinstorError> {
        // A second mount on the same target would stack; treat it as done.
        if is_mountpoint(target).await {
            debug!(target, "target already mounted, assuming idempotent retry");
            return Ok(());
        }

        tokio::fs::create_dir_all(Path::new(target))
            .await
            .map_err(|e| LinstorError::MountFailed {
                path: target.to_owned(),
                reason: e.to_string(),
            })?;

        let output = Command::new("mount")
            .args(mount_args(source, target, fs_type, mount_opts))
            .output()
            .await
            .map_err(|e| LinstorError::MountFailed {
                path: target.to_owned(),
                reason: format!("failed to run mount: {e}"),
            })?;
        if !output.status.success() {
            return Err(LinstorError::MountFailed {
                path: target.to_owned(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        info!(source, target, fs_type, "volume mounted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn unmount(&self, target: &str) -> Result<(), LinstorError> {
        if !is_mountpoint(target).await {
            debug!(target, "target not mounted, nothing to unmount");
            return Ok(());
        }

        nix::mount::umount(target).map_err(|e| LinstorError::UnmountFailed {
            path: target.to_owned(),
            reason: e.to_string(),
        })?;

        info!(target, "volume unmounted");
        Ok(())
    }
}
