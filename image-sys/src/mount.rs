// SPDX-License-Identifier: GPL-3.0-only

//! Mount lifecycle for one device/mountpoint pair
//!
//! A [`MountManager`] never unmounts on its own. The caller decides when a
//! mount is released, because a mount frequently has to outlive the handle
//! across build phases. Use [`MountManager::guard`] to opt into scoped
//! cleanup.
//!
//! Mount state is never cached: every operation asks `mountpoint(1)` first,
//! so external mounts and unmounts are always observed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cmd::{CommandRunner, SystemCommand};
use crate::error::{Result, SysError};
use crate::guard::MountGuard;
use crate::path::wipe;

const UMOUNT_ATTEMPTS: u32 = 3;
const UMOUNT_RETRY_DELAY: Duration = Duration::from_secs(1);
const MOUNTPOINT_TEMPLATE: &str = "mount_manager.XXXXXX";

pub struct MountManager {
    device: String,
    mountpoint: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl MountManager {
    /// Manage `device` at `mountpoint`, creating a temporary directory when
    /// no mountpoint is given
    pub fn new(device: impl Into<String>, mountpoint: Option<PathBuf>) -> Result<Self> {
        Self::with_runner(device, mountpoint, Arc::new(SystemCommand))
    }

    pub fn with_runner(
        device: impl Into<String>,
        mountpoint: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let mountpoint = match mountpoint {
            Some(path) if !path.as_os_str().is_empty() => {
                if path.to_str().is_none() {
                    return Err(SysError::InvalidMountpoint { path });
                }
                path
            }
            _ => create_temp_mountpoint()?,
        };

        Ok(Self {
            device: device.into(),
            mountpoint,
            runner,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    /// Bind mount the device directory onto the mountpoint
    pub fn bind_mount(&self) -> Result<()> {
        if self.is_mounted() {
            debug!("{:?} already mounted, skipping bind mount", self.mountpoint);
            return Ok(());
        }

        self.runner.run(
            "mount",
            &[
                "-n".to_string(),
                "--bind".to_string(),
                self.device.clone(),
                self.mountpoint_arg(),
            ],
        )?;
        info!("Bind mounted {} at {:?}", self.device, self.mountpoint);
        Ok(())
    }

    /// Mount the device, passing `options` as one comma-joined `-o` argument
    pub fn mount(&self, options: &[String]) -> Result<()> {
        if self.is_mounted() {
            debug!("{:?} already mounted, skipping mount", self.mountpoint);
            return Ok(());
        }

        let mut args = Vec::with_capacity(4);
        if !options.is_empty() {
            args.push("-o".to_string());
            args.push(options.join(","));
        }
        args.push(self.device.clone());
        args.push(self.mountpoint_arg());

        self.runner.run("mount", &args)?;
        info!("Mounted {} at {:?}", self.device, self.mountpoint);
        Ok(())
    }

    /// Detach the mount without waiting for it to become idle.
    ///
    /// A failing `umount -l` is logged and otherwise ignored; the mountpoint
    /// directory is removed afterwards whenever `delete_mountpoint` is set.
    pub fn umount_lazy(&self, delete_mountpoint: bool) -> Result<()> {
        if self.is_mounted() {
            match self
                .runner
                .run("umount", &["-l".to_string(), self.mountpoint_arg()])
            {
                Ok(_) => info!("Lazily unmounted {:?}", self.mountpoint),
                Err(e) => warn!("Lazy umount of {:?} failed: {}", self.mountpoint, e),
            }
        }

        if delete_mountpoint {
            wipe(&self.mountpoint)?;
        }

        Ok(())
    }

    /// Unmount, retrying while the target is busy.
    ///
    /// Returns `Ok(false)` when every attempt failed. The mountpoint
    /// directory is left in place in that case since it is still an active
    /// mount target.
    pub fn umount(&self, delete_mountpoint: bool) -> Result<bool> {
        if self.is_mounted() && !self.umount_with_retry() {
            warn!("{:?} still busy at MountManager", self.mountpoint);
            return Ok(false);
        }

        if delete_mountpoint {
            wipe(&self.mountpoint)?;
        }

        Ok(true)
    }

    /// Ask the OS whether the mountpoint is mounted.
    ///
    /// Any failure of `mountpoint(1)`, including not being able to run it,
    /// reads as "not mounted".
    pub fn is_mounted(&self) -> bool {
        match self
            .runner
            .execute("mountpoint", &[self.mountpoint_arg()])
        {
            Ok(outcome) => outcome.success(),
            Err(e) => {
                debug!("mountpoint check for {:?} failed: {}", self.mountpoint, e);
                false
            }
        }
    }

    /// Wrap this manager so it is unmounted when the guard goes out of scope
    pub fn guard(self, delete_mountpoint: bool) -> MountGuard {
        MountGuard::new(self, delete_mountpoint)
    }

    fn umount_with_retry(&self) -> bool {
        for attempt in 1..=UMOUNT_ATTEMPTS {
            match self.runner.run("umount", &[self.mountpoint_arg()]) {
                Ok(_) => {
                    info!("Unmounted {:?}", self.mountpoint);
                    return true;
                }
                Err(e) => {
                    warn!(
                        "{} umount of {:?} failed, try again in {}sec: {}",
                        attempt,
                        self.mountpoint,
                        UMOUNT_RETRY_DELAY.as_secs(),
                        e
                    );
                    if attempt < UMOUNT_ATTEMPTS {
                        self.runner.backoff(UMOUNT_RETRY_DELAY);
                    }
                }
            }
        }
        false
    }

    // Mountpoints are checked to be UTF-8 on construction
    fn mountpoint_arg(&self) -> String {
        self.mountpoint.to_string_lossy().into_owned()
    }
}

impl std::fmt::Debug for MountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountManager")
            .field("device", &self.device)
            .field("mountpoint", &self.mountpoint)
            .finish()
    }
}

fn create_temp_mountpoint() -> Result<PathBuf> {
    let template = std::env::temp_dir().join(MOUNTPOINT_TEMPLATE);
    let path = nix::unistd::mkdtemp(template.as_path())
        .map_err(|e| SysError::MountpointCreate(format!("{:?}: {}", template, e)))?;
    if path.to_str().is_none() {
        let _ = std::fs::remove_dir(&path);
        return Err(SysError::InvalidMountpoint { path });
    }
    debug!("Created temporary mountpoint {:?}", path);
    Ok(path)
}
