// SPDX-License-Identifier: GPL-3.0-only

//! Opt-in scoped unmounting on top of [`MountManager`]

use std::ops::Deref;

use tracing::{error, warn};

use crate::mount::MountManager;

/// Unmounts its [`MountManager`] when dropped.
///
/// Failures during drop are logged; a busy mount stays mounted and keeps its
/// directory. Call [`MountGuard::release`] to take the manager back without
/// unmounting.
#[derive(Debug)]
pub struct MountGuard {
    manager: Option<MountManager>,
    delete_mountpoint: bool,
}

impl MountGuard {
    pub(crate) fn new(manager: MountManager, delete_mountpoint: bool) -> Self {
        Self {
            manager: Some(manager),
            delete_mountpoint,
        }
    }

    pub fn release(mut self) -> MountManager {
        match self.manager.take() {
            Some(manager) => manager,
            None => unreachable!("mount guard holds its manager until dropped"),
        }
    }
}

impl Deref for MountGuard {
    type Target = MountManager;

    fn deref(&self) -> &MountManager {
        match &self.manager {
            Some(manager) => manager,
            None => unreachable!("mount guard holds its manager until dropped"),
        }
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        let Some(manager) = self.manager.take() else {
            return;
        };

        match manager.umount(self.delete_mountpoint) {
            Ok(true) => {}
            Ok(false) => warn!(
                "Leaving {:?} mounted, device {} is busy",
                manager.mountpoint(),
                manager.device()
            ),
            Err(e) => error!("Failed to release {:?}: {}", manager.mountpoint(), e),
        }
    }
}
