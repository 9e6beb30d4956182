// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for image builds
//!
//! This crate wraps the host tools an image build needs while it assembles
//! a disk image:
//! - Running external commands through a replaceable [`CommandRunner`]
//! - Mounting, bind-mounting and unmounting via [`MountManager`]
//! - Removing scratch directories
//!
//! Mount operations require elevated privileges.

pub mod cmd;
pub mod error;
pub mod guard;
pub mod mount;
pub mod path;

pub use cmd::{CommandOutcome, CommandRunner, SystemCommand};
pub use error::{Result, SysError};
pub use guard::MountGuard;
pub use mount::MountManager;
