// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use thiserror::Error;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("command failed: {command}; stderr: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to execute {command}: {reason}")]
    CommandSpawn { command: String, reason: String },

    #[error("failed to create mountpoint directory: {0}")]
    MountpointCreate(String),

    #[error("mountpoint {path:?} is not valid UTF-8")]
    InvalidMountpoint { path: PathBuf },

    #[error("failed to remove {path:?}: {source}")]
    Wipe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
