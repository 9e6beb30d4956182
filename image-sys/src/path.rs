// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, SysError};

/// Recursively remove `path`; a path that is already gone is not an error.
pub fn wipe(path: &Path) -> Result<()> {
    debug!("Removing {:?}", path);

    let removed = match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(error) => Err(error),
    };

    match removed {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SysError::Wipe {
            path: path.to_path_buf(),
            source,
        }),
    }
}
