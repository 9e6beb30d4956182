//! Result file records

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One artifact produced by a build and how to treat it when bundling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFile {
    /// Path of the artifact on disk
    pub filename: String,

    /// Copy the file into the bundle directory
    pub use_for_bundle: bool,

    /// Compress the bundled copy
    pub compress: bool,

    /// Write a sha256 checksum next to the bundled copy
    pub shasum: bool,
}

impl ResultFile {
    pub fn new(filename: impl Into<String>, options: ResultFileOptions) -> Self {
        Self {
            filename: filename.into(),
            use_for_bundle: options.use_for_bundle,
            compress: options.compress,
            shasum: options.shasum,
        }
    }

    /// Final path component of the artifact
    pub fn basename(&self) -> &str {
        Path::new(&self.filename)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(self.filename.as_str())
    }
}

/// Bundling flags for [`ResultFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultFileOptions {
    pub use_for_bundle: bool,
    pub compress: bool,
    pub shasum: bool,
}

impl Default for ResultFileOptions {
    fn default() -> Self {
        Self {
            use_for_bundle: true,
            compress: false,
            shasum: true,
        }
    }
}

impl ResultFileOptions {
    pub fn compressed() -> Self {
        Self {
            compress: true,
            ..Self::default()
        }
    }
}
