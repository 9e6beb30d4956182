// SPDX-License-Identifier: GPL-3.0-only

//! Result files of one build run
//!
//! The store is written once a build phase is done and read back by later
//! phases such as bundling:
//!
//! ```json
//! {
//!   "class_version": 1,
//!   "result_files": {
//!     "disk_image": { "filename": "...", "use_for_bundle": true, ... }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use image_types::{ResultFile, ResultFileOptions, bytes_to_pretty, pretty_to_bytes};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use tracing::{debug, info};

use crate::config::{ConfigProvider, Unconstrained};
use crate::error::{Result, ResultError};

/// Format version written with every dumped store
pub const RESULT_CLASS_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ResultManifest {
    class_version: u32,
    result_files: BTreeMap<String, ResultFile>,
}

pub struct ResultStore {
    result_files: BTreeMap<String, ResultFile>,
    class_version: u32,
    config: Arc<dyn ConfigProvider>,
}

impl ResultStore {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            result_files: BTreeMap::new(),
            class_version: RESULT_CLASS_VERSION,
            config,
        }
    }

    /// Replace the constraint source, e.g. after [`ResultStore::load`]
    pub fn with_config(mut self, config: Arc<dyn ConfigProvider>) -> Self {
        self.config = config;
        self
    }

    /// Record `filename` under `key`.
    ///
    /// Empty keys or filenames are ignored. A file bigger than the configured
    /// max size is rejected and the store is left untouched.
    pub fn add(&mut self, key: &str, filename: &str, options: ResultFileOptions) -> Result<()> {
        if key.is_empty() || filename.is_empty() {
            debug!("Ignoring result with empty key or filename");
            return Ok(());
        }

        self.verify_build_constraints(key, filename)?;
        self.result_files
            .insert(key.to_string(), ResultFile::new(filename, options));
        Ok(())
    }

    pub fn get_results(&self) -> &BTreeMap<String, ResultFile> {
        &self.result_files
    }

    pub fn class_version(&self) -> u32 {
        self.class_version
    }

    /// `--> key: filename` lines in key order
    pub fn render_results(&self) -> Vec<String> {
        self.result_files
            .iter()
            .map(|(key, value)| format!("--> {}: {}", key, value.filename))
            .collect()
    }

    pub fn print_results(&self) {
        if self.result_files.is_empty() {
            return;
        }

        info!("Result files:");
        for line in self.render_results() {
            info!("{}", line);
        }
    }

    /// Write the store to `filename`
    pub fn dump(&self, filename: &Path) -> Result<()> {
        let manifest = ResultManifest {
            class_version: self.class_version,
            result_files: self.result_files.clone(),
        };

        let content =
            serde_json::to_string_pretty(&manifest).map_err(|error| ResultError::Write {
                path: filename.to_path_buf(),
                reason: error.to_string(),
            })?;

        fs::write(filename, content).map_err(|error| ResultError::Write {
            path: filename.to_path_buf(),
            reason: error.to_string(),
        })?;

        debug!(
            "Dumped {} results to {:?}",
            self.result_files.len(),
            filename
        );
        Ok(())
    }

    /// Read a store written by [`ResultStore::dump`].
    ///
    /// The loaded store enforces no constraints until one is attached with
    /// [`ResultStore::with_config`].
    pub fn load(filename: &Path) -> Result<Self> {
        if !filename.exists() {
            return Err(ResultError::NotFound {
                path: filename.to_path_buf(),
            });
        }

        let raw = fs::read(filename).map_err(|source| ResultError::Read {
            path: filename.to_path_buf(),
            source,
        })?;

        let manifest: ResultManifest =
            serde_json::from_slice(&raw).map_err(|error| ResultError::Corrupt {
                path: filename.to_path_buf(),
                kind: category_name(error.classify()).to_string(),
            })?;

        if manifest.class_version != RESULT_CLASS_VERSION {
            return Err(ResultError::UnsupportedVersion {
                path: filename.to_path_buf(),
                found: manifest.class_version,
                expected: RESULT_CLASS_VERSION,
            });
        }

        Ok(Self {
            result_files: manifest.result_files,
            class_version: manifest.class_version,
            config: Arc::new(Unconstrained),
        })
    }

    fn verify_build_constraints(&self, key: &str, filename: &str) -> Result<()> {
        let Some(max_size) = self.config.max_artifact_size() else {
            return Ok(());
        };

        let max_size_bytes =
            pretty_to_bytes(&max_size).map_err(|error| ResultError::InvalidSizeConstraint {
                value: max_size.clone(),
                reason: error.to_string(),
            })?;

        let size = fs::metadata(filename)
            .map_err(|source| ResultError::Stat {
                key: key.to_string(),
                filename: filename.to_string(),
                source,
            })?
            .len();

        if size > max_size_bytes {
            return Err(ResultError::BuildConstraint {
                key: key.to_string(),
                filename: filename.to_string(),
                size,
                limit: max_size,
            });
        }

        debug!(
            "{} is {}, within max size {}",
            filename,
            bytes_to_pretty(&size, false),
            max_size
        );
        Ok(())
    }
}

impl std::fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStore")
            .field("class_version", &self.class_version)
            .field("result_files", &self.result_files)
            .finish()
    }
}

fn category_name(category: Category) -> &'static str {
    match category {
        Category::Io => "io",
        Category::Syntax => "syntax",
        Category::Data => "data",
        Category::Eof => "eof",
    }
}
