// SPDX-License-Identifier: GPL-3.0-only

//! Runtime configuration for build constraints
//!
//! ```toml
//! [build_constraints]
//! max_size = "700 MiB"
//! ```

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ResultError};

const CONFIG_ENV: &str = "IMAGE_RUNTIME_CONFIG";
const CONFIG_DIR: &str = "image-tool";
const CONFIG_FILE: &str = "runtime.toml";

/// Source of the build constraints a [`crate::ResultStore`] enforces
pub trait ConfigProvider: Send + Sync {
    /// Largest accepted result file as a human-readable size, `None` for no limit
    fn max_artifact_size(&self) -> Option<String>;
}

/// Provider without any constraint
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconstrained;

impl ConfigProvider for Unconstrained {
    fn max_artifact_size(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub build_constraints: BuildConstraints,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConstraints {
    pub max_size: Option<String>,
}

impl RuntimeConfig {
    /// Load the user's runtime config, see [`config_path`]
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path`; a missing file gives the default config
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No runtime config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|error| ResultError::Config {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        let config: RuntimeConfig = toml::from_str(&raw).map_err(|error| ResultError::Config {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        debug!("Loaded runtime config from {:?}", path);
        Ok(config)
    }

    pub fn with_max_size(max_size: impl Into<String>) -> Self {
        Self {
            build_constraints: BuildConstraints {
                max_size: Some(max_size.into()),
            },
        }
    }
}

impl ConfigProvider for RuntimeConfig {
    fn max_artifact_size(&self) -> Option<String> {
        self.build_constraints
            .max_size
            .clone()
            .filter(|value| !value.trim().is_empty())
    }
}

/// Location of the runtime config file.
///
/// `$IMAGE_RUNTIME_CONFIG` wins, then `$XDG_CONFIG_HOME/image-tool/runtime.toml`,
/// then `~/.config/image-tool/runtime.toml`.
pub fn config_path() -> PathBuf {
    config_path_from(|name| std::env::var_os(name))
}

fn config_path_from(var: impl Fn(&str) -> Option<OsString>) -> PathBuf {
    if let Some(file) = var(CONFIG_ENV) {
        return PathBuf::from(file);
    }

    if let Some(xdg_config) = var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg_config).join(CONFIG_DIR).join(CONFIG_FILE);
    }

    if let Some(home) = var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR)
            .join(CONFIG_FILE);
    }

    PathBuf::from("/etc").join(CONFIG_DIR).join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_no_constraint() {
        let scratch = tempfile::tempdir().unwrap();
        let config = RuntimeConfig::load_from(&scratch.path().join("runtime.toml")).unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.max_artifact_size(), None);
    }

    #[test]
    fn reads_max_size() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("runtime.toml");
        fs::write(&path, "[build_constraints]\nmax_size = \"700 MiB\"\n").unwrap();

        let config = RuntimeConfig::load_from(&path).unwrap();
        assert_eq!(config.max_artifact_size().as_deref(), Some("700 MiB"));
    }

    #[test]
    fn empty_file_is_unconstrained() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("runtime.toml");
        fs::write(&path, "").unwrap();

        let config = RuntimeConfig::load_from(&path).unwrap();
        assert_eq!(config.max_artifact_size(), None);
    }

    #[test]
    fn blank_max_size_is_unconstrained() {
        assert_eq!(RuntimeConfig::with_max_size("  ").max_artifact_size(), None);
    }

    #[test]
    fn invalid_toml_is_reported() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("runtime.toml");
        fs::write(&path, "[build_constraints\nmax_size = 1").unwrap();

        let error = RuntimeConfig::load_from(&path).unwrap_err();
        assert!(matches!(error, ResultError::Config { .. }));
    }

    #[test]
    fn resolves_config_location() {
        let explicit = config_path_from(|name| match name {
            "IMAGE_RUNTIME_CONFIG" => Some("/srv/runtime.toml".into()),
            "HOME" => Some("/home/builder".into()),
            _ => None,
        });
        assert_eq!(explicit, PathBuf::from("/srv/runtime.toml"));

        let xdg = config_path_from(|name| match name {
            "XDG_CONFIG_HOME" => Some("/home/builder/.cfg".into()),
            "HOME" => Some("/home/builder".into()),
            _ => None,
        });
        assert_eq!(
            xdg,
            PathBuf::from("/home/builder/.cfg/image-tool/runtime.toml")
        );

        let home = config_path_from(|name| (name == "HOME").then(|| "/home/builder".into()));
        assert_eq!(
            home,
            PathBuf::from("/home/builder/.config/image-tool/runtime.toml")
        );

        assert_eq!(
            config_path_from(|_| None),
            PathBuf::from("/etc/image-tool/runtime.toml")
        );
    }
}
