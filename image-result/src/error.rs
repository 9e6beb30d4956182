// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResultError {
    #[error("build constraint failed: {key} {filename} is bigger than {limit}")]
    BuildConstraint {
        key: String,
        filename: String,
        size: u64,
        limit: String,
    },
    #[error("invalid max size constraint '{value}': {reason}")]
    InvalidSizeConstraint { value: String, reason: String },
    #[error("cannot stat result file {filename} for '{key}': {source}")]
    Stat {
        key: String,
        filename: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no result information {path:?} found")]
    NotFound { path: PathBuf },
    #[error("failed to read results from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to dump results to {path:?}: {reason}")]
    Write { path: PathBuf, reason: String },
    #[error("failed to load results from {path:?}: {kind} error")]
    Corrupt { path: PathBuf, kind: String },
    #[error("results in {path:?} use format version {found}, expected {expected}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
    #[error("runtime config {path:?} is invalid: {reason}")]
    Config { path: PathBuf, reason: String },
    #[error("bundle failed: {reason}")]
    Bundle { reason: String },
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ResultError>;
