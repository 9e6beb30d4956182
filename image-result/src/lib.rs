// SPDX-License-Identifier: GPL-3.0-only

//! Bookkeeping of the files an image build produces
//!
//! - [`ResultStore`] records result files, checks them against the
//!   configured build constraints and persists them for later phases
//! - [`config`] reads the runtime configuration holding those constraints
//! - [`bundle`] publishes stored results into a bundle directory

pub mod bundle;
pub mod config;
pub mod error;
pub mod store;

pub use bundle::{BundleRequest, BundledFile, RESULT_FILE_NAME};
pub use config::{ConfigProvider, RuntimeConfig, Unconstrained};
pub use error::{Result, ResultError};
pub use store::{RESULT_CLASS_VERSION, ResultStore};
