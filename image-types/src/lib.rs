// SPDX-License-Identifier: GPL-3.0-only

//! Shared data models for image build results
//!
//! - **image-result**: stores [`ResultFile`] records, persists them and
//!   checks them against build constraints
//! - **image-cli**: renders them for the operator

pub mod result;
pub mod size;

pub use result::{ResultFile, ResultFileOptions};
pub use size::{bytes_to_pretty, pretty_to_bytes};
