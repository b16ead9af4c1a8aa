//! SRF Common Library
//!
//! Shared vocabulary for the SRF cavity-control workspace: hardware status
//! enums, the error taxonomy, physical and firmware constants, the
//! cooperative abort flag, and TOML configuration loading.
//!
//! # Module Structure
//!
//! - [`abort`] - Cooperative cancellation flag
//! - [`config`] - Tuning/timing configuration (TOML)
//! - [`consts`] - Firmware codes, calibration limits and motion defaults
//! - [`error`] - Error taxonomy shared by all controllers
//! - [`state`] - Status and mode enums as reported by the LLRF firmware

pub mod abort;
pub mod config;
pub mod consts;
pub mod error;
pub mod state;
