//! Service Configuration Module
//!
//! Runtime configuration loaded from TOML, with environment overrides.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line (must load, or startup fails)
//! 2. `POSE_CONFIG` environment variable (path to TOML file)
//! 3. `pose_backend.toml` in the current working directory
//! 4. Built-in defaults
//!
//! `PORT` and `POSE_MODEL_PATH` are applied on top of whichever source won.
//!
//! ## Usage
//!
//! ```ignore
//! let config = ServiceConfig::load(cli_path.as_deref())?;
//! config.validate()?;
//! ```
//!
//! The loaded value is handed to each component at construction; there is
//! no global config.

mod service_config;
pub mod defaults;

pub use service_config::*;
