// src/config/mod.rs

//! Configuration loading and validation for blockwise.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`) and turn it into
//!   scheduler tasks.
//! - Load a config file from disk (`loader.rs`).
//! - Validate dependencies, block counts and acyclicity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
pub use validate::validate_config;
