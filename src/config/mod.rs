// src/config/mod.rs

//! Configuration loading and validation for dockhand.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate per-container invariants (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigSection, ContainerConfig, ProjectConfig, RawProjectConfig, RunAsCurrentUserConfig,
    SetupCommandConfig, TaskConfig, TaskRunConfig, VolumeConfig,
};
