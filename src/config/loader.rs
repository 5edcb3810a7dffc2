// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ProjectConfig, RawProjectConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawProjectConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawProjectConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawProjectConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run basic validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks per-container invariants (image source, absolute paths,
///   non-empty setup commands).
///
/// Dependency references and cycles are checked later, per task, by
/// [`crate::dag::ContainerDependencyGraph::resolve`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ProjectConfig> {
    let raw_config = load_from_path(&path)?;
    let config = ProjectConfig::try_from(raw_config)?;
    Ok(config.with_base_directory(config_root_dir(path.as_ref())))
}

/// Figure out the project root for relative paths.
///
/// - If the config path has a non-empty parent (e.g. "configs/dockhand.toml"),
///   we use that directory.
/// - If it's just a bare filename like "dockhand.toml" (parent = ""),
///   we fall back to the current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Default config location: `dockhand.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("dockhand.toml")
}
