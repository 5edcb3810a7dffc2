// src/config/validate.rs

use std::sync::LazyLock;

use regex::Regex;

use crate::config::model::{ContainerConfig, ProjectConfig, RawProjectConfig, VolumeConfig};
use crate::errors::{DockhandError, Result};

/// One path component of an image reference: lowercase alphanumerics
/// joined by `.`, `_`, `__` or runs of `-`.
static REFERENCE_COMPONENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:(?:\.|__?|-+)[a-z0-9]+)*$").ok());

/// Names the engine accepts for volumes.
static VOLUME_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").ok());

const REFERENCE_RULES: &str = "must contain only lowercase letters, digits, dashes (-), single periods (.) or one or two underscores (_), and must not start or end with a dash, period or underscore";

impl TryFrom<RawProjectConfig> for ProjectConfig {
    type Error = crate::errors::DockhandError;

    fn try_from(raw: RawProjectConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ProjectConfig::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawProjectConfig) -> Result<()> {
    ensure_has_project_name(cfg)?;
    ensure_has_containers(cfg)?;
    for (name, container) in cfg.containers.iter() {
        validate_container_name(name)?;
        validate_image_source(name, container)?;
        validate_setup_commands(name, container)?;
        validate_run_as_current_user(name, container)?;
        validate_volumes(name, container)?;
    }
    Ok(())
}

fn ensure_has_project_name(cfg: &RawProjectConfig) -> Result<()> {
    if cfg.project_name.trim().is_empty() {
        return Err(DockhandError::ConfigError(
            "project_name must not be empty".to_string(),
        ));
    }
    if !matches(&REFERENCE_COMPONENT, &cfg.project_name) {
        return Err(DockhandError::ConfigError(format!(
            "invalid project_name '{}': it is used in image tags, so it {REFERENCE_RULES}",
            cfg.project_name
        )));
    }
    Ok(())
}

fn validate_container_name(name: &str) -> Result<()> {
    if !matches(&REFERENCE_COMPONENT, name) {
        return Err(DockhandError::ConfigError(format!(
            "invalid container name '{name}': container names are used in image tags, so they {REFERENCE_RULES}"
        )));
    }
    Ok(())
}

fn matches(pattern: &LazyLock<Option<Regex>>, value: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(value))
}

fn ensure_has_containers(cfg: &RawProjectConfig) -> Result<()> {
    if cfg.containers.is_empty() {
        return Err(DockhandError::ConfigError(
            "config must contain at least one [containers.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_image_source(name: &str, container: &ContainerConfig) -> Result<()> {
    match (&container.image, &container.build_directory) {
        (Some(_), Some(_)) => Err(DockhandError::ConfigError(format!(
            "container '{name}' has both `image` and `build_directory`; only one may be given"
        ))),
        (None, None) => Err(DockhandError::ConfigError(format!(
            "container '{name}' needs either `image` or `build_directory`"
        ))),
        _ => Ok(()),
    }
}

fn validate_setup_commands(name: &str, container: &ContainerConfig) -> Result<()> {
    for (index, command) in container.setup_commands.iter().enumerate() {
        if command.command.trim().is_empty() {
            return Err(DockhandError::ConfigError(format!(
                "container '{name}' has an empty setup command at index {index}"
            )));
        }
    }
    Ok(())
}

fn validate_run_as_current_user(name: &str, container: &ContainerConfig) -> Result<()> {
    let config = &container.run_as_current_user;
    if !config.enabled {
        return Ok(());
    }

    match config.home_directory.as_deref() {
        None => Err(DockhandError::ConfigError(format!(
            "container '{name}' has run_as_current_user enabled but no home_directory"
        ))),
        Some(home) if !home.starts_with('/') => Err(DockhandError::ConfigError(format!(
            "container '{name}' has an invalid home directory configured: '{home}' is not an absolute path"
        ))),
        Some(_) => Ok(()),
    }
}

fn validate_volumes(name: &str, container: &ContainerConfig) -> Result<()> {
    for volume in container.volumes.iter() {
        let container_path = match volume {
            VolumeConfig::Local { container_path, .. } => container_path,
            VolumeConfig::Cache { name: cache, container_path } => {
                if cache.trim().is_empty() {
                    return Err(DockhandError::ConfigError(format!(
                        "container '{name}' has a cache mount with an empty name"
                    )));
                }
                if !matches(&VOLUME_NAME, cache) {
                    return Err(DockhandError::ConfigError(format!(
                        "container '{name}' has an invalid cache name '{cache}': cache names must start with a letter or digit and contain only letters, digits, '_', '.' and '-'"
                    )));
                }
                container_path
            }
        };

        if !container_path.starts_with('/') {
            return Err(DockhandError::ConfigError(format!(
                "container '{name}' has an invalid mount: '{container_path}' is not an absolute path"
            )));
        }
    }
    Ok(())
}
