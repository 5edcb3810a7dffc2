// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::CacheType;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// project_name = "shop"
///
/// [config]
/// cache_type = "volume"
///
/// [containers.db]
/// image = "postgres:latest"
///
/// [containers.app]
/// build_directory = "app"
/// dependencies = ["db"]
///
/// [tasks.test]
/// run = { container = "app", command = "cargo test" }
/// ```
///
/// This is the unchecked form straight out of `serde`; use
/// [`ProjectConfig::try_from`] to validate it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProjectConfig {
    pub project_name: String,

    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub containers: BTreeMap<String, ContainerConfig>,

    #[serde(default)]
    pub tasks: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
///
/// Only constructible through validation (see `config::validate`).
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub project_name: String,
    /// Directory relative paths (build directories, local mounts, directory
    /// caches) are resolved against. Set by the loader to the config file's
    /// parent directory.
    pub base_directory: PathBuf,
    pub config: ConfigSection,
    pub containers: BTreeMap<String, ContainerConfig>,
    pub tasks: BTreeMap<String, TaskConfig>,
}

impl ProjectConfig {
    pub(crate) fn new_unchecked(raw: RawProjectConfig) -> Self {
        Self {
            project_name: raw.project_name,
            base_directory: PathBuf::from("."),
            config: raw.config,
            containers: raw.containers,
            tasks: raw.tasks,
        }
    }

    /// Replace the base directory used for relative paths.
    pub fn with_base_directory(mut self, base_directory: impl Into<PathBuf>) -> Self {
        self.base_directory = base_directory.into();
        self
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// Backing store for cache mounts.
    #[serde(default)]
    pub cache_type: CacheType,
}

/// `[containers.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerConfig {
    /// Image to pull. Mutually exclusive with `build_directory`.
    #[serde(default)]
    pub image: Option<String>,

    /// Directory to build the image from, relative to the config file.
    #[serde(default)]
    pub build_directory: Option<PathBuf>,

    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,

    #[serde(default)]
    pub build_args: BTreeMap<String, String>,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    #[serde(default)]
    pub working_directory: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub volumes: Vec<VolumeConfig>,

    #[serde(default)]
    pub setup_commands: Vec<SetupCommandConfig>,

    #[serde(default)]
    pub run_as_current_user: RunAsCurrentUserConfig,
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

/// An entry in a container's `volumes` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VolumeConfig {
    /// Bind mount of a host path.
    Local {
        local: PathBuf,
        container_path: String,
        #[serde(default)]
        options: Option<String>,
    },
    /// Named cache shared across runs (and across containers).
    Cache { name: String, container_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SetupCommandConfig {
    pub command: String,
    #[serde(default)]
    pub working_directory: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunAsCurrentUserConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub home_directory: Option<String>,
}

/// `[tasks.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub description: Option<String>,

    /// What to run. A task without `run` only groups its prerequisites.
    #[serde(default)]
    pub run: Option<TaskRunConfig>,

    /// Tasks run to completion, in order, before this one. Entries may use
    /// `*` to match several task names.
    #[serde(default)]
    pub prerequisites: Vec<String>,

    /// Extra containers to start alongside the main container's own
    /// dependencies.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskRunConfig {
    pub container: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}
