// src/dag/container.rs

//! Container definitions as seen by the execution engine.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::{ContainerConfig, VolumeConfig};

/// Canonical container name type used throughout the engine.
pub type ContainerName = String;

/// Where a container's image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    Build {
        build_directory: PathBuf,
        dockerfile: String,
        build_args: BTreeMap<String, String>,
    },
    Pull {
        reference: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VolumeMount {
    Local {
        local_path: PathBuf,
        container_path: String,
        options: Option<String>,
    },
    Cache {
        name: String,
        container_path: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SetupCommand {
    pub command: String,
    pub working_directory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunAsCurrentUser {
    Disabled,
    Enabled { home_directory: String },
}

/// A configured container. Immutable once the graph has been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container {
    pub name: ContainerName,
    pub image_source: ImageSource,
    pub command: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub working_directory: Option<String>,
    /// Direct dependencies declared on the container itself.
    pub dependencies: BTreeSet<ContainerName>,
    pub volume_mounts: Vec<VolumeMount>,
    pub setup_commands: Vec<SetupCommand>,
    pub run_as_current_user: RunAsCurrentUser,
}

impl Container {
    /// Build a container from its config section. Relative host paths are
    /// resolved against `base_directory`.
    pub fn from_config(name: ContainerName, cfg: &ContainerConfig, base_directory: &Path) -> Self {
        let image_source = match (&cfg.image, &cfg.build_directory) {
            (_, Some(dir)) => ImageSource::Build {
                build_directory: resolve_path(base_directory, dir),
                dockerfile: cfg.dockerfile.clone(),
                build_args: cfg.build_args.clone(),
            },
            (Some(reference), None) => ImageSource::Pull {
                reference: reference.clone(),
            },
            // Rejected by config validation.
            (None, None) => ImageSource::Pull {
                reference: name.clone(),
            },
        };

        let volume_mounts = cfg
            .volumes
            .iter()
            .map(|v| match v {
                VolumeConfig::Local {
                    local,
                    container_path,
                    options,
                } => VolumeMount::Local {
                    local_path: resolve_path(base_directory, local),
                    container_path: container_path.clone(),
                    options: options.clone(),
                },
                VolumeConfig::Cache {
                    name,
                    container_path,
                } => VolumeMount::Cache {
                    name: name.clone(),
                    container_path: container_path.clone(),
                },
            })
            .collect();

        let current_user = &cfg.run_as_current_user;
        let run_as_current_user = match (&current_user.enabled, &current_user.home_directory) {
            (true, Some(home)) => RunAsCurrentUser::Enabled {
                home_directory: home.clone(),
            },
            _ => RunAsCurrentUser::Disabled,
        };

        Self {
            name,
            image_source,
            command: cfg.command.clone(),
            environment: cfg.environment.clone(),
            working_directory: cfg.working_directory.clone(),
            dependencies: cfg.dependencies.iter().cloned().collect(),
            volume_mounts,
            setup_commands: cfg
                .setup_commands
                .iter()
                .map(|c| SetupCommand {
                    command: c.command.clone(),
                    working_directory: c.working_directory.clone(),
                })
                .collect(),
            run_as_current_user,
        }
    }

    pub fn runs_as_current_user(&self) -> bool {
        matches!(self.run_as_current_user, RunAsCurrentUser::Enabled { .. })
    }

    /// `(cache name, container path)` for every cache mount.
    pub fn cache_mounts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.volume_mounts.iter().filter_map(|m| match m {
            VolumeMount::Cache {
                name,
                container_path,
            } => Some((name.as_str(), container_path.as_str())),
            VolumeMount::Local { .. } => None,
        })
    }
}

fn resolve_path(base_directory: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_directory.join(path)
    }
}
