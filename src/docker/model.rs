// src/docker/model.rs

//! Plain data exchanged with a [`ContainerEngine`](super::ContainerEngine).

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Image {
    pub id: String,
}

impl Image {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Network {
    pub id: String,
}

impl Network {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A container that exists in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerHandle {
    pub id: String,
    /// Engine-side name, unique per invocation.
    pub name: String,
}

impl ContainerHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuildRequest {
    pub build_directory: PathBuf,
    pub dockerfile: String,
    pub build_args: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

/// Progress reported while building an image (`Step N/M` lines).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildProgress {
    pub step: u32,
    pub total_steps: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullProgress {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MountSource {
    HostPath(PathBuf),
    Volume(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountSpec {
    pub source: MountSource,
    pub container_path: String,
    pub options: Option<String>,
}

impl MountSpec {
    /// `--volume` argument form: `source:target[:options]`.
    pub fn to_volume_arg(&self) -> String {
        let source = match &self.source {
            MountSource::HostPath(path) => path.display().to_string(),
            MountSource::Volume(name) => name.clone(),
        };

        match &self.options {
            Some(options) => format!("{source}:{}:{options}", self.container_path),
            None => format!("{source}:{}", self.container_path),
        }
    }
}

/// Everything needed to create one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerCreationRequest {
    pub name: String,
    pub image: Image,
    pub network: Network,
    /// Name other containers on the network reach this one by. Only
    /// user-defined networks accept aliases.
    pub network_alias: Option<String>,
    /// Command and arguments; empty means the image default.
    pub command: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub working_directory: Option<String>,
    pub mounts: Vec<MountSpec>,
    /// `uid:gid` to run as, if any.
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub container: ContainerHandle,
    pub command: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub working_directory: Option<String>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i64,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckResult {
    pub exit_code: i64,
    pub output: String,
}

/// The parts of `docker inspect` the engine cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInspection {
    pub has_health_check: bool,
    /// Health check results, oldest first.
    pub health_log: Vec<HealthCheckResult>,
}

impl ContainerInspection {
    pub fn last_health_check(&self) -> Option<&HealthCheckResult> {
        self.health_log.last()
    }
}

/// Engine event kinds a caller can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineEventKind {
    Healthy,
    Unhealthy,
    Died,
}

impl EngineEventKind {
    /// `--filter event=...` value for `docker events`.
    pub fn filter_value(self) -> &'static str {
        match self {
            EngineEventKind::Healthy | EngineEventKind::Unhealthy => "health_status",
            EngineEventKind::Died => "die",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub container: ContainerHandle,
    pub kinds: Vec<EngineEventKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub container_id: String,
    pub kind: EngineEventKind,
}
