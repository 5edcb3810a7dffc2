// src/steps.rs

//! Units of work dispatched by the execution manager.

use std::fmt;
use std::path::PathBuf;

use crate::dag::ContainerName;
use crate::docker::{ContainerHandle, Image, Network};

/// One unit of work. Pure data: steps are compared by full equality to
/// decide whether an equivalent step has already been dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskStep {
    CreateTaskNetwork,
    InitialiseCaches,
    BuildImage {
        container: ContainerName,
        tags: Vec<String>,
    },
    PullImage {
        reference: String,
    },
    CreateContainer {
        container: ContainerName,
        image: Image,
        network: Network,
    },
    StartContainer {
        container: ContainerName,
        handle: ContainerHandle,
    },
    WaitForContainerToBecomeHealthy {
        container: ContainerName,
        handle: ContainerHandle,
    },
    RunContainerSetupCommands {
        container: ContainerName,
        handle: ContainerHandle,
    },
    /// Wait for the task's main container to exit.
    RunContainer {
        container: ContainerName,
        handle: ContainerHandle,
    },
    StopContainer {
        container: ContainerName,
        handle: ContainerHandle,
    },
    RemoveContainer {
        container: ContainerName,
        handle: ContainerHandle,
    },
    DeleteTemporaryFile {
        path: PathBuf,
    },
    DeleteTemporaryDirectory {
        path: PathBuf,
    },
    DeleteTaskNetwork {
        network: Network,
    },
}

impl TaskStep {
    /// The container this step acts on, if any.
    pub fn container(&self) -> Option<&str> {
        match self {
            TaskStep::BuildImage { container, .. }
            | TaskStep::CreateContainer { container, .. }
            | TaskStep::StartContainer { container, .. }
            | TaskStep::WaitForContainerToBecomeHealthy { container, .. }
            | TaskStep::RunContainerSetupCommands { container, .. }
            | TaskStep::RunContainer { container, .. }
            | TaskStep::StopContainer { container, .. }
            | TaskStep::RemoveContainer { container, .. } => Some(container),
            TaskStep::CreateTaskNetwork
            | TaskStep::InitialiseCaches
            | TaskStep::PullImage { .. }
            | TaskStep::DeleteTemporaryFile { .. }
            | TaskStep::DeleteTemporaryDirectory { .. }
            | TaskStep::DeleteTaskNetwork { .. } => None,
        }
    }
}

impl fmt::Display for TaskStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStep::CreateTaskNetwork => write!(f, "create task network"),
            TaskStep::InitialiseCaches => write!(f, "initialise caches"),
            TaskStep::BuildImage { container, .. } => write!(f, "build image for '{container}'"),
            TaskStep::PullImage { reference } => write!(f, "pull image '{reference}'"),
            TaskStep::CreateContainer { container, .. } => write!(f, "create '{container}'"),
            TaskStep::StartContainer { container, .. } => write!(f, "start '{container}'"),
            TaskStep::WaitForContainerToBecomeHealthy { container, .. } => {
                write!(f, "wait for '{container}' to become healthy")
            }
            TaskStep::RunContainerSetupCommands { container, .. } => {
                write!(f, "run setup commands in '{container}'")
            }
            TaskStep::RunContainer { container, .. } => write!(f, "run '{container}'"),
            TaskStep::StopContainer { container, .. } => write!(f, "stop '{container}'"),
            TaskStep::RemoveContainer { container, .. } => write!(f, "remove '{container}'"),
            TaskStep::DeleteTemporaryFile { path } => {
                write!(f, "delete temporary file {}", path.display())
            }
            TaskStep::DeleteTemporaryDirectory { path } => {
                write!(f, "delete temporary directory {}", path.display())
            }
            TaskStep::DeleteTaskNetwork { network } => {
                write!(f, "delete task network {}", network.id)
            }
        }
    }
}
