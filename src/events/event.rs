// src/events/event.rs

use std::path::PathBuf;

use crate::dag::{ContainerName, SetupCommand};
use crate::docker::{BuildProgress, ContainerHandle, Image, Network, PullProgress};
use crate::steps::TaskStep;

/// Everything that happens during a task invocation. Immutable once posted;
/// the log's insertion order is the only order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    // Task network.
    TaskNetworkCreated {
        network: Network,
    },
    TaskNetworkCreationFailed {
        message: String,
    },
    TaskNetworkDeleted {
        network: Network,
    },
    TaskNetworkDeletionFailed {
        network: Network,
        message: String,
    },

    // Caches.
    CachesInitialised,
    CacheInitialisationFailed {
        message: String,
    },

    // Images.
    ImageBuildProgress {
        container: ContainerName,
        progress: BuildProgress,
    },
    ImageBuilt {
        container: ContainerName,
        image: Image,
    },
    ImageBuildFailed {
        container: ContainerName,
        message: String,
    },
    ImagePullProgress {
        reference: String,
        progress: PullProgress,
    },
    ImagePulled {
        reference: String,
        image: Image,
    },
    ImagePullFailed {
        reference: String,
        message: String,
    },

    // Container lifecycle.
    ContainerCreated {
        container: ContainerName,
        handle: ContainerHandle,
    },
    ContainerCreationFailed {
        container: ContainerName,
        message: String,
    },
    ContainerStarted {
        container: ContainerName,
    },
    ContainerBecameHealthy {
        container: ContainerName,
    },
    ContainerDidNotBecomeHealthy {
        container: ContainerName,
        message: String,
    },
    RunningSetupCommand {
        container: ContainerName,
        command: SetupCommand,
        index: usize,
    },
    SetupCommandFailed {
        container: ContainerName,
        command: SetupCommand,
        exit_code: i64,
        output: String,
    },
    SetupCommandExecutionError {
        container: ContainerName,
        command: SetupCommand,
        message: String,
    },
    ContainerBecameReady {
        container: ContainerName,
    },
    RunningContainerExited {
        container: ContainerName,
        exit_code: i64,
    },
    ContainerRunFailed {
        container: ContainerName,
        message: String,
    },
    ContainerStopped {
        container: ContainerName,
    },
    ContainerStopFailed {
        container: ContainerName,
        message: String,
    },
    ContainerRemoved {
        container: ContainerName,
    },
    ContainerRemovalFailed {
        container: ContainerName,
        message: String,
    },

    // Temporary host resources.
    TemporaryFileCreated {
        container: ContainerName,
        path: PathBuf,
    },
    TemporaryFileDeleted {
        path: PathBuf,
    },
    TemporaryFileDeletionFailed {
        path: PathBuf,
        message: String,
    },
    TemporaryDirectoryCreated {
        container: ContainerName,
        path: PathBuf,
    },
    TemporaryDirectoryDeleted {
        path: PathBuf,
    },
    TemporaryDirectoryDeletionFailed {
        path: PathBuf,
        message: String,
    },

    // Execution control.
    StepStarting {
        step: TaskStep,
    },
    ExecutionFailed {
        message: String,
    },
    UserInterruptedExecution,
}

impl TaskEvent {
    /// Progress and bookkeeping events that carry no state change for the
    /// planners.
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            TaskEvent::StepStarting { .. }
                | TaskEvent::ImageBuildProgress { .. }
                | TaskEvent::ImagePullProgress { .. }
                | TaskEvent::RunningSetupCommand { .. }
        )
    }

    /// Events that make the task fail: once one is posted no further run
    /// steps are planned.
    pub fn is_task_failure(&self) -> bool {
        matches!(
            self,
            TaskEvent::TaskNetworkCreationFailed { .. }
                | TaskEvent::CacheInitialisationFailed { .. }
                | TaskEvent::ImageBuildFailed { .. }
                | TaskEvent::ImagePullFailed { .. }
                | TaskEvent::ContainerCreationFailed { .. }
                | TaskEvent::ContainerDidNotBecomeHealthy { .. }
                | TaskEvent::SetupCommandFailed { .. }
                | TaskEvent::SetupCommandExecutionError { .. }
                | TaskEvent::ContainerRunFailed { .. }
                | TaskEvent::ExecutionFailed { .. }
                | TaskEvent::UserInterruptedExecution
        )
    }

    /// Failures posted while tearing resources down.
    pub fn is_cleanup_failure(&self) -> bool {
        matches!(
            self,
            TaskEvent::ContainerStopFailed { .. }
                | TaskEvent::ContainerRemovalFailed { .. }
                | TaskEvent::TaskNetworkDeletionFailed { .. }
                | TaskEvent::TemporaryFileDeletionFailed { .. }
                | TaskEvent::TemporaryDirectoryDeletionFailed { .. }
        )
    }

    /// The container this event is scoped to; `None` for global events.
    pub fn container(&self) -> Option<&str> {
        match self {
            TaskEvent::ImageBuildProgress { container, .. }
            | TaskEvent::ImageBuilt { container, .. }
            | TaskEvent::ImageBuildFailed { container, .. }
            | TaskEvent::ContainerCreated { container, .. }
            | TaskEvent::ContainerCreationFailed { container, .. }
            | TaskEvent::ContainerStarted { container }
            | TaskEvent::ContainerBecameHealthy { container }
            | TaskEvent::ContainerDidNotBecomeHealthy { container, .. }
            | TaskEvent::RunningSetupCommand { container, .. }
            | TaskEvent::SetupCommandFailed { container, .. }
            | TaskEvent::SetupCommandExecutionError { container, .. }
            | TaskEvent::ContainerBecameReady { container }
            | TaskEvent::RunningContainerExited { container, .. }
            | TaskEvent::ContainerRunFailed { container, .. }
            | TaskEvent::ContainerStopped { container }
            | TaskEvent::ContainerStopFailed { container, .. }
            | TaskEvent::ContainerRemoved { container }
            | TaskEvent::ContainerRemovalFailed { container, .. }
            | TaskEvent::TemporaryFileCreated { container, .. }
            | TaskEvent::TemporaryDirectoryCreated { container, .. } => Some(container),
            TaskEvent::StepStarting { step } => step.container(),
            _ => None,
        }
    }
}
