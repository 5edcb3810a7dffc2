// src/docker/client.rs

use async_trait::async_trait;
use thiserror::Error;

use crate::docker::model::{
    BuildProgress, ContainerCreationRequest, ContainerHandle, ContainerInspection, EngineEvent,
    EventFilter, ExecRequest, ExecResult, Image, ImageBuildRequest, Network, PullProgress,
};
use crate::engine::CancellationContext;

/// Errors surfaced by a [`ContainerEngine`]. Step runners turn these into
/// failure events; they never cross the runner boundary.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    BuildFailed(String),

    #[error("{0}")]
    PullFailed(String),

    #[error("{0}")]
    NetworkCreationFailed(String),

    #[error("{0}")]
    NetworkDeletionFailed(String),

    #[error("{0}")]
    ContainerCreationFailed(String),

    #[error("{0}")]
    ContainerStartFailed(String),

    #[error("{0}")]
    ContainerStopFailed(String),

    #[error("{0}")]
    ContainerRemovalFailed(String),

    #[error("{0}")]
    ExecFailed(String),

    #[error("{0}")]
    InspectFailed(String),

    #[error("{0}")]
    EventStreamFailed(String),

    #[error("The operation was cancelled.")]
    Cancelled,

    #[error("Could not communicate with the container engine: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Callback for progress updates during long-running engine calls.
pub type ProgressCallback<'a, T> = dyn Fn(T) + Send + Sync + 'a;

/// Container engine operations the task runner needs.
///
/// Every call that can block for a long time takes the invocation's
/// [`CancellationContext`] and returns [`EngineError::Cancelled`] once it
/// fires.
#[async_trait]
pub trait ContainerEngine: Send + Sync + std::fmt::Debug {
    async fn build_image(
        &self,
        request: &ImageBuildRequest,
        cancellation: &CancellationContext,
        progress: &ProgressCallback<'_, BuildProgress>,
    ) -> EngineResult<Image>;

    /// Pull `reference`. Without `force` an image already present locally is
    /// used as-is.
    async fn pull_image(
        &self,
        reference: &str,
        force: bool,
        cancellation: &CancellationContext,
        progress: &ProgressCallback<'_, PullProgress>,
    ) -> EngineResult<Image>;

    async fn create_network(&self, name: &str, driver: &str) -> EngineResult<Network>;

    async fn delete_network(&self, network: &Network) -> EngineResult<()>;

    async fn create_container(
        &self,
        request: &ContainerCreationRequest,
    ) -> EngineResult<ContainerHandle>;

    async fn start_container(&self, container: &ContainerHandle) -> EngineResult<()>;

    async fn stop_container(&self, container: &ContainerHandle) -> EngineResult<()>;

    async fn remove_container(&self, container: &ContainerHandle) -> EngineResult<()>;

    /// Stream the container's output and wait for it to exit, returning its
    /// exit code.
    async fn wait_for_exit(
        &self,
        container: &ContainerHandle,
        cancellation: &CancellationContext,
    ) -> EngineResult<i64>;

    async fn exec_in_container(
        &self,
        request: &ExecRequest,
        cancellation: &CancellationContext,
    ) -> EngineResult<ExecResult>;

    async fn inspect_container(
        &self,
        container: &ContainerHandle,
    ) -> EngineResult<ContainerInspection>;

    /// Suspend until the first engine event matching `filter`.
    async fn wait_for_event(
        &self,
        filter: &EventFilter,
        cancellation: &CancellationContext,
    ) -> EngineResult<EngineEvent>;
}
