// src/exec/runner.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::caches::CacheMountResolver;
use crate::docker::ContainerEngine;
use crate::exec::backend::{StepContext, StepRunner};
use crate::exec::naming::RunNaming;
use crate::exec::runners;
use crate::fs::FileSystem;
use crate::proxy::ProxyEnvironment;
use crate::steps::TaskStep;
use crate::user::CurrentUser;

/// Production [`StepRunner`]: carries out steps against a container engine
/// and the host filesystem.
#[derive(Debug, Clone)]
pub struct TaskStepRunner {
    pub(crate) engine: Arc<dyn ContainerEngine>,
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) naming: RunNaming,
    pub(crate) caches: CacheMountResolver,
    pub(crate) user: CurrentUser,
    pub(crate) proxy: ProxyEnvironment,
}

impl TaskStepRunner {
    /// Runner for the current process: detects the current user and
    /// captures the host's proxy variables.
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        fs: Arc<dyn FileSystem>,
        naming: RunNaming,
        caches: CacheMountResolver,
    ) -> Self {
        Self {
            engine,
            fs,
            naming,
            caches,
            user: CurrentUser::detect(),
            proxy: ProxyEnvironment::from_process(),
        }
    }

    pub fn with_current_user(mut self, user: CurrentUser) -> Self {
        self.user = user;
        self
    }

    pub fn with_proxy_environment(mut self, proxy: ProxyEnvironment) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn naming(&self) -> &RunNaming {
        &self.naming
    }

    async fn run(&self, step: TaskStep, ctx: &StepContext) {
        debug!(%step, "running step");

        match step {
            TaskStep::CreateTaskNetwork => runners::network::create(self, ctx).await,
            TaskStep::DeleteTaskNetwork { network } => {
                runners::network::delete(self, ctx, network).await
            }
            TaskStep::InitialiseCaches => runners::caches::initialise(self, ctx).await,
            TaskStep::BuildImage { container, tags } => {
                runners::image::build(self, ctx, container, tags).await
            }
            TaskStep::PullImage { reference } => runners::image::pull(self, ctx, reference).await,
            TaskStep::CreateContainer {
                container,
                image,
                network,
            } => runners::container::create(self, ctx, container, image, network).await,
            TaskStep::StartContainer { container, handle } => {
                runners::container::start(self, ctx, container, handle).await
            }
            TaskStep::WaitForContainerToBecomeHealthy { container, handle } => {
                runners::health::wait_until_healthy(self, ctx, container, handle).await
            }
            TaskStep::RunContainerSetupCommands { container, handle } => {
                runners::setup::run_setup_commands(self, ctx, container, handle).await
            }
            TaskStep::RunContainer { container, handle } => {
                runners::container::run(self, ctx, container, handle).await
            }
            TaskStep::StopContainer { container, handle } => {
                runners::container::stop(self, ctx, container, handle).await
            }
            TaskStep::RemoveContainer { container, handle } => {
                runners::container::remove(self, ctx, container, handle).await
            }
            TaskStep::DeleteTemporaryFile { path } => {
                runners::cleanup::delete_file(self, ctx, path).await
            }
            TaskStep::DeleteTemporaryDirectory { path } => {
                runners::cleanup::delete_directory(self, ctx, path).await
            }
        }
    }
}

impl StepRunner for TaskStepRunner {
    fn run_step(
        &self,
        step: TaskStep,
        ctx: StepContext,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move { self.run(step, &ctx).await })
    }
}
