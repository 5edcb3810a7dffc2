#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use dockhand::docker::{
    BuildProgress, ContainerCreationRequest, ContainerEngine, ContainerHandle,
    ContainerInspection, EngineError, EngineEvent, EngineEventKind, EngineResult, EventFilter,
    ExecRequest, ExecResult, HealthCheckResult, Image, ImageBuildRequest, Network, ProgressCallback,
    PullProgress,
};
use dockhand::engine::CancellationContext;

/// One call made against the fake engine. Containers are identified by
/// their network alias (the configured container name), or by their full
/// name when they have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    BuildImage { tags: Vec<String> },
    PullImage { reference: String },
    CreateNetwork { name: String },
    DeleteNetwork { id: String },
    CreateContainer { container: String },
    StartContainer { container: String },
    StopContainer { container: String },
    RemoveContainer { container: String },
    WaitForExit { container: String },
    Exec { container: String, command: Vec<String> },
    Inspect { container: String },
    WaitForEvent { container: String },
}

/// Scripted health behaviour for one container.
#[derive(Debug, Clone)]
pub struct HealthScript {
    pub event: EngineEventKind,
    pub log: Vec<HealthCheckResult>,
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<EngineCall>,
    requests: HashMap<String, ContainerCreationRequest>,
    builds: Vec<ImageBuildRequest>,
    exec_requests: Vec<ExecRequest>,
    failing_builds: HashSet<String>,
    failing_pulls: HashSet<String>,
    fail_network_creation: bool,
    fail_network_deletion: bool,
    failing_creates: HashSet<String>,
    failing_starts: HashSet<String>,
    failing_stops: HashSet<String>,
    failing_removals: HashSet<String>,
    exec_results: HashMap<(String, String), ExecResult>,
    health: HashMap<String, HealthScript>,
    exit_codes: HashMap<String, i64>,
    hanging: HashSet<String>,
    hanging_builds: HashSet<String>,
}

/// In-memory [`ContainerEngine`] that records every call and returns
/// scripted results. Everything succeeds unless told otherwise; exec'd
/// commands exit 0 and containers have no health check.
#[derive(Debug, Clone, Default)]
pub struct FakeContainerEngine {
    state: Arc<Mutex<FakeState>>,
    started_waiting: Arc<Notify>,
}

impl FakeContainerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_build_of(self, tag: &str) -> Self {
        self.lock().failing_builds.insert(tag.to_string());
        self
    }

    pub fn fail_pull_of(self, reference: &str) -> Self {
        self.lock().failing_pulls.insert(reference.to_string());
        self
    }

    pub fn fail_network_creation(self) -> Self {
        self.lock().fail_network_creation = true;
        self
    }

    pub fn fail_network_deletion(self) -> Self {
        self.lock().fail_network_deletion = true;
        self
    }

    pub fn fail_create_of(self, container: &str) -> Self {
        self.lock().failing_creates.insert(container.to_string());
        self
    }

    pub fn fail_start_of(self, container: &str) -> Self {
        self.lock().failing_starts.insert(container.to_string());
        self
    }

    pub fn fail_stop_of(self, container: &str) -> Self {
        self.lock().failing_stops.insert(container.to_string());
        self
    }

    pub fn fail_removal_of(self, container: &str) -> Self {
        self.lock().failing_removals.insert(container.to_string());
        self
    }

    /// Result of exec'ing `command` in `container`. Matched against the
    /// exec'd words joined by single spaces.
    pub fn exec_result(self, container: &str, command: &str, exit_code: i64, output: &str) -> Self {
        self.lock().exec_results.insert(
            (container.to_string(), command.to_string()),
            ExecResult {
                exit_code,
                output: output.to_string(),
            },
        );
        self
    }

    /// Give `container` a health check that ends with `event`.
    pub fn health(
        self,
        container: &str,
        event: EngineEventKind,
        log: Vec<HealthCheckResult>,
    ) -> Self {
        self.lock()
            .health
            .insert(container.to_string(), HealthScript { event, log });
        self
    }

    pub fn exit_code(self, container: &str, exit_code: i64) -> Self {
        self.lock().exit_codes.insert(container.to_string(), exit_code);
        self
    }

    /// Make `container` run until cancelled.
    pub fn hang_until_cancelled(self, container: &str) -> Self {
        self.lock().hanging.insert(container.to_string());
        self
    }

    /// Builds of `tag` never finish; they fail with `Cancelled` once the
    /// invocation is cancelled.
    pub fn hang_build_until_cancelled(self, tag: &str) -> Self {
        self.lock().hanging_builds.insert(tag.to_string());
        self
    }

    /// Notified once a hanging container is being waited on, or a hanging
    /// build has started.
    pub fn started_waiting(&self) -> Arc<Notify> {
        Arc::clone(&self.started_waiting)
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Creation request for `container`, by network alias or full name.
    pub fn creation_request(&self, container: &str) -> Option<ContainerCreationRequest> {
        self.lock().requests.get(container).cloned()
    }

    pub fn build_requests(&self) -> Vec<ImageBuildRequest> {
        self.lock().builds.clone()
    }

    pub fn exec_requests(&self) -> Vec<ExecRequest> {
        self.lock().exec_requests.clone()
    }

    /// Position of the first call equal to `call`.
    pub fn position(&self, call: &EngineCall) -> Option<usize> {
        self.lock().calls.iter().position(|c| c == call)
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: EngineCall) {
        self.lock().calls.push(call);
    }
}

/// Handles are named after the network alias: `<alias>-id`.
fn alias_of(handle: &ContainerHandle) -> String {
    handle
        .id
        .strip_suffix("-id")
        .unwrap_or(&handle.id)
        .to_string()
}

#[async_trait]
impl ContainerEngine for FakeContainerEngine {
    async fn build_image(
        &self,
        request: &ImageBuildRequest,
        cancellation: &CancellationContext,
        progress: &ProgressCallback<'_, BuildProgress>,
    ) -> EngineResult<Image> {
        self.record(EngineCall::BuildImage {
            tags: request.tags.clone(),
        });

        let tag = request.tags.first().cloned().unwrap_or_default();
        let hangs = {
            let mut state = self.lock();
            state.builds.push(request.clone());
            if state.failing_builds.contains(&tag) {
                return Err(EngineError::BuildFailed(format!("build of {tag} failed")));
            }
            state.hanging_builds.contains(&tag)
        };

        if hangs {
            self.started_waiting.notify_one();
            cancellation.cancelled().await;
            return Err(EngineError::Cancelled);
        }

        progress(BuildProgress {
            step: 1,
            total_steps: 1,
            message: "FROM scratch".to_string(),
        });
        Ok(Image::new(format!("sha256:{tag}")))
    }

    async fn pull_image(
        &self,
        reference: &str,
        _force: bool,
        _cancellation: &CancellationContext,
        progress: &ProgressCallback<'_, PullProgress>,
    ) -> EngineResult<Image> {
        self.record(EngineCall::PullImage {
            reference: reference.to_string(),
        });

        if self.lock().failing_pulls.contains(reference) {
            return Err(EngineError::PullFailed(format!("pull of {reference} failed")));
        }

        progress(PullProgress {
            message: "Pull complete".to_string(),
        });
        Ok(Image::new(format!("sha256:{reference}")))
    }

    async fn create_network(&self, name: &str, _driver: &str) -> EngineResult<Network> {
        self.record(EngineCall::CreateNetwork {
            name: name.to_string(),
        });

        if self.lock().fail_network_creation {
            return Err(EngineError::NetworkCreationFailed("no more networks".to_string()));
        }
        Ok(Network::new(format!("{name}-id")))
    }

    async fn delete_network(&self, network: &Network) -> EngineResult<()> {
        self.record(EngineCall::DeleteNetwork {
            id: network.id.clone(),
        });

        if self.lock().fail_network_deletion {
            return Err(EngineError::NetworkDeletionFailed("network is in use".to_string()));
        }
        Ok(())
    }

    async fn create_container(
        &self,
        request: &ContainerCreationRequest,
    ) -> EngineResult<ContainerHandle> {
        let alias = request
            .network_alias
            .clone()
            .unwrap_or_else(|| request.name.clone());
        self.record(EngineCall::CreateContainer {
            container: alias.clone(),
        });

        let mut state = self.lock();
        state.requests.insert(alias.clone(), request.clone());
        if state.failing_creates.contains(&alias) {
            return Err(EngineError::ContainerCreationFailed(format!(
                "could not create {alias}"
            )));
        }
        Ok(ContainerHandle::new(format!("{alias}-id"), request.name.clone()))
    }

    async fn start_container(&self, container: &ContainerHandle) -> EngineResult<()> {
        let alias = alias_of(container);
        self.record(EngineCall::StartContainer {
            container: alias.clone(),
        });

        if self.lock().failing_starts.contains(&alias) {
            return Err(EngineError::ContainerStartFailed(format!("could not start {alias}")));
        }
        Ok(())
    }

    async fn stop_container(&self, container: &ContainerHandle) -> EngineResult<()> {
        let alias = alias_of(container);
        self.record(EngineCall::StopContainer {
            container: alias.clone(),
        });

        if self.lock().failing_stops.contains(&alias) {
            return Err(EngineError::ContainerStopFailed(format!("could not stop {alias}")));
        }
        Ok(())
    }

    async fn remove_container(&self, container: &ContainerHandle) -> EngineResult<()> {
        let alias = alias_of(container);
        self.record(EngineCall::RemoveContainer {
            container: alias.clone(),
        });

        if self.lock().failing_removals.contains(&alias) {
            return Err(EngineError::ContainerRemovalFailed(format!(
                "could not remove {alias}"
            )));
        }
        Ok(())
    }

    async fn wait_for_exit(
        &self,
        container: &ContainerHandle,
        cancellation: &CancellationContext,
    ) -> EngineResult<i64> {
        let alias = alias_of(container);
        self.record(EngineCall::WaitForExit {
            container: alias.clone(),
        });

        let hangs = self.lock().hanging.contains(&alias);
        if hangs {
            self.started_waiting.notify_one();
            cancellation.cancelled().await;
            return Err(EngineError::Cancelled);
        }

        Ok(self.lock().exit_codes.get(&alias).copied().unwrap_or(0))
    }

    async fn exec_in_container(
        &self,
        request: &ExecRequest,
        _cancellation: &CancellationContext,
    ) -> EngineResult<ExecResult> {
        let alias = alias_of(&request.container);
        self.record(EngineCall::Exec {
            container: alias.clone(),
            command: request.command.clone(),
        });

        let mut state = self.lock();
        state.exec_requests.push(request.clone());
        let key = (alias, request.command.join(" "));
        Ok(state.exec_results.get(&key).cloned().unwrap_or(ExecResult {
            exit_code: 0,
            output: String::new(),
        }))
    }

    async fn inspect_container(
        &self,
        container: &ContainerHandle,
    ) -> EngineResult<ContainerInspection> {
        let alias = alias_of(container);
        self.record(EngineCall::Inspect {
            container: alias.clone(),
        });

        Ok(match self.lock().health.get(&alias) {
            Some(script) => ContainerInspection {
                has_health_check: true,
                health_log: script.log.clone(),
            },
            None => ContainerInspection::default(),
        })
    }

    async fn wait_for_event(
        &self,
        filter: &EventFilter,
        _cancellation: &CancellationContext,
    ) -> EngineResult<EngineEvent> {
        let alias = alias_of(&filter.container);
        self.record(EngineCall::WaitForEvent {
            container: alias.clone(),
        });

        let kind = self
            .lock()
            .health
            .get(&alias)
            .map(|script| script.event)
            .unwrap_or(EngineEventKind::Healthy);
        Ok(EngineEvent {
            container_id: filter.container.id.clone(),
            kind,
        })
    }
}
