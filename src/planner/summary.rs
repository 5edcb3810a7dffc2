// src/planner/summary.rs

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;

use crate::dag::{Container, ContainerName, ImageSource};
use crate::docker::{ContainerHandle, Image, Network};
use crate::events::TaskEvent;
use crate::steps::TaskStep;

/// Folded view of an event log snapshot.
///
/// Built fresh from the events on every planning pass; holds no state of its
/// own beyond what the events say.
#[derive(Debug, Clone, Default)]
pub struct ExecutionSummary {
    pub network: Option<Network>,
    pub network_deleted: bool,
    pub caches_initialised: bool,
    pub built_images: BTreeMap<ContainerName, Image>,
    pub pulled_images: BTreeMap<String, Image>,
    pub created: BTreeMap<ContainerName, ContainerHandle>,
    pub started: BTreeSet<ContainerName>,
    pub healthy: BTreeSet<ContainerName>,
    pub ready: BTreeSet<ContainerName>,
    pub exited: BTreeMap<ContainerName, i64>,
    pub stopped: BTreeSet<ContainerName>,
    pub removed: BTreeSet<ContainerName>,
    pub temporary_files: BTreeSet<PathBuf>,
    pub deleted_files: BTreeSet<PathBuf>,
    pub temporary_directories: BTreeSet<PathBuf>,
    pub deleted_directories: BTreeSet<PathBuf>,
    pub dispatched: HashSet<TaskStep>,
    /// First task failure posted, if any.
    pub first_failure: Option<TaskEvent>,
    pub interrupted: bool,
    pub cleanup_failures: Vec<TaskEvent>,
}

impl ExecutionSummary {
    pub fn from_events(events: &[TaskEvent]) -> Self {
        let mut summary = Self::default();
        for event in events {
            summary.apply(event);
        }
        summary
    }

    fn apply(&mut self, event: &TaskEvent) {
        if event.is_task_failure() && self.first_failure.is_none() {
            self.first_failure = Some(event.clone());
        }
        if event.is_cleanup_failure() {
            self.cleanup_failures.push(event.clone());
        }

        match event {
            TaskEvent::TaskNetworkCreated { network } => self.network = Some(network.clone()),
            TaskEvent::TaskNetworkDeleted { .. } => self.network_deleted = true,
            TaskEvent::CachesInitialised => self.caches_initialised = true,
            TaskEvent::ImageBuilt { container, image } => {
                self.built_images.insert(container.clone(), image.clone());
            }
            TaskEvent::ImagePulled { reference, image } => {
                self.pulled_images.insert(reference.clone(), image.clone());
            }
            TaskEvent::ContainerCreated { container, handle } => {
                self.created.insert(container.clone(), handle.clone());
            }
            TaskEvent::ContainerStarted { container } => {
                self.started.insert(container.clone());
            }
            TaskEvent::ContainerBecameHealthy { container } => {
                self.healthy.insert(container.clone());
            }
            TaskEvent::ContainerBecameReady { container } => {
                self.ready.insert(container.clone());
            }
            TaskEvent::RunningContainerExited {
                container,
                exit_code,
            } => {
                self.exited.insert(container.clone(), *exit_code);
            }
            TaskEvent::ContainerStopped { container } => {
                self.stopped.insert(container.clone());
            }
            TaskEvent::ContainerRemoved { container } => {
                self.removed.insert(container.clone());
            }
            TaskEvent::TemporaryFileCreated { path, .. } => {
                self.temporary_files.insert(path.clone());
            }
            TaskEvent::TemporaryFileDeleted { path } => {
                self.deleted_files.insert(path.clone());
            }
            TaskEvent::TemporaryDirectoryCreated { path, .. } => {
                self.temporary_directories.insert(path.clone());
            }
            TaskEvent::TemporaryDirectoryDeleted { path } => {
                self.deleted_directories.insert(path.clone());
            }
            TaskEvent::StepStarting { step } => {
                self.dispatched.insert(step.clone());
            }
            TaskEvent::UserInterruptedExecution => self.interrupted = true,
            _ => {}
        }
    }

    pub fn has_failed(&self) -> bool {
        self.first_failure.is_some()
    }

    pub fn was_dispatched(&self, step: &TaskStep) -> bool {
        self.dispatched.contains(step)
    }

    /// The image `container` runs, once it has been built or pulled.
    pub fn image_for(&self, container: &Container) -> Option<&Image> {
        match &container.image_source {
            ImageSource::Build { .. } => self.built_images.get(&container.name),
            ImageSource::Pull { reference } => self.pulled_images.get(reference),
        }
    }

    /// Whether `container` is started and has neither exited nor been
    /// stopped.
    pub fn is_running(&self, container: &str) -> bool {
        self.started.contains(container)
            && !self.exited.contains_key(container)
            && !self.stopped.contains(container)
    }

    /// Containers created and not (yet) removed.
    pub fn outstanding_containers(
        &self,
    ) -> impl Iterator<Item = (&ContainerName, &ContainerHandle)> {
        self.created
            .iter()
            .filter(|(name, _)| !self.removed.contains(*name))
    }

    pub fn outstanding_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.temporary_files.difference(&self.deleted_files)
    }

    pub fn outstanding_directories(&self) -> impl Iterator<Item = &PathBuf> {
        self.temporary_directories
            .difference(&self.deleted_directories)
    }

    /// The task network, if it was created and not deleted.
    pub fn outstanding_network(&self) -> Option<&Network> {
        self.network.as_ref().filter(|_| !self.network_deleted)
    }
}
