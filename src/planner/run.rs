// src/planner/run.rs

use tracing::trace;

use crate::dag::{Container, ContainerDependencyGraph, ImageSource};
use crate::events::TaskEvent;
use crate::planner::summary::ExecutionSummary;
use crate::steps::TaskStep;

/// Decides which run steps have become valid.
///
/// A pure function of the graph and an event log snapshot: the same inputs
/// always produce the same steps in the same order. Containers are visited in
/// name order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStagePlanner;

impl RunStagePlanner {
    /// Steps whose preconditions are satisfied and for which no equal step
    /// has been dispatched yet. Empty once the task has failed or the main
    /// container has exited.
    pub fn next_steps(graph: &ContainerDependencyGraph, events: &[TaskEvent]) -> Vec<TaskStep> {
        let summary = ExecutionSummary::from_events(events);
        Self::next_steps_from_summary(graph, &summary)
    }

    pub fn next_steps_from_summary(
        graph: &ContainerDependencyGraph,
        summary: &ExecutionSummary,
    ) -> Vec<TaskStep> {
        if summary.has_failed() {
            return Vec::new();
        }

        if summary.exited.contains_key(&graph.task_container().name) {
            return Vec::new();
        }

        let mut planned = PlannedSteps {
            summary,
            steps: Vec::new(),
        };

        planned.push(TaskStep::CreateTaskNetwork);
        planned.push(TaskStep::InitialiseCaches);

        for container in graph.containers() {
            if !summary.created.contains_key(&container.name) {
                planned.push(image_step(graph, container));
            }
            if let Some(step) = container_step(graph, summary, container) {
                planned.push(step);
            }
        }

        trace!(steps = ?planned.steps, "planned run steps");
        planned.steps
    }
}

struct PlannedSteps<'a> {
    summary: &'a ExecutionSummary,
    steps: Vec<TaskStep>,
}

impl PlannedSteps<'_> {
    fn push(&mut self, step: TaskStep) {
        if !self.summary.was_dispatched(&step) && !self.steps.contains(&step) {
            self.steps.push(step);
        }
    }
}

fn image_step(graph: &ContainerDependencyGraph, container: &Container) -> TaskStep {
    match &container.image_source {
        ImageSource::Build { .. } => TaskStep::BuildImage {
            container: container.name.clone(),
            tags: vec![image_tag(graph.project_name(), &container.name)],
        },
        ImageSource::Pull { reference } => TaskStep::PullImage {
            reference: reference.clone(),
        },
    }
}

/// Tag given to images built for `container`.
pub fn image_tag(project_name: &str, container: &str) -> String {
    format!("{project_name}-{container}")
}

/// The next lifecycle step for `container`, if its preconditions hold.
fn container_step(
    graph: &ContainerDependencyGraph,
    summary: &ExecutionSummary,
    container: &Container,
) -> Option<TaskStep> {
    let name = container.name.clone();

    let Some(handle) = summary.created.get(&container.name) else {
        let image = summary.image_for(container)?;
        let network = summary.network.as_ref()?;
        if !summary.caches_initialised {
            return None;
        }

        let dependencies_ready = graph
            .dependencies_of(&container.name)
            .map(|deps| deps.iter().all(|d| summary.ready.contains(d)))
            .unwrap_or(true);
        if !dependencies_ready {
            return None;
        }

        return Some(TaskStep::CreateContainer {
            container: name,
            image: image.clone(),
            network: network.clone(),
        });
    };

    let handle = handle.clone();

    if !summary.started.contains(&container.name) {
        Some(TaskStep::StartContainer {
            container: name,
            handle,
        })
    } else if !summary.healthy.contains(&container.name) {
        Some(TaskStep::WaitForContainerToBecomeHealthy {
            container: name,
            handle,
        })
    } else if !summary.ready.contains(&container.name) {
        Some(TaskStep::RunContainerSetupCommands {
            container: name,
            handle,
        })
    } else if graph.is_task_container(&container.name) {
        Some(TaskStep::RunContainer {
            container: name,
            handle,
        })
    } else {
        None
    }
}
