// src/exec/backend.rs

//! Pluggable step runner abstraction.
//!
//! The execution manager talks to a `StepRunner` instead of the container
//! engine directly. Production code uses [`TaskStepRunner`](super::TaskStepRunner);
//! tests can provide their own implementation that, for example, records the
//! steps it was given and posts canned events.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dag::{Container, ContainerDependencyGraph};
use crate::engine::CancellationContext;
use crate::events::{TaskEvent, TaskEventSink};
use crate::steps::TaskStep;
use crate::types::RunOptions;

/// Everything a step needs besides the step itself. Cheap to clone; every
/// field is shared.
#[derive(Clone)]
pub struct StepContext {
    pub graph: Arc<ContainerDependencyGraph>,
    pub options: Arc<RunOptions>,
    pub sink: Arc<dyn TaskEventSink>,
    pub cancellation: CancellationContext,
}

impl fmt::Debug for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("task", &self.graph.task_name())
            .field("options", &self.options)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl StepContext {
    pub fn post(&self, event: TaskEvent) {
        self.sink.post_event(event);
    }

    /// Look up a container of the task's graph by name.
    pub fn container(&self, name: &str) -> Option<&Container> {
        self.graph.node(name).map(|n| &n.container)
    }
}

/// Trait abstracting how a single step is carried out.
///
/// Implementations must report the outcome of every step as events on
/// `ctx.sink`: exactly one terminal success or failure event, optionally
/// preceded by progress events. Errors never propagate out of `run_step`.
pub trait StepRunner: Send + Sync {
    fn run_step(
        &self,
        step: TaskStep,
        ctx: StepContext,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
