// src/engine/core.rs

//! Pure task state machine.
//!
//! This module contains the synchronous, deterministic core of a task
//! invocation. Given an event log snapshot it decides:
//! - which steps to dispatch next, or whether the run stage is over
//! - how the task ended
//! - whether and how to clean up, and what is left for the user to remove
//!
//! The async shell (`engine::manager::ExecutionManager`) is responsible for
//! dispatching steps, waiting for them and reacting to cancellation.
//!
//! The core is tested without any Tokio, engine or filesystem.

use std::sync::Arc;

use tracing::debug;

use crate::dag::ContainerDependencyGraph;
use crate::events::TaskEvent;
use crate::planner::{
    CleanupPlan, CleanupStagePlanner, ExecutionSummary, RunStagePlanner, manual_cleanup_commands,
};
use crate::report::{ManualCleanup, TaskResult, format_failure};
use crate::steps::TaskStep;
use crate::types::{CleanupPolicy, RunOptions};

/// What the run stage should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunDecision {
    /// Dispatch these steps as one batch.
    Dispatch(Vec<TaskStep>),
    /// The run stage is over.
    Finished(TaskResult),
    /// Not finished, yet nothing can make progress.
    Stalled,
}

/// How the cleanup stage should proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupDecision {
    /// Run these groups in order.
    Run(CleanupPlan),
    /// Cleanup is disabled for this outcome; the user gets these
    /// instructions instead.
    Skip(ManualCleanup),
}

/// Pure decision-making for one task invocation.
///
/// Holds no mutable state; every decision is a function of the graph, the
/// run options and an event log snapshot.
#[derive(Debug, Clone)]
pub struct TaskStateMachine {
    graph: Arc<ContainerDependencyGraph>,
    options: Arc<RunOptions>,
}

impl TaskStateMachine {
    pub fn new(graph: Arc<ContainerDependencyGraph>, options: Arc<RunOptions>) -> Self {
        Self { graph, options }
    }

    pub fn graph(&self) -> &ContainerDependencyGraph {
        &self.graph
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub(crate) fn shared_graph(&self) -> &Arc<ContainerDependencyGraph> {
        &self.graph
    }

    pub(crate) fn shared_options(&self) -> &Arc<RunOptions> {
        &self.options
    }

    /// Next run-stage decision. Only called with no steps in flight.
    pub fn next(&self, events: &[TaskEvent]) -> RunDecision {
        let summary = ExecutionSummary::from_events(events);

        if let Some(result) = self.run_result(&summary) {
            return RunDecision::Finished(result);
        }

        let mut steps = RunStagePlanner::next_steps_from_summary(&self.graph, &summary);
        if steps.is_empty() {
            return RunDecision::Stalled;
        }

        if let Some(limit) = self.options.max_parallelism {
            steps.truncate(limit.max(1));
        }

        RunDecision::Dispatch(steps)
    }

    /// How the run stage ended, if it has.
    ///
    /// Interruption wins over any failure it caused; a failure wins over the
    /// main container having exited.
    fn run_result(&self, summary: &ExecutionSummary) -> Option<TaskResult> {
        if summary.interrupted {
            return Some(TaskResult::Cancelled);
        }
        if summary.has_failed() {
            return Some(TaskResult::Failed);
        }
        summary
            .exited
            .get(&self.graph.task_container().name)
            .map(|exit_code| TaskResult::Succeeded {
                exit_code: *exit_code,
            })
    }

    /// Decide whether to clean up after a run that ended with `result`.
    ///
    /// An interrupted task is always cleaned up. Otherwise the policy for the
    /// outcome applies, but only once a container exists: with nothing to
    /// inspect there is no reason to keep the rest around.
    pub fn cleanup(&self, events: &[TaskEvent], result: TaskResult) -> CleanupDecision {
        let summary = ExecutionSummary::from_events(events);
        let plan = CleanupStagePlanner::plan_from_summary(&self.graph, &summary);

        let policy = match result {
            TaskResult::Succeeded { .. } => self.options.behaviour_after_success,
            TaskResult::Failed => self.options.behaviour_after_failure,
            TaskResult::Cancelled => CleanupPolicy::Cleanup,
        };

        if policy == CleanupPolicy::DontCleanup && !summary.created.is_empty() {
            debug!(?result, "cleanup disabled for this outcome");
            let commands = plan.manual_commands;
            let manual = match result {
                TaskResult::Succeeded { .. } => {
                    ManualCleanup::DueToTaskSuccessWithCleanupDisabled { commands }
                }
                TaskResult::Failed | TaskResult::Cancelled => {
                    ManualCleanup::DueToTaskFailureWithCleanupDisabled { commands }
                }
            };
            return CleanupDecision::Skip(manual);
        }

        CleanupDecision::Run(plan)
    }

    /// What is left for the user after cleanup has run.
    pub fn manual_cleanup_after_cleanup(&self, events: &[TaskEvent]) -> ManualCleanup {
        let summary = ExecutionSummary::from_events(events);
        let commands = manual_cleanup_commands(&summary);

        if commands.is_empty() {
            ManualCleanup::NotRequired
        } else {
            ManualCleanup::DueToCleanupFailure { commands }
        }
    }

    /// Final result once cleanup is over: a failed cleanup fails an
    /// otherwise successful task.
    pub fn final_result(&self, run_result: TaskResult, events: &[TaskEvent]) -> TaskResult {
        let summary = ExecutionSummary::from_events(events);

        match run_result {
            TaskResult::Succeeded { .. } if !summary.cleanup_failures.is_empty() => {
                TaskResult::Failed
            }
            other => other,
        }
    }

    /// User-facing description of why the run stage did not succeed.
    pub fn failure_message(&self, events: &[TaskEvent], result: TaskResult) -> Option<String> {
        match result {
            TaskResult::Succeeded { .. } => None,
            TaskResult::Cancelled => {
                format_failure(&TaskEvent::UserInterruptedExecution, &self.options)
            }
            TaskResult::Failed => ExecutionSummary::from_events(events)
                .first_failure
                .and_then(|event| format_failure(&event, &self.options)),
        }
    }

    /// User-facing descriptions of every failure posted during cleanup.
    pub fn cleanup_failure_messages(&self, events: &[TaskEvent]) -> Vec<String> {
        ExecutionSummary::from_events(events)
            .cleanup_failures
            .iter()
            .filter_map(|event| format_failure(event, &self.options))
            .collect()
    }
}
