// src/engine/session.rs

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ProjectConfig;
use crate::dag::{ContainerDependencyGraph, ResolutionError, resolve_execution_order};
use crate::engine::{CancellationContext, ExecutionManager};
use crate::exec::StepRunner;
use crate::report::TaskRunReport;
use crate::types::RunOptions;

/// One task in a session, ready to run.
#[derive(Debug, Clone)]
pub enum PlannedTask {
    /// The task has prerequisites but nothing to run itself.
    OnlyPrerequisites { task_name: String },
    Run {
        graph: ContainerDependencyGraph,
        options: RunOptions,
    },
}

impl PlannedTask {
    pub fn task_name(&self) -> &str {
        match self {
            PlannedTask::OnlyPrerequisites { task_name } => task_name,
            PlannedTask::Run { graph, .. } => graph.task_name(),
        }
    }
}

/// What happened to one task of the session.
#[derive(Debug)]
pub enum TaskOutcome {
    OnlyPrerequisites { task_name: String },
    Ran(TaskRunReport),
}

impl TaskOutcome {
    pub fn exit_code(&self) -> i64 {
        match self {
            TaskOutcome::OnlyPrerequisites { .. } => 0,
            TaskOutcome::Ran(report) => report.exit_code(),
        }
    }

    /// Line printed for a task that only groups its prerequisites.
    pub fn only_prerequisites_message(&self) -> Option<String> {
        match self {
            TaskOutcome::OnlyPrerequisites { task_name } => Some(format!(
                "The task '{task_name}' only defines prerequisite tasks, nothing more to do."
            )),
            TaskOutcome::Ran(_) => None,
        }
    }
}

/// Outcomes of every task that was started, in execution order.
#[derive(Debug, Default)]
pub struct SessionReport {
    pub outcomes: Vec<TaskOutcome>,
}

impl SessionReport {
    /// Exit code of the last task run: the first failure, or the requested
    /// task when everything succeeded.
    pub fn exit_code(&self) -> i64 {
        self.outcomes.last().map_or(0, TaskOutcome::exit_code)
    }
}

/// A requested task plus its prerequisites, run one after another.
///
/// Every task is resolved up front, so a broken prerequisite stops the
/// session before any container is touched. All tasks share one
/// cancellation context.
#[derive(Debug)]
pub struct TaskSession {
    tasks: Vec<PlannedTask>,
    cancellation: CancellationContext,
}

impl TaskSession {
    /// Resolve `options.task_name` and its prerequisites.
    ///
    /// The requested task runs with `options`; prerequisites run with
    /// [`RunOptions::for_prerequisite`].
    pub fn plan(
        config: &ProjectConfig,
        options: &RunOptions,
        skip_prerequisites: bool,
    ) -> Result<Self, ResolutionError> {
        let order = resolve_execution_order(config, &options.task_name, skip_prerequisites)?;

        let mut tasks = Vec::with_capacity(order.len());
        for task_name in order {
            let only_prerequisites = config
                .tasks
                .get(&task_name)
                .is_some_and(|task| task.run.is_none() && !task.prerequisites.is_empty());

            if only_prerequisites {
                tasks.push(PlannedTask::OnlyPrerequisites { task_name });
                continue;
            }

            let graph = ContainerDependencyGraph::resolve(config, &task_name)?;
            let task_options = if task_name == options.task_name {
                options.clone()
            } else {
                options.for_prerequisite(&task_name)
            };
            tasks.push(PlannedTask::Run {
                graph,
                options: task_options,
            });
        }

        Ok(Self {
            tasks,
            cancellation: CancellationContext::new(),
        })
    }

    pub fn tasks(&self) -> &[PlannedTask] {
        &self.tasks
    }

    /// Interrupts whichever task is running and stops the session.
    pub fn cancellation(&self) -> CancellationContext {
        self.cancellation.clone()
    }

    /// Run every task in order, stopping at the first non-zero exit code.
    ///
    /// `runner_for` supplies the step runner for each task's graph. `watch`
    /// may attach to a manager before it starts (e.g. a progress printer);
    /// the returned handle is awaited once that task is over.
    pub async fn run<R, W>(self, mut runner_for: R, mut watch: W) -> SessionReport
    where
        R: FnMut(&ContainerDependencyGraph) -> Arc<dyn StepRunner>,
        W: FnMut(&ExecutionManager) -> Option<JoinHandle<()>>,
    {
        let total = self.tasks.len();
        let mut report = SessionReport::default();

        for (index, task) in self.tasks.into_iter().enumerate() {
            let outcome = match task {
                PlannedTask::OnlyPrerequisites { task_name } => {
                    info!(task = %task_name, "task only defines prerequisites");
                    TaskOutcome::OnlyPrerequisites { task_name }
                }
                PlannedTask::Run { graph, options } => {
                    let runner = runner_for(&graph);
                    let manager = ExecutionManager::new(graph, options, runner)
                        .with_cancellation(self.cancellation.clone());

                    let watcher = watch(&manager);
                    let task_report = manager.run().await;
                    if let Some(handle) = watcher {
                        if let Err(e) = handle.await {
                            debug!(error = %e, "task watcher did not finish cleanly");
                        }
                    }
                    TaskOutcome::Ran(task_report)
                }
            };

            let exit_code = outcome.exit_code();
            report.outcomes.push(outcome);

            if exit_code != 0 {
                info!(
                    exit_code,
                    skipped = total - index - 1,
                    "task did not succeed, not running remaining tasks"
                );
                break;
            }
        }

        report
    }
}
