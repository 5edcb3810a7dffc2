// src/engine/manager.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dag::ContainerDependencyGraph;
use crate::engine::CancellationContext;
use crate::engine::core::{CleanupDecision, RunDecision, TaskStateMachine};
use crate::events::{EventLog, TaskEvent, TaskEventSink};
use crate::exec::{StepContext, StepRunner};
use crate::report::{ManualCleanup, TaskResult, TaskRunReport};
use crate::steps::TaskStep;
use crate::types::RunOptions;

/// Runs one task invocation: the run stage, then cleanup.
///
/// This is the async shell around [`TaskStateMachine`], which owns all the
/// decisions. This struct dispatches steps to a [`StepRunner`], waits for
/// them and watches for cancellation.
pub struct ExecutionManager {
    machine: TaskStateMachine,
    runner: Arc<dyn StepRunner>,
    log: Arc<EventLog>,
    cancellation: CancellationContext,
}

impl fmt::Debug for ExecutionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionManager")
            .field("machine", &self.machine)
            .field("events", &self.log.len())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ExecutionManager {
    pub fn new(
        graph: ContainerDependencyGraph,
        options: RunOptions,
        runner: Arc<dyn StepRunner>,
    ) -> Self {
        Self {
            machine: TaskStateMachine::new(Arc::new(graph), Arc::new(options)),
            runner,
            log: Arc::new(EventLog::new()),
            cancellation: CancellationContext::new(),
        }
    }

    /// Share a cancellation context with other invocations, so one Ctrl-C
    /// interrupts a whole sequence of tasks.
    pub fn with_cancellation(mut self, cancellation: CancellationContext) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Handle that interrupts this invocation when cancelled.
    pub fn cancellation(&self) -> CancellationContext {
        self.cancellation.clone()
    }

    /// Live feed of every event posted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.log.subscribe()
    }

    /// Run the task to completion and clean up after it.
    pub async fn run(self) -> TaskRunReport {
        let task_name = self.machine.graph().task_name().to_string();
        info!(task = %task_name, "task started");

        let run_result = self.run_stage().await;
        info!(task = %task_name, result = ?run_result, "run stage finished");

        let manual_cleanup = self.cleanup_stage(run_result).await;

        let events = self.log.events();
        let duration = self.log.elapsed();
        let result = self.machine.final_result(run_result, &events);
        if manual_cleanup.is_required() {
            warn!(task = %task_name, "manual cleanup required");
        }
        info!(
            task = %task_name,
            exit_code = result.exit_code(),
            duration = ?duration,
            "task finished"
        );

        TaskRunReport {
            task_name,
            result,
            failure_message: self.machine.failure_message(&events, run_result),
            cleanup_failure_messages: self.machine.cleanup_failure_messages(&events),
            manual_cleanup,
            events,
            duration,
        }
    }

    async fn run_stage(&self) -> TaskResult {
        let mut interrupted = false;

        loop {
            if self.cancellation.is_cancelled() {
                self.note_interruption(&mut interrupted);
            }

            match self.machine.next(&self.log.events()) {
                RunDecision::Finished(result) => return result,
                RunDecision::Dispatch(steps) => {
                    self.run_batch(steps, &self.cancellation, Some(&mut interrupted))
                        .await;
                }
                RunDecision::Stalled => {
                    error!("no steps are ready and the task has not finished");
                    self.log.post_event(TaskEvent::ExecutionFailed {
                        message: "The task cannot make progress: no steps are ready to run."
                            .to_string(),
                    });
                }
            }
        }
    }

    async fn cleanup_stage(&self, run_result: TaskResult) -> ManualCleanup {
        match self.machine.cleanup(&self.log.events(), run_result) {
            CleanupDecision::Skip(manual) => {
                info!("cleanup skipped");
                manual
            }
            CleanupDecision::Run(plan) => {
                debug!(groups = plan.groups.len(), "cleanup started");

                // Never cancelled: an interrupt must not stop teardown.
                let cleanup_cancellation = CancellationContext::new();
                for group in plan.groups {
                    self.run_batch(group, &cleanup_cancellation, None).await;
                }

                self.machine.manual_cleanup_after_cleanup(&self.log.events())
            }
        }
    }

    fn note_interruption(&self, interrupted: &mut bool) {
        if !*interrupted {
            *interrupted = true;
            warn!("task execution interrupted");
            self.log.post_event(TaskEvent::UserInterruptedExecution);
        }
    }

    /// Dispatch `steps` concurrently and wait for all of them.
    ///
    /// With `interrupted` set, cancellation is recorded as soon as it is
    /// signalled; in-flight steps are still awaited.
    async fn run_batch(
        &self,
        steps: Vec<TaskStep>,
        cancellation: &CancellationContext,
        mut interrupted: Option<&mut bool>,
    ) {
        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<Id, TaskStep> = HashMap::new();

        for step in steps {
            self.log.post_event(TaskEvent::StepStarting { step: step.clone() });

            let ctx = StepContext {
                graph: Arc::clone(self.machine.shared_graph()),
                options: Arc::clone(self.machine.shared_options()),
                sink: Arc::clone(&self.log) as Arc<dyn TaskEventSink>,
                cancellation: cancellation.clone(),
            };
            let runner = Arc::clone(&self.runner);
            let dispatched = step.clone();

            let handle = tasks.spawn(async move { runner.run_step(dispatched, ctx).await });
            in_flight.insert(handle.id(), step);
        }

        loop {
            let watching = interrupted.as_deref().is_some_and(|noted| !*noted);

            tokio::select! {
                joined = tasks.join_next_with_id() => match joined {
                    None => break,
                    Some(Ok((id, ()))) => {
                        in_flight.remove(&id);
                    }
                    Some(Err(err)) => {
                        let step = in_flight.remove(&err.id());
                        self.report_join_error(step, err);
                    }
                },
                _ = self.cancellation.cancelled(), if watching => {
                    if let Some(noted) = interrupted.as_deref_mut() {
                        self.note_interruption(noted);
                    }
                }
            }
        }
    }

    fn report_join_error(&self, step: Option<TaskStep>, err: tokio::task::JoinError) {
        let step = step.map_or_else(|| "unknown step".to_string(), |s| s.to_string());

        let message = if err.is_panic() {
            format!("Step '{step}' panicked.")
        } else {
            format!("Step '{step}' was aborted.")
        };

        error!(%step, %message, "step did not complete");
        self.log.post_event(TaskEvent::ExecutionFailed { message });
    }
}
