// src/report.rs

//! Outcome of a task invocation and the user-facing messages describing it.

use std::time::Duration;

use crate::events::TaskEvent;
use crate::planner::ExecutionSummary;
use crate::types::{CleanupPolicy, RunOptions};

/// Exit code reported when the task failed.
pub const FAILURE_EXIT_CODE: i64 = -1;

/// Exit code reported when the task was interrupted. Outside the 0..=255
/// range a container can exit with.
pub const CANCELLED_EXIT_CODE: i64 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResult {
    Succeeded { exit_code: i64 },
    Failed,
    Cancelled,
}

impl TaskResult {
    pub fn exit_code(&self) -> i64 {
        match self {
            TaskResult::Succeeded { exit_code } => *exit_code,
            TaskResult::Failed => FAILURE_EXIT_CODE,
            TaskResult::Cancelled => CANCELLED_EXIT_CODE,
        }
    }
}

/// Whether (and why) the user has to remove resources by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualCleanup {
    NotRequired,
    DueToCleanupFailure { commands: Vec<String> },
    DueToTaskFailureWithCleanupDisabled { commands: Vec<String> },
    DueToTaskSuccessWithCleanupDisabled { commands: Vec<String> },
}

impl ManualCleanup {
    pub fn commands(&self) -> &[String] {
        match self {
            ManualCleanup::NotRequired => &[],
            ManualCleanup::DueToCleanupFailure { commands }
            | ManualCleanup::DueToTaskFailureWithCleanupDisabled { commands }
            | ManualCleanup::DueToTaskSuccessWithCleanupDisabled { commands } => commands,
        }
    }

    pub fn is_required(&self) -> bool {
        !matches!(self, ManualCleanup::NotRequired)
    }
}

/// Everything the caller needs once a task invocation is over.
#[derive(Debug, Clone)]
pub struct TaskRunReport {
    pub task_name: String,
    pub result: TaskResult,
    /// Formatted description of the first failure, if the task failed or was
    /// interrupted.
    pub failure_message: Option<String>,
    /// Formatted descriptions of every failure posted during cleanup.
    pub cleanup_failure_messages: Vec<String>,
    pub manual_cleanup: ManualCleanup,
    /// Full event log, in posting order.
    pub events: Vec<TaskEvent>,
    /// Time from the first to the last event, cleanup included.
    pub duration: Option<Duration>,
}

impl TaskRunReport {
    pub fn exit_code(&self) -> i64 {
        self.result.exit_code()
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.result, TaskResult::Succeeded { .. })
    }

    pub fn manual_cleanup_message(&self) -> Option<String> {
        format_manual_cleanup(&self.manual_cleanup, &self.events)
    }
}

/// Human-readable description of a failure event, or `None` for events that
/// are not failures.
pub fn format_failure(event: &TaskEvent, options: &RunOptions) -> Option<String> {
    let hint = rerun_hint(options);

    let message = match event {
        TaskEvent::TaskNetworkCreationFailed { message } => {
            error("Could not create network for task", message)
        }
        TaskEvent::CacheInitialisationFailed { message } => {
            error("Could not initialise caches for task", message)
        }
        TaskEvent::ImageBuildFailed { container, message } => {
            error(&format!("Could not build image for container '{container}'"), message)
        }
        TaskEvent::ImagePullFailed { reference, message } => {
            error(&format!("Could not pull image '{reference}'"), message)
        }
        TaskEvent::ContainerCreationFailed { container, message } => {
            error(&format!("Could not create container '{container}'"), message)
        }
        TaskEvent::ContainerDidNotBecomeHealthy { container, message } => {
            error(&format!("Container '{container}' did not become healthy"), message) + &hint
        }
        TaskEvent::ContainerRunFailed { container, message } => {
            error(&format!("Could not run container '{container}'"), message)
        }
        TaskEvent::SetupCommandExecutionError {
            container,
            command,
            message,
        } => {
            error(
                &format!(
                    "Could not run setup command '{}' in container '{container}'",
                    command.command
                ),
                message,
            ) + &hint
        }
        TaskEvent::SetupCommandFailed {
            container,
            command,
            exit_code,
            output,
        } => {
            let body = if output.trim().is_empty() {
                format!("The command exited with code {exit_code} and did not produce any output.")
            } else {
                format!("The command exited with code {exit_code} and output:\n{}", output.trim_end())
            };
            error(
                &format!(
                    "Setup command '{}' in container '{container}' failed",
                    command.command
                ),
                &body,
            ) + &hint
        }
        TaskEvent::ExecutionFailed { message } => {
            error("An unexpected error occurred during execution", message)
        }
        TaskEvent::UserInterruptedExecution => {
            "Task cancelled: Task execution was interrupted. Cleaning up...".to_string()
        }
        TaskEvent::ContainerStopFailed { container, message } => {
            error(&format!("Could not stop container '{container}'"), message)
        }
        TaskEvent::ContainerRemovalFailed { container, message } => {
            error(&format!("Could not remove container '{container}'"), message)
        }
        TaskEvent::TaskNetworkDeletionFailed { message, .. } => {
            error("Could not delete the task network", message)
        }
        TaskEvent::TemporaryFileDeletionFailed { path, message } => {
            error(&format!("Could not delete temporary file '{}'", path.display()), message)
        }
        TaskEvent::TemporaryDirectoryDeletionFailed { path, message } => error(
            &format!("Could not delete temporary directory '{}'", path.display()),
            message,
        ),
        _ => return None,
    };

    Some(message)
}

fn error(headline: &str, body: &str) -> String {
    format!("Error: {headline}.\n{body}")
}

fn rerun_hint(options: &RunOptions) -> String {
    match options.behaviour_after_failure {
        CleanupPolicy::Cleanup => "\n\nYou can re-run the task with --no-cleanup-after-failure \
            to leave the created containers running to diagnose the issue."
            .to_string(),
        CleanupPolicy::DontCleanup => String::new(),
    }
}

/// Instructions for removing leftover resources by hand, or `None` when
/// nothing is left over.
pub fn format_manual_cleanup(manual: &ManualCleanup, events: &[TaskEvent]) -> Option<String> {
    let commands = manual.commands();
    if commands.is_empty() {
        return None;
    }
    let formatted = commands.join("\n");

    match manual {
        ManualCleanup::NotRequired => None,
        ManualCleanup::DueToCleanupFailure { .. } => {
            let instruction = if commands.len() == 1 {
                "You may need to run the following command to clean up any remaining resources:"
            } else {
                "You may need to run some or all of the following commands to clean up any remaining resources:"
            };
            Some(format!(
                "Clean up has failed, and dockhand cannot guarantee that all temporary resources created have been completely cleaned up.\n{instruction}\n{formatted}"
            ))
        }
        ManualCleanup::DueToTaskFailureWithCleanupDisabled { .. } => Some(cleanup_disabled_message(
            events,
            "--no-cleanup-after-failure",
            "Once you have finished investigating the issue",
            &formatted,
        )),
        ManualCleanup::DueToTaskSuccessWithCleanupDisabled { .. } => Some(cleanup_disabled_message(
            events,
            "--no-cleanup-after-success",
            "Once you have finished using the containers",
            &formatted,
        )),
    }
}

fn cleanup_disabled_message(
    events: &[TaskEvent],
    flag: &str,
    cleanup_phrase: &str,
    formatted_commands: &str,
) -> String {
    let summary = ExecutionSummary::from_events(events);

    let mut message =
        format!("As the task was run with {flag}, the created containers will not be cleaned up.\n");

    for (name, handle) in summary.created.iter() {
        let not_running = !summary.started.contains(name)
            || summary.exited.contains_key(name)
            || summary.stopped.contains(name);

        let exec = if not_running {
            format!("docker start {0}; docker exec -it {0} <command>", handle.name)
        } else {
            format!("docker exec -it {} <command>", handle.name)
        };

        message.push_str(&format!(
            "For container '{name}', view its output by running 'docker logs {}', or run a command in the container with '{exec}'.\n",
            handle.name
        ));
    }

    message.push_str(&format!(
        "\n{cleanup_phrase}, clean up all temporary resources created by dockhand by running:\n{formatted_commands}"
    ));

    message
}
