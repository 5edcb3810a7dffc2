// src/progress.rs

//! Console progress lines for a running task.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::TaskEvent;

/// One-line description of a state change, or `None` for events that are not
/// worth a line (progress, bookkeeping and failures, which are reported
/// separately once the task is over).
pub fn describe(event: &TaskEvent) -> Option<String> {
    let line = match event {
        TaskEvent::TaskNetworkCreated { .. } => "Created task network.".to_string(),
        TaskEvent::CachesInitialised => "Caches initialised.".to_string(),
        TaskEvent::ImageBuilt { container, .. } => format!("Built image for {container}."),
        TaskEvent::ImagePulled { reference, .. } => format!("Pulled {reference}."),
        TaskEvent::ContainerCreated { container, .. } => format!("Created {container}."),
        TaskEvent::ContainerStarted { container } => format!("Started {container}."),
        TaskEvent::ContainerBecameHealthy { container } => format!("{container} is healthy."),
        TaskEvent::RunningSetupCommand {
            container,
            command,
            ..
        } => format!("Running setup command '{}' in {container}...", command.command),
        TaskEvent::ContainerBecameReady { container } => format!("{container} is ready."),
        TaskEvent::RunningContainerExited {
            container,
            exit_code,
        } => format!("{container} exited with code {exit_code}."),
        TaskEvent::ContainerStopped { container } => format!("Stopped {container}."),
        TaskEvent::ContainerRemoved { container } => format!("Removed {container}."),
        TaskEvent::TaskNetworkDeleted { .. } => "Deleted task network.".to_string(),
        TaskEvent::UserInterruptedExecution => "Interrupt received, cleaning up...".to_string(),
        _ => return None,
    };

    Some(line)
}

/// Print a line for every described event until the log is dropped.
pub fn spawn_progress_printer(mut events: broadcast::Receiver<TaskEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = describe(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "progress printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
