// src/exec/runners/health.rs

use tracing::{debug, info, warn};

use crate::dag::ContainerName;
use crate::docker::{ContainerHandle, ContainerInspection, EngineEventKind, EventFilter};
use crate::events::TaskEvent;
use crate::exec::backend::StepContext;
use crate::exec::runner::TaskStepRunner;

const EXITED_BEFORE_HEALTHY: &str = "The container exited before becoming healthy.";

const UNHEALTHY_PREFIX: &str = "The configured health check did not indicate that the container was healthy within the timeout period.";

/// Wait until `handle` reports healthy. Containers without a health check are
/// healthy as soon as they have started.
pub async fn wait_until_healthy(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    container: ContainerName,
    handle: ContainerHandle,
) {
    match check(runner, ctx, &handle).await {
        Ok(()) => {
            info!(%container, "container is healthy");
            ctx.post(TaskEvent::ContainerBecameHealthy { container });
        }
        Err(message) => {
            warn!(%container, %message, "container did not become healthy");
            ctx.post(TaskEvent::ContainerDidNotBecomeHealthy { container, message });
        }
    }
}

async fn check(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    handle: &ContainerHandle,
) -> Result<(), String> {
    let inspection = runner
        .engine
        .inspect_container(handle)
        .await
        .map_err(|err| format!("Could not check the container's health: {err}"))?;

    if !inspection.has_health_check {
        debug!(container = %handle, "no health check configured");
        return Ok(());
    }

    let filter = EventFilter {
        container: handle.clone(),
        kinds: vec![
            EngineEventKind::Healthy,
            EngineEventKind::Unhealthy,
            EngineEventKind::Died,
        ],
    };

    let event = runner
        .engine
        .wait_for_event(&filter, &ctx.cancellation)
        .await
        .map_err(|err| format!("Waiting for the container to become healthy failed: {err}"))?;

    match event.kind {
        EngineEventKind::Healthy => Ok(()),
        EngineEventKind::Died => Err(EXITED_BEFORE_HEALTHY.to_string()),
        EngineEventKind::Unhealthy => {
            let inspection = runner
                .engine
                .inspect_container(handle)
                .await
                .map_err(|err| {
                    format!(
                        "{UNHEALTHY_PREFIX} Could not retrieve the last health check result: {err}"
                    )
                })?;
            Err(unhealthy_message(&inspection))
        }
    }
}

/// Describe why a container that reported unhealthy failed its last check.
pub fn unhealthy_message(inspection: &ContainerInspection) -> String {
    let Some(last) = inspection.last_health_check() else {
        return format!("{UNHEALTHY_PREFIX} The container has no recorded health check results.");
    };

    if last.exit_code == 0 {
        return format!(
            "{UNHEALTHY_PREFIX} The most recent health check exited with code 0, which usually indicates that the container became healthy just after the timeout period expired."
        );
    }

    let output = last.output.trim();
    if output.is_empty() {
        format!(
            "{UNHEALTHY_PREFIX} The last health check exited with code {} but did not produce any output.",
            last.exit_code
        )
    } else {
        format!(
            "{UNHEALTHY_PREFIX} The last health check exited with code {} and output:\n{output}",
            last.exit_code
        )
    }
}
