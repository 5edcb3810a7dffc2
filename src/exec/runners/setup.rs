// src/exec/runners/setup.rs

use tracing::{info, warn};

use crate::dag::ContainerName;
use crate::docker::{ContainerHandle, ExecRequest, split_command};
use crate::events::TaskEvent;
use crate::exec::backend::StepContext;
use crate::exec::runner::TaskStepRunner;
use crate::exec::runners::container::{environment_for, user_for};

/// Run the container's setup commands one at a time, in declared order.
/// Stops at the first command that fails; the container becomes ready only
/// once every command has exited with code 0.
pub async fn run_setup_commands(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    container: ContainerName,
    handle: ContainerHandle,
) {
    let Some(definition) = ctx.container(&container) else {
        ctx.post(TaskEvent::ContainerBecameReady { container });
        return;
    };

    let environment = environment_for(runner, ctx, definition);
    let user = user_for(runner, definition);

    for (index, setup) in definition.setup_commands.iter().enumerate() {
        ctx.post(TaskEvent::RunningSetupCommand {
            container: container.clone(),
            command: setup.clone(),
            index,
        });

        let command = match split_command(&setup.command) {
            Ok(command) => command,
            Err(err) => {
                ctx.post(TaskEvent::SetupCommandExecutionError {
                    container,
                    command: setup.clone(),
                    message: err.to_string(),
                });
                return;
            }
        };

        let request = ExecRequest {
            container: handle.clone(),
            command,
            environment: environment.clone(),
            working_directory: setup
                .working_directory
                .clone()
                .or_else(|| definition.working_directory.clone()),
            user: user.clone(),
        };

        match runner
            .engine
            .exec_in_container(&request, &ctx.cancellation)
            .await
        {
            Ok(result) if result.exit_code == 0 => {
                info!(%container, index, command = %setup.command, "setup command succeeded");
            }
            Ok(result) => {
                warn!(%container, index, exit_code = result.exit_code, "setup command failed");
                ctx.post(TaskEvent::SetupCommandFailed {
                    container,
                    command: setup.clone(),
                    exit_code: result.exit_code,
                    output: result.output,
                });
                return;
            }
            Err(err) => {
                warn!(%container, index, error = %err, "could not run setup command");
                ctx.post(TaskEvent::SetupCommandExecutionError {
                    container,
                    command: setup.clone(),
                    message: err.to_string(),
                });
                return;
            }
        }
    }

    ctx.post(TaskEvent::ContainerBecameReady { container });
}
