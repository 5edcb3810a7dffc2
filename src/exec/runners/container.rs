// src/exec/runners/container.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::caches::CacheStore;
use crate::dag::{Container, ContainerName, RunAsCurrentUser, VolumeMount};
use crate::docker::{
    ContainerCreationRequest, ContainerHandle, Image, MountSource, MountSpec, Network,
    split_command,
};
use crate::events::TaskEvent;
use crate::exec::backend::StepContext;
use crate::exec::runner::TaskStepRunner;

pub async fn create(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    container: ContainerName,
    image: Image,
    network: Network,
) {
    let Some(definition) = ctx.container(&container) else {
        ctx.post(TaskEvent::ContainerCreationFailed {
            message: format!("Container '{container}' is not part of this task."),
            container,
        });
        return;
    };

    let request = match creation_request(runner, ctx, definition, image, network) {
        Ok(request) => request,
        Err(err) => {
            warn!(%container, error = %err, "could not prepare container");
            ctx.post(TaskEvent::ContainerCreationFailed {
                container,
                message: format!("{err:#}"),
            });
            return;
        }
    };

    match runner.engine.create_container(&request).await {
        Ok(handle) => {
            info!(%container, %handle, "created container");
            ctx.post(TaskEvent::ContainerCreated { container, handle });
        }
        Err(err) => {
            warn!(%container, error = %err, "container creation failed");
            ctx.post(TaskEvent::ContainerCreationFailed {
                container,
                message: err.to_string(),
            });
        }
    }
}

fn creation_request(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    container: &Container,
    image: Image,
    network: Network,
) -> Result<ContainerCreationRequest> {
    let mut mounts: Vec<MountSpec> = container
        .volume_mounts
        .iter()
        .map(|mount| mount_spec(runner, mount))
        .collect();

    let user = match &container.run_as_current_user {
        RunAsCurrentUser::Disabled => None,
        RunAsCurrentUser::Enabled { home_directory } => {
            mounts.extend(current_user_mounts(runner, ctx, &container.name, home_directory)?);
            Some(runner.user.user_and_group())
        }
    };

    Ok(ContainerCreationRequest {
        name: runner.naming.container_name(&container.name),
        image,
        network,
        network_alias: Some(container.name.clone()),
        command: command_for(ctx, container)?,
        environment: environment_for(runner, ctx, container),
        working_directory: container.working_directory.clone(),
        mounts,
        user,
    })
}

/// The command a container runs: the task's override for the main container,
/// else its own; CLI arguments are appended for the main container.
fn command_for(ctx: &StepContext, container: &Container) -> Result<Vec<String>> {
    let is_main = ctx.graph.is_task_container(&container.name);

    let configured = if is_main {
        ctx.graph
            .run_configuration()
            .command
            .as_ref()
            .or(container.command.as_ref())
    } else {
        container.command.as_ref()
    };

    let mut command = match configured {
        Some(command) => split_command(command)
            .with_context(|| format!("Command for container '{}' is invalid", container.name))?,
        None => Vec::new(),
    };

    if is_main {
        command.extend(ctx.options.additional_arguments.iter().cloned());
    }

    Ok(command)
}

/// Environment for a container and for commands exec'd into it.
///
/// Precedence, lowest first: propagated proxy variables, the container's own
/// environment, the task's run environment (main container only).
pub(crate) fn environment_for(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    container: &Container,
) -> BTreeMap<String, String> {
    let mut environment = if ctx.options.propagate_proxy_environment_variables {
        let names: Vec<String> = ctx.graph.containers().map(|c| c.name.clone()).collect();
        runner.proxy.variables(&names)
    } else {
        BTreeMap::new()
    };

    environment.extend(container.environment.clone());

    if ctx.graph.is_task_container(&container.name) {
        environment.extend(ctx.graph.run_configuration().environment.clone());
    }

    environment
}

/// `uid:gid` commands in this container run as, if any.
pub(crate) fn user_for(runner: &TaskStepRunner, container: &Container) -> Option<String> {
    container
        .runs_as_current_user()
        .then(|| runner.user.user_and_group())
}

fn mount_spec(runner: &TaskStepRunner, mount: &VolumeMount) -> MountSpec {
    match mount {
        VolumeMount::Local {
            local_path,
            container_path,
            options,
        } => MountSpec {
            source: MountSource::HostPath(local_path.clone()),
            container_path: container_path.clone(),
            options: options.clone(),
        },
        VolumeMount::Cache {
            name,
            container_path,
        } => {
            let source = match runner.caches.store_for(name) {
                CacheStore::Volume(volume) => MountSource::Volume(volume),
                CacheStore::Directory(path) => MountSource::HostPath(path),
            };
            MountSpec {
                source,
                container_path: container_path.clone(),
                options: None,
            }
        }
    }
}

/// Generate `/etc/passwd`, `/etc/group` and a home directory for a
/// run-as-current-user container. Each resource is announced as soon as it
/// exists so cleanup finds it even if a later one fails.
fn current_user_mounts(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    container: &ContainerName,
    home_directory: &str,
) -> Result<Vec<MountSpec>> {
    let base = runner.fs.temp_dir();

    let passwd = runner.naming.temporary_path(&base, container, "passwd");
    let passwd_contents = runner.user.passwd_file(home_directory);
    write_temporary_file(runner, ctx, container, &passwd, &passwd_contents)?;

    let group = runner.naming.temporary_path(&base, container, "group");
    write_temporary_file(runner, ctx, container, &group, &runner.user.group_file())?;

    let home = runner.naming.temporary_path(&base, container, "home");
    runner
        .fs
        .create_dir_all(&home)
        .context("Could not create home directory for the current user")?;
    ctx.post(TaskEvent::TemporaryDirectoryCreated {
        container: container.clone(),
        path: home.clone(),
    });

    Ok(vec![
        read_only_mount(passwd, "/etc/passwd"),
        read_only_mount(group, "/etc/group"),
        MountSpec {
            source: MountSource::HostPath(home),
            container_path: home_directory.to_string(),
            options: None,
        },
    ])
}

fn write_temporary_file(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    container: &ContainerName,
    path: &Path,
    contents: &str,
) -> Result<()> {
    runner
        .fs
        .write(path, contents.as_bytes())
        .with_context(|| format!("Could not write temporary file {}", path.display()))?;
    debug!(%container, path = %path.display(), "wrote temporary file");
    ctx.post(TaskEvent::TemporaryFileCreated {
        container: container.clone(),
        path: path.to_path_buf(),
    });
    Ok(())
}

fn read_only_mount(path: PathBuf, container_path: &str) -> MountSpec {
    MountSpec {
        source: MountSource::HostPath(path),
        container_path: container_path.to_string(),
        options: Some("ro".to_string()),
    }
}

pub async fn start(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    container: ContainerName,
    handle: ContainerHandle,
) {
    match runner.engine.start_container(&handle).await {
        Ok(()) => {
            info!(%container, "started container");
            ctx.post(TaskEvent::ContainerStarted { container });
        }
        Err(err) => {
            warn!(%container, error = %err, "container start failed");
            ctx.post(TaskEvent::ContainerRunFailed {
                container,
                message: err.to_string(),
            });
        }
    }
}

/// Attach to the main container and wait for it to exit.
pub async fn run(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    container: ContainerName,
    handle: ContainerHandle,
) {
    match runner.engine.wait_for_exit(&handle, &ctx.cancellation).await {
        Ok(exit_code) => {
            info!(%container, exit_code, "container exited");
            ctx.post(TaskEvent::RunningContainerExited {
                container,
                exit_code,
            });
        }
        Err(err) => {
            warn!(%container, error = %err, "container run failed");
            ctx.post(TaskEvent::ContainerRunFailed {
                container,
                message: err.to_string(),
            });
        }
    }
}

pub async fn stop(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    container: ContainerName,
    handle: ContainerHandle,
) {
    match runner.engine.stop_container(&handle).await {
        Ok(()) => {
            debug!(%container, "stopped container");
            ctx.post(TaskEvent::ContainerStopped { container });
        }
        Err(err) => {
            warn!(%container, error = %err, "could not stop container");
            ctx.post(TaskEvent::ContainerStopFailed {
                container,
                message: err.to_string(),
            });
        }
    }
}

pub async fn remove(
    runner: &TaskStepRunner,
    ctx: &StepContext,
    container: ContainerName,
    handle: ContainerHandle,
) {
    match runner.engine.remove_container(&handle).await {
        Ok(()) => {
            debug!(%container, "removed container");
            ctx.post(TaskEvent::ContainerRemoved { container });
        }
        Err(err) => {
            warn!(%container, error = %err, "could not remove container");
            ctx.post(TaskEvent::ContainerRemovalFailed {
                container,
                message: err.to_string(),
            });
        }
    }
}
