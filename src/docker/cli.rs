// src/docker/cli.rs

//! [`ContainerEngine`] implementation that drives the `docker` command-line
//! client as child processes.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::docker::client::{ContainerEngine, EngineError, EngineResult, ProgressCallback};
use crate::docker::model::{
    BuildProgress, ContainerCreationRequest, ContainerHandle, ContainerInspection, EngineEvent,
    EngineEventKind, EventFilter, ExecRequest, ExecResult, HealthCheckResult, Image,
    ImageBuildRequest, Network, PullProgress,
};
use crate::engine::CancellationContext;

/// Classic builder output: `Step 2/5 : RUN make`.
static CLASSIC_STEP_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^Step (\d+)/(\d+) : (.*)$").ok());

/// BuildKit plain output: `#7 [builder 2/5] RUN make`.
static BUILDKIT_STEP_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^#\d+ \[(?:[^\]\s]+ )?(\d+)/(\d+)\] (.*)$").ok());

/// Number of trailing output lines kept for error messages.
const OUTPUT_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("docker"),
        }
    }

    fn command(&self, args: &[OsString]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Run to completion, returning trimmed stdout. A non-zero exit is mapped
    /// through `on_failure` with the trimmed stderr.
    async fn run_checked(
        &self,
        args: Vec<OsString>,
        on_failure: fn(String) -> EngineError,
    ) -> EngineResult<String> {
        debug!(args = ?args, "running docker command");

        let output = self
            .command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(on_failure(describe_failure(output.status, &stderr)))
        }
    }

    /// Run while forwarding every output line (stdout and stderr) to
    /// `on_line`. Returns the exit status and the last few lines of output.
    async fn run_streaming(
        &self,
        args: Vec<OsString>,
        cancellation: &CancellationContext,
        mut on_line: impl FnMut(&str) + Send,
    ) -> EngineResult<(ExitStatus, String)> {
        debug!(args = ?args, "running streaming docker command");

        let mut child = self
            .command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdout = child.stdout.take().map(|s| BufReader::new(s).lines());
        let mut stderr = child.stderr.take().map(|s| BufReader::new(s).lines());
        let mut tail: Vec<String> = Vec::new();

        while stdout.is_some() || stderr.is_some() {
            let line = tokio::select! {
                _ = cancellation.cancelled() => return Err(EngineError::Cancelled),
                line = next_line(&mut stdout), if stdout.is_some() => {
                    if line.is_none() { stdout = None; }
                    line
                }
                line = next_line(&mut stderr), if stderr.is_some() => {
                    if line.is_none() { stderr = None; }
                    line
                }
            };

            if let Some(line) = line {
                on_line(&line);
                tail.push(line);
                if tail.len() > OUTPUT_TAIL_LINES {
                    tail.remove(0);
                }
            }
        }

        let status = tokio::select! {
            _ = cancellation.cancelled() => return Err(EngineError::Cancelled),
            status = child.wait() => status?,
        };

        Ok((status, tail.join("\n")))
    }

    async fn image_id(&self, reference: &str) -> Option<Image> {
        let args = os_args(["image", "inspect", "--format", "{{.Id}}", reference]);
        self.run_checked(args, EngineError::InspectFailed)
            .await
            .ok()
            .filter(|id| !id.is_empty())
            .map(Image::new)
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn build_image(
        &self,
        request: &ImageBuildRequest,
        cancellation: &CancellationContext,
        progress: &ProgressCallback<'_, BuildProgress>,
    ) -> EngineResult<Image> {
        let mut args = os_args(["build", "--file"]);
        args.push(request.build_directory.join(&request.dockerfile).into());
        for tag in request.tags.iter() {
            args.push("--tag".into());
            args.push(tag.into());
        }
        for (key, value) in request.build_args.iter() {
            args.push("--build-arg".into());
            args.push(format!("{key}={value}").into());
        }
        args.push(request.build_directory.clone().into());

        info!(
            directory = %request.build_directory.display(),
            tags = ?request.tags,
            "building image"
        );

        let (status, tail) = self
            .run_streaming(args, cancellation, |line| {
                if let Some(update) = parse_build_progress(line) {
                    progress(update);
                }
            })
            .await?;

        if !status.success() {
            return Err(EngineError::BuildFailed(describe_failure(status, &tail)));
        }

        let Some(tag) = request.tags.first() else {
            return Err(EngineError::BuildFailed(
                "Image build request had no tags; cannot identify the built image.".to_string(),
            ));
        };

        self.image_id(tag).await.ok_or_else(|| {
            EngineError::BuildFailed(format!("Built image '{tag}' could not be found afterwards."))
        })
    }

    async fn pull_image(
        &self,
        reference: &str,
        force: bool,
        cancellation: &CancellationContext,
        progress: &ProgressCallback<'_, PullProgress>,
    ) -> EngineResult<Image> {
        if !force {
            if let Some(image) = self.image_id(reference).await {
                debug!(reference, "image already present locally; not pulling");
                return Ok(image);
            }
        }

        info!(reference, "pulling image");

        let (status, tail) = self
            .run_streaming(os_args(["pull", reference]), cancellation, |line| {
                progress(PullProgress {
                    message: line.to_string(),
                })
            })
            .await?;

        if !status.success() {
            return Err(EngineError::PullFailed(describe_failure(status, &tail)));
        }

        self.image_id(reference).await.ok_or_else(|| {
            EngineError::PullFailed(format!("Pulled image '{reference}' could not be found afterwards."))
        })
    }

    async fn create_network(&self, name: &str, driver: &str) -> EngineResult<Network> {
        let args = os_args(["network", "create", "--driver", driver, name]);
        let id = self
            .run_checked(args, EngineError::NetworkCreationFailed)
            .await?;
        Ok(Network::new(id))
    }

    async fn delete_network(&self, network: &Network) -> EngineResult<()> {
        let args = os_args(["network", "rm", network.id.as_str()]);
        self.run_checked(args, EngineError::NetworkDeletionFailed)
            .await
            .map(|_| ())
    }

    async fn create_container(
        &self,
        request: &ContainerCreationRequest,
    ) -> EngineResult<ContainerHandle> {
        let args = create_args(request);
        let id = self
            .run_checked(args, EngineError::ContainerCreationFailed)
            .await?;
        Ok(ContainerHandle::new(id, request.name.clone()))
    }

    async fn start_container(&self, container: &ContainerHandle) -> EngineResult<()> {
        let args = os_args(["start", container.id.as_str()]);
        self.run_checked(args, EngineError::ContainerStartFailed)
            .await
            .map(|_| ())
    }

    async fn stop_container(&self, container: &ContainerHandle) -> EngineResult<()> {
        let args = os_args(["stop", container.id.as_str()]);
        self.run_checked(args, EngineError::ContainerStopFailed)
            .await
            .map(|_| ())
    }

    async fn remove_container(&self, container: &ContainerHandle) -> EngineResult<()> {
        let args = os_args(["rm", "--force", "--volumes", container.id.as_str()]);
        self.run_checked(args, EngineError::ContainerRemovalFailed)
            .await
            .map(|_| ())
    }

    async fn wait_for_exit(
        &self,
        container: &ContainerHandle,
        cancellation: &CancellationContext,
    ) -> EngineResult<i64> {
        // Container output goes straight to our own stdout/stderr.
        let mut logs = self
            .command(&os_args(["logs", "--follow", container.id.as_str()]))
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;

        let wait = self.run_checked(
            os_args(["wait", container.id.as_str()]),
            EngineError::ExecFailed,
        );

        let exit_code = tokio::select! {
            _ = cancellation.cancelled() => return Err(EngineError::Cancelled),
            code = wait => code?,
        };

        // `logs --follow` ends on its own once the container has exited.
        if let Err(e) = logs.wait().await {
            warn!(container = %container, error = %e, "log streaming process failed");
        }

        exit_code.trim().parse::<i64>().map_err(|_| {
            EngineError::ExecFailed(format!(
                "Could not determine the exit code of container {container}: unexpected output '{exit_code}'."
            ))
        })
    }

    async fn exec_in_container(
        &self,
        request: &ExecRequest,
        cancellation: &CancellationContext,
    ) -> EngineResult<ExecResult> {
        let mut args = os_args(["exec"]);
        for (key, value) in request.environment.iter() {
            args.push("--env".into());
            args.push(format!("{key}={value}").into());
        }
        if let Some(dir) = &request.working_directory {
            args.push("--workdir".into());
            args.push(dir.into());
        }
        if let Some(user) = &request.user {
            args.push("--user".into());
            args.push(user.into());
        }
        args.push(request.container.id.as_str().into());
        args.extend(request.command.iter().map(OsString::from));

        let mut output = String::new();
        let (status, _) = self
            .run_streaming(args, cancellation, |line| {
                output.push_str(line);
                output.push('\n');
            })
            .await?;

        let Some(exit_code) = status.code() else {
            return Err(EngineError::ExecFailed(format!(
                "The command in container {} was terminated by a signal.",
                request.container
            )));
        };

        Ok(ExecResult {
            exit_code: i64::from(exit_code),
            output,
        })
    }

    async fn inspect_container(
        &self,
        container: &ContainerHandle,
    ) -> EngineResult<ContainerInspection> {
        let args = os_args(["inspect", "--type", "container", container.id.as_str()]);
        let json = self.run_checked(args, EngineError::InspectFailed).await?;
        parse_inspection(&json)
    }

    async fn wait_for_event(
        &self,
        filter: &EventFilter,
        cancellation: &CancellationContext,
    ) -> EngineResult<EngineEvent> {
        // Replay from the container's creation so an event that fired before
        // we started listening is not missed.
        let created = self
            .run_checked(
                os_args(["inspect", "--format", "{{.Created}}", filter.container.id.as_str()]),
                EngineError::EventStreamFailed,
            )
            .await?;

        let mut args = os_args([
            "events",
            "--format",
            "{{json .}}",
            "--since",
            created.as_str(),
            "--filter",
        ]);
        args.push(format!("container={}", filter.container.id).into());
        for kind in filter.kinds.iter() {
            args.push("--filter".into());
            args.push(format!("event={}", kind.filter_value()).into());
        }

        let mut child = self
            .command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let Some(stdout) = child.stdout.take() else {
            return Err(EngineError::EventStreamFailed(
                "Could not read from the engine event stream.".to_string(),
            ));
        };
        let mut lines = BufReader::new(stdout).lines();

        loop {
            let line = tokio::select! {
                _ = cancellation.cancelled() => return Err(EngineError::Cancelled),
                line = lines.next_line() => line?,
            };

            let Some(line) = line else {
                return Err(EngineError::EventStreamFailed(
                    "The engine event stream ended unexpectedly.".to_string(),
                ));
            };

            if let Some(kind) = parse_event_kind(&line) {
                if filter.kinds.contains(&kind) {
                    return Ok(EngineEvent {
                        container_id: filter.container.id.clone(),
                        kind,
                    });
                }
            }
        }
    }
}

async fn next_line<R>(lines: &mut Option<tokio::io::Lines<R>>) -> Option<String>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => None,
    }
}

/// Arguments for `docker create`. The network alias is only passed when
/// set: the daemon refuses aliases on its built-in networks.
pub fn create_args(request: &ContainerCreationRequest) -> Vec<OsString> {
    let mut args = os_args([
        "create",
        "--name",
        request.name.as_str(),
        "--network",
        request.network.id.as_str(),
    ]);

    if let Some(alias) = &request.network_alias {
        args.push("--network-alias".into());
        args.push(alias.into());
    }

    for (key, value) in request.environment.iter() {
        args.push("--env".into());
        args.push(format!("{key}={value}").into());
    }
    if let Some(dir) = &request.working_directory {
        args.push("--workdir".into());
        args.push(dir.into());
    }
    for mount in request.mounts.iter() {
        args.push("--volume".into());
        args.push(mount.to_volume_arg().into());
    }
    if let Some(user) = &request.user {
        args.push("--user".into());
        args.push(user.into());
    }

    args.push(request.image.id.as_str().into());
    args.extend(request.command.iter().map(OsString::from));
    args
}

fn os_args<const N: usize>(args: [&str; N]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

fn describe_failure(status: ExitStatus, output: &str) -> String {
    let code = status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if output.is_empty() {
        format!("docker exited with code {code}.")
    } else {
        format!("docker exited with code {code}: {output}")
    }
}

/// Parse one line of `docker build` output into a progress update.
pub fn parse_build_progress(line: &str) -> Option<BuildProgress> {
    [&*CLASSIC_STEP_LINE, &*BUILDKIT_STEP_LINE]
        .into_iter()
        .flatten()
        .find_map(|re| re.captures(line.trim()))
        .and_then(|caps| {
            Some(BuildProgress {
                step: caps.get(1)?.as_str().parse().ok()?,
                total_steps: caps.get(2)?.as_str().parse().ok()?,
                message: caps.get(3)?.as_str().to_string(),
            })
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    #[serde(default)]
    config: InspectConfig,
    #[serde(default)]
    state: InspectState,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    healthcheck: Option<InspectHealthcheck>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealthcheck {
    #[serde(default)]
    test: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    health: Option<InspectHealth>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    #[serde(default)]
    log: Vec<InspectHealthLogEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealthLogEntry {
    exit_code: i64,
    #[serde(default)]
    output: String,
}

/// Parse `docker inspect` JSON output.
pub fn parse_inspection(json: &str) -> EngineResult<ContainerInspection> {
    let entries: Vec<InspectEntry> = serde_json::from_str(json).map_err(|e| {
        EngineError::InspectFailed(format!("Could not parse container inspection output: {e}"))
    })?;

    let Some(entry) = entries.into_iter().next() else {
        return Err(EngineError::InspectFailed(
            "Container inspection returned no results.".to_string(),
        ));
    };

    let has_health_check = entry
        .config
        .healthcheck
        .map(|h| !h.test.is_empty() && h.test.first().map(String::as_str) != Some("NONE"))
        .unwrap_or(false);

    let health_log = entry
        .state
        .health
        .map(|h| {
            h.log
                .into_iter()
                .map(|l| HealthCheckResult {
                    exit_code: l.exit_code,
                    output: l.output,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ContainerInspection {
        has_health_check,
        health_log,
    })
}

#[derive(Debug, Deserialize)]
struct EventLine {
    #[serde(rename = "Action", default)]
    action: String,
}

fn parse_event_kind(line: &str) -> Option<EngineEventKind> {
    let event: EventLine = serde_json::from_str(line).ok()?;
    match event.action.as_str() {
        "die" => Some(EngineEventKind::Died),
        "health_status: healthy" => Some(EngineEventKind::Healthy),
        "health_status: unhealthy" => Some(EngineEventKind::Unhealthy),
        _ => None,
    }
}
