// src/lib.rs

pub mod caches;
pub mod cli;
pub mod config;
pub mod dag;
pub mod docker;
pub mod engine;
pub mod errors;
pub mod events;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod planner;
pub mod progress;
pub mod proxy;
pub mod report;
pub mod steps;
pub mod types;
pub mod user;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::caches::CacheMountResolver;
use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::dag::{ContainerDependencyGraph, ImageSource};
use crate::docker::DockerCli;
use crate::engine::{
    CancellationContext, ExecutionManager, PlannedTask, SessionReport, TaskOutcome, TaskSession,
};
use crate::exec::{RunNaming, StepRunner, TaskStepRunner};
use crate::fs::RealFileSystem;
use crate::progress::spawn_progress_printer;
use crate::report::TaskRunReport;

/// Exit code used when a second Ctrl-C abandons cleanup.
const FORCED_EXIT_CODE: i32 = 130;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading and resolution of the task and its prerequisites
/// - the docker CLI engine and a step runner per task
/// - the task session, with a progress printer on each task's event feed
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let config = load_and_validate(&config_path)?;
    let options = args.run_options();

    let session = TaskSession::plan(&config, &options, args.skip_prerequisites)?;

    if args.dry_run {
        print_dry_run(session.tasks());
        return Ok(0);
    }

    let engine = Arc::new(DockerCli::new());
    let caches = CacheMountResolver::from_config(&config);
    let runner_for = |graph: &ContainerDependencyGraph| -> Arc<dyn StepRunner> {
        let naming = RunNaming::new(graph.project_name(), graph.task_name());
        debug!(network = %naming.network_name(), "resolved engine names");
        Arc::new(TaskStepRunner::new(
            engine.clone(),
            Arc::new(RealFileSystem),
            naming,
            caches.clone(),
        ))
    };

    let mut started = 0usize;
    let watch = |manager: &ExecutionManager| -> Option<JoinHandle<()>> {
        if started > 0 {
            println!();
        }
        started += 1;
        Some(spawn_progress_printer(manager.subscribe()))
    };

    spawn_interrupt_handler(session.cancellation());

    let report = session.run(runner_for, watch).await;

    print_session_report(&report);
    info!(exit_code = report.exit_code(), "done");

    Ok(i32::try_from(report.exit_code()).unwrap_or(1))
}

/// First Ctrl-C cancels the running task, which still cleans up. A second
/// one exits immediately.
fn spawn_interrupt_handler(cancellation: CancellationContext) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        warn!("interrupt received, cancelling task");
        cancellation.cancel();

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        error!("second interrupt received, exiting without cleaning up");
        std::process::exit(FORCED_EXIT_CODE);
    });
}

fn print_session_report(report: &SessionReport) {
    for outcome in &report.outcomes {
        match outcome {
            TaskOutcome::OnlyPrerequisites { .. } => {
                if let Some(message) = outcome.only_prerequisites_message() {
                    println!("{message}");
                }
            }
            TaskOutcome::Ran(task_report) => print_report(task_report),
        }
    }
}

fn print_report(report: &TaskRunReport) {
    if let Some(message) = &report.failure_message {
        eprintln!("\n{message}");
    }
    for message in &report.cleanup_failure_messages {
        eprintln!("\n{message}");
    }
    if let Some(message) = report.manual_cleanup_message() {
        eprintln!("\n{message}");
    }
}

/// Dry-run output: the execution order, then for each task its containers,
/// their images and dependencies, and the order they would be cleaned up in.
fn print_dry_run(tasks: &[PlannedTask]) {
    println!("dockhand dry-run");
    let order: Vec<&str> = tasks.iter().map(PlannedTask::task_name).collect();
    println!("  execution order = {}", order.join(", "));

    for task in tasks {
        println!();
        match task {
            PlannedTask::OnlyPrerequisites { task_name } => {
                println!("  task = {task_name} (prerequisites only)");
            }
            PlannedTask::Run { graph, .. } => print_graph(graph),
        }
    }

    debug!("dry-run complete (no execution)");
}

fn print_graph(graph: &ContainerDependencyGraph) {
    println!("  project = {}", graph.project_name());
    println!("  task = {}", graph.task_name());
    println!("  main container = {}", graph.task_container().name);
    if let Some(command) = &graph.run_configuration().command {
        println!("  command = {command}");
    }
    println!();

    println!("containers ({}):", graph.nodes().count());
    for container in graph.containers() {
        println!("  - {}", container.name);
        match &container.image_source {
            ImageSource::Build {
                build_directory,
                dockerfile,
                ..
            } => println!(
                "      build: {} ({dockerfile})",
                build_directory.display()
            ),
            ImageSource::Pull { reference } => println!("      image: {reference}"),
        }
        if let Some(deps) = graph.dependencies_of(&container.name) {
            if !deps.is_empty() {
                println!("      depends on: {:?}", deps);
            }
        }
        if !container.setup_commands.is_empty() {
            println!("      setup commands: {}", container.setup_commands.len());
        }
        if container.runs_as_current_user() {
            println!("      run as current user: true");
        }
    }
    println!();

    let all: BTreeSet<_> = graph.containers().map(|c| c.name.clone()).collect();
    println!("cleanup order:");
    for (level, group) in graph.cleanup_order(&all).iter().enumerate() {
        println!("  {}. {}", level + 1, group.join(", "));
    }
}
