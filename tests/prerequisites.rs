// tests/prerequisites.rs

mod common;
use std::sync::Arc;

use crate::common::builders::{ContainerConfigBuilder, ProjectConfigBuilder, TaskConfigBuilder};
use crate::common::fake_engine::{EngineCall, FakeContainerEngine};
use crate::common::{init_tracing, test_runner, with_timeout};

use dockhand::config::ProjectConfig;
use dockhand::dag::{ContainerDependencyGraph, ResolutionError, resolve_execution_order};
use dockhand::engine::{PlannedTask, TaskOutcome, TaskSession};
use dockhand::exec::StepRunner;
use dockhand::fs::MockFileSystem;
use dockhand::types::{CleanupPolicy, RunOptions};

/// `test` needs `build` and `lint`; `ci` only groups `test`.
fn shop_config() -> ProjectConfig {
    ProjectConfigBuilder::new("shop")
        .with_container("builder", ContainerConfigBuilder::image("rust:1").command("make").build())
        .with_container("linter", ContainerConfigBuilder::image("lint:1").build())
        .with_container("app", ContainerConfigBuilder::image("app:1").command("run-tests").build())
        .with_task("build", TaskConfigBuilder::run("builder").build())
        .with_task("lint", TaskConfigBuilder::run("linter").prerequisite("build").build())
        .with_task(
            "test",
            TaskConfigBuilder::run("app")
                .prerequisite("build")
                .prerequisite("lint")
                .build(),
        )
        .with_task("ci", TaskConfigBuilder::without_run().prerequisite("test").build())
        .build()
}

fn order(config: &ProjectConfig, task: &str) -> Vec<String> {
    resolve_execution_order(config, task, false).expect("order should resolve")
}

async fn run_session(
    config: &ProjectConfig,
    options: RunOptions,
    engine: &FakeContainerEngine,
) -> dockhand::engine::SessionReport {
    let fs = MockFileSystem::new();
    let session = TaskSession::plan(config, &options, false).expect("session should plan");
    let runner_for = |graph: &ContainerDependencyGraph| -> Arc<dyn StepRunner> {
        Arc::new(test_runner(config, graph.task_name(), engine, &fs))
    };
    with_timeout(session.run(runner_for, |_| None)).await
}

fn created(engine: &FakeContainerEngine, container: &str) -> bool {
    engine
        .position(&EngineCall::CreateContainer {
            container: container.to_string(),
        })
        .is_some()
}

#[test]
fn prerequisites_run_first_and_only_once() {
    let config = shop_config();

    assert_eq!(order(&config, "build"), vec!["build"]);
    assert_eq!(order(&config, "lint"), vec!["build", "lint"]);
    assert_eq!(order(&config, "test"), vec!["build", "lint", "test"]);
    assert_eq!(order(&config, "ci"), vec!["build", "lint", "test", "ci"]);
}

#[test]
fn skipping_prerequisites_leaves_only_the_task() {
    let config = shop_config();
    assert_eq!(
        resolve_execution_order(&config, "ci", true).expect("order should resolve"),
        vec!["ci"]
    );
}

#[test]
fn wildcards_expand_to_matching_tasks_in_name_order() {
    let config = ProjectConfigBuilder::new("shop")
        .with_container("tool", ContainerConfigBuilder::image("tool:1").build())
        .with_task("check.format", TaskConfigBuilder::run("tool").build())
        .with_task("check.docs", TaskConfigBuilder::run("tool").build())
        .with_task("checkout", TaskConfigBuilder::run("tool").build())
        .with_task("docs", TaskConfigBuilder::run("tool").build())
        .with_task(
            "all",
            TaskConfigBuilder::without_run()
                .prerequisite("check.*")
                .prerequisite("docs")
                .build(),
        )
        .build();

    // `.` is literal, so `checkout` does not match.
    assert_eq!(order(&config, "all"), vec!["check.docs", "check.format", "docs", "all"]);
}

#[test]
fn wildcard_without_matches_adds_nothing() {
    let config = ProjectConfigBuilder::new("shop")
        .with_container("tool", ContainerConfigBuilder::image("tool:1").build())
        .with_task("build", TaskConfigBuilder::run("tool").prerequisite("gen-*").build())
        .build();

    assert_eq!(order(&config, "build"), vec!["build"]);
}

#[test]
fn missing_prerequisite_is_reported_with_its_parent() {
    let config = ProjectConfigBuilder::new("shop")
        .with_container("tool", ContainerConfigBuilder::image("tool:1").build())
        .with_task("build", TaskConfigBuilder::run("tool").prerequisite("generate").build())
        .with_task("test", TaskConfigBuilder::run("tool").prerequisite("build").build())
        .build();

    let err = resolve_execution_order(&config, "test", false).unwrap_err();
    assert_eq!(
        err,
        ResolutionError::PrerequisiteDoesNotExist {
            task: "build".to_string(),
            prerequisite: "generate".to_string(),
        }
    );
    assert_eq!(
        err.to_string(),
        "The task 'generate' given as a prerequisite of 'build' does not exist."
    );
}

#[test]
fn unknown_task_is_reported() {
    let err = resolve_execution_order(&shop_config(), "deploy", false).unwrap_err();
    assert_eq!(err, ResolutionError::TaskNotFound("deploy".to_string()));
}

#[test]
fn prerequisite_cycles_are_described_along_the_path() {
    let config = ProjectConfigBuilder::new("shop")
        .with_container("tool", ContainerConfigBuilder::image("tool:1").build())
        .with_task("a", TaskConfigBuilder::run("tool").prerequisite("b").build())
        .with_task("b", TaskConfigBuilder::run("tool").prerequisite("c").build())
        .with_task("c", TaskConfigBuilder::run("tool").prerequisite("a").build())
        .build();

    let err = resolve_execution_order(&config, "a", false).unwrap_err();
    assert_eq!(
        err.to_string(),
        "There is a dependency cycle between tasks: task 'a' has 'b' as a prerequisite, \
         which has 'c' as a prerequisite, which has 'a' as a prerequisite."
    );
    match err {
        ResolutionError::TaskDependencyCycle { path, .. } => {
            assert_eq!(path, vec!["a", "b", "c", "a"]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn wildcard_matching_the_task_itself_is_a_cycle() {
    let config = ProjectConfigBuilder::new("shop")
        .with_container("tool", ContainerConfigBuilder::image("tool:1").build())
        .with_task("check-all", TaskConfigBuilder::without_run().prerequisite("check-*").build())
        .with_task("check-docs", TaskConfigBuilder::run("tool").build())
        .build();

    let err = resolve_execution_order(&config, "check-all", false).unwrap_err();
    assert!(matches!(err, ResolutionError::TaskDependencyCycle { .. }), "{err:?}");
}

#[test]
fn prerequisites_always_clean_up_and_get_no_additional_arguments() {
    let mut options = RunOptions::for_task("test");
    options.additional_arguments = vec!["--verbose".to_string()];
    options.behaviour_after_success = CleanupPolicy::DontCleanup;
    options.behaviour_after_failure = CleanupPolicy::DontCleanup;

    let session = TaskSession::plan(&shop_config(), &options, false).expect("session should plan");

    let planned: Vec<(&str, RunOptions)> = session
        .tasks()
        .iter()
        .map(|task| match task {
            PlannedTask::Run { options, .. } => (task.task_name(), options.clone()),
            PlannedTask::OnlyPrerequisites { task_name } => {
                panic!("{task_name} should run a container")
            }
        })
        .collect();

    assert_eq!(
        planned.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
        vec!["build", "lint", "test"]
    );
    for (name, task_options) in &planned[..2] {
        assert_eq!(task_options.task_name, *name);
        assert!(task_options.additional_arguments.is_empty());
        assert_eq!(task_options.behaviour_after_success, CleanupPolicy::Cleanup);
        assert_eq!(task_options.behaviour_after_failure, CleanupPolicy::DontCleanup);
    }
    assert_eq!(planned[2].1, options);
}

#[test]
fn broken_prerequisite_stops_planning_before_anything_runs() {
    let config = ProjectConfigBuilder::new("shop")
        .with_container("app", ContainerConfigBuilder::image("app:1").build())
        .with_task("docs", TaskConfigBuilder::without_run().build())
        .with_task("test", TaskConfigBuilder::run("app").prerequisite("docs").build())
        .build();

    let err = TaskSession::plan(&config, &RunOptions::for_task("test"), false).unwrap_err();
    assert_eq!(err, ResolutionError::TaskHasNoRunConfiguration("docs".to_string()));
}

#[tokio::test]
async fn session_runs_each_task_on_its_own_network() {
    init_tracing();
    let engine = FakeContainerEngine::new();
    let mut options = RunOptions::for_task("test");
    options.additional_arguments = vec!["--verbose".to_string()];

    let report = run_session(&shop_config(), options, &engine).await;

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.outcomes.len(), 3);

    let builder = engine.creation_request("builder").expect("builder should be created");
    assert_eq!(builder.command, vec!["make"]);
    assert_eq!(builder.network.id, "shop-build-test-id");
    let app = engine.creation_request("app").expect("app should be created");
    assert_eq!(app.command, vec!["run-tests", "--verbose"]);
    assert_eq!(app.network.id, "shop-test-test-id");

    // Each prerequisite is torn down before the next task starts.
    let removed_builder = engine
        .position(&EngineCall::RemoveContainer {
            container: "builder".to_string(),
        })
        .expect("builder should be removed");
    let created_linter = engine
        .position(&EngineCall::CreateContainer {
            container: "linter".to_string(),
        })
        .expect("linter should be created");
    assert!(removed_builder < created_linter);
}

#[tokio::test]
async fn session_stops_at_the_first_failing_task() {
    let engine = FakeContainerEngine::new().exit_code("linter", 3);

    let report = run_session(&shop_config(), RunOptions::for_task("ci"), &engine).await;

    assert_eq!(report.exit_code(), 3);
    let ran: Vec<i64> = report.outcomes.iter().map(TaskOutcome::exit_code).collect();
    assert_eq!(ran, vec![0, 3]);
    assert!(created(&engine, "builder"));
    assert!(created(&engine, "linter"));
    assert!(!created(&engine, "app"), "test should not run: {:#?}", engine.calls());
}

#[tokio::test]
async fn task_with_only_prerequisites_exits_zero() {
    let engine = FakeContainerEngine::new();

    let report = run_session(&shop_config(), RunOptions::for_task("ci"), &engine).await;

    assert_eq!(report.exit_code(), 0);
    let last = report.outcomes.last().expect("ci should be reported");
    assert_eq!(
        last.only_prerequisites_message().as_deref(),
        Some("The task 'ci' only defines prerequisite tasks, nothing more to do.")
    );
    assert!(created(&engine, "app"));
}

#[tokio::test]
async fn cancelled_session_does_not_start_later_tasks() {
    let engine = FakeContainerEngine::new().hang_until_cancelled("builder");
    let fs = MockFileSystem::new();
    let config = shop_config();
    let session = TaskSession::plan(&config, &RunOptions::for_task("test"), false)
        .expect("session should plan");
    let cancellation = session.cancellation();
    let waiting = engine.started_waiting();

    let runner_engine = engine.clone();
    let run = tokio::spawn(async move {
        let runner_for = |graph: &ContainerDependencyGraph| -> Arc<dyn StepRunner> {
            Arc::new(test_runner(&config, graph.task_name(), &runner_engine, &fs))
        };
        session.run(runner_for, |_| None).await
    });
    with_timeout(waiting.notified()).await;
    cancellation.cancel();

    let report = with_timeout(run).await.expect("session task panicked");

    assert_eq!(report.outcomes.len(), 1);
    assert_ne!(report.exit_code(), 0);
    assert!(!created(&engine, "linter"));
    assert!(!created(&engine, "app"));
}
