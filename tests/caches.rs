// tests/caches.rs

mod common;
use crate::common::builders::{ContainerConfigBuilder, ProjectConfigBuilder, TaskConfigBuilder};
use crate::common::fake_engine::{EngineCall, FakeContainerEngine};
use crate::common::{init_tracing, test_manager, with_timeout};

use std::path::PathBuf;

use dockhand::caches::{CacheMountResolver, CacheStore, resolve_caches};
use dockhand::config::ProjectConfig;
use dockhand::dag::ContainerDependencyGraph;
use dockhand::docker::MountSource;
use dockhand::events::TaskEvent;
use dockhand::fs::MockFileSystem;
use dockhand::fs::mock::MockEntry;
use dockhand::report::TaskResult;
use dockhand::types::{CacheType, RunOptions};

/// The fake engine names alias-less containers by their full name.
const INIT_CONTAINER: &str = "shop-cache-init-test";

/// `app` and `worker` share the `deps` cache; `app` also has `build`.
fn config(cache_type: CacheType, app_as_user: bool, worker_as_user: bool) -> ProjectConfig {
    let mut app = ContainerConfigBuilder::image("app:dev")
        .depends_on("worker")
        .cache("deps", "/deps")
        .cache("build", "/build");
    if app_as_user {
        app = app.run_as_current_user("/home/dev");
    }

    let mut worker = ContainerConfigBuilder::image("worker:dev").cache("deps", "/root/deps");
    if worker_as_user {
        worker = worker.run_as_current_user("/home/dev");
    }

    ProjectConfigBuilder::new("shop")
        .with_cache_type(cache_type)
        .with_container("app", app.build())
        .with_container("worker", worker.build())
        .with_task("test", TaskConfigBuilder::run("app").build())
        .build()
}

fn init_failure(events: &[TaskEvent]) -> Option<String> {
    events.iter().find_map(|e| match e {
        TaskEvent::CacheInitialisationFailed { message } => Some(message.clone()),
        _ => None,
    })
}

#[test]
fn volume_caches_are_named_after_the_project() {
    let resolver = CacheMountResolver::new("shop", CacheType::Volume, "/project");

    assert_eq!(
        resolver.store_for("deps"),
        CacheStore::Volume("dockhand-cache-shop-deps".to_string())
    );
}

#[test]
fn directory_caches_live_next_to_the_config() {
    let resolver = CacheMountResolver::new("shop", CacheType::Directory, "/project");

    assert_eq!(
        resolver.store_for("deps"),
        CacheStore::Directory(PathBuf::from("/project/.dockhand/caches/deps"))
    );
}

#[test]
fn shared_caches_are_resolved_once() {
    let config = config(CacheType::Volume, false, false);
    let graph = ContainerDependencyGraph::resolve(&config, "test").expect("graph should resolve");

    let resolution =
        resolve_caches(&graph, &CacheMountResolver::from_config(&config)).expect("no conflict");

    assert_eq!(resolution.len(), 2);
    let deps = resolution.get("deps").expect("deps is used");
    assert_eq!(
        deps.containers.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["app", "worker"]
    );
    assert!(!deps.run_as_current_user);
}

#[test]
fn mixed_run_as_current_user_on_a_shared_cache_conflicts() {
    let config = config(CacheType::Volume, true, false);
    let graph = ContainerDependencyGraph::resolve(&config, "test").expect("graph should resolve");

    let err = resolve_caches(&graph, &CacheMountResolver::from_config(&config)).unwrap_err();

    assert_eq!(err.cache, "deps");
    assert_eq!(err.first, "app");
    assert_eq!(err.second, "worker");
}

#[tokio::test]
async fn root_owned_volume_caches_need_no_initialisation_container() {
    init_tracing();
    let engine = FakeContainerEngine::new();
    let fs = MockFileSystem::new();
    let manager = test_manager(
        &config(CacheType::Volume, false, false),
        RunOptions::for_task("test"),
        &engine,
        &fs,
    );

    let report = with_timeout(manager.run()).await;

    assert_eq!(report.result, TaskResult::Succeeded { exit_code: 0 });
    assert!(
        engine
            .position(&EngineCall::PullImage {
                reference: "busybox:1.36".to_string(),
            })
            .is_none()
    );

    let app = engine.creation_request("app").expect("app was created");
    let deps = app
        .mounts
        .iter()
        .find(|m| m.container_path == "/deps")
        .expect("deps is mounted");
    assert_eq!(
        deps.source,
        MountSource::Volume("dockhand-cache-shop-deps".to_string())
    );
}

#[tokio::test]
async fn volume_caches_for_the_current_user_are_handed_over_first() {
    let engine = FakeContainerEngine::new();
    let fs = MockFileSystem::new();
    let manager = test_manager(
        &config(CacheType::Volume, true, true),
        RunOptions::for_task("test"),
        &engine,
        &fs,
    );

    let report = with_timeout(manager.run()).await;

    assert_eq!(report.result, TaskResult::Succeeded { exit_code: 0 });

    let init = engine
        .creation_request(INIT_CONTAINER)
        .expect("initialisation container was created");
    assert_eq!(init.name, "shop-cache-init-test");
    // The helper runs on the engine's default network, which takes no aliases.
    assert_eq!(init.network.id, "default");
    assert_eq!(init.network_alias, None);
    assert_eq!(
        init.command,
        vec!["sh", "-c", "chown 1000:1000 /caches/0 /caches/1"]
    );
    assert_eq!(
        init.mounts
            .iter()
            .map(|m| m.source.clone())
            .collect::<Vec<_>>(),
        vec![
            MountSource::Volume("dockhand-cache-shop-build".to_string()),
            MountSource::Volume("dockhand-cache-shop-deps".to_string()),
        ]
    );

    let removed = engine
        .position(&EngineCall::RemoveContainer {
            container: INIT_CONTAINER.to_string(),
        })
        .expect("initialisation container was removed");
    let first_task_container = engine
        .position(&EngineCall::CreateContainer {
            container: "worker".to_string(),
        })
        .expect("worker was created");
    assert!(removed < first_task_container);
}

#[tokio::test]
async fn failing_initialisation_container_fails_the_task() {
    let engine = FakeContainerEngine::new().exit_code(INIT_CONTAINER, 1);
    let fs = MockFileSystem::new();
    let manager = test_manager(
        &config(CacheType::Volume, true, true),
        RunOptions::for_task("test"),
        &engine,
        &fs,
    );

    let report = with_timeout(manager.run()).await;

    assert_eq!(report.result, TaskResult::Failed);
    assert_eq!(
        init_failure(&report.events).as_deref(),
        Some("The cache initialisation container exited with code 1.")
    );
    // Removed even though it failed.
    assert!(
        engine
            .position(&EngineCall::RemoveContainer {
                container: INIT_CONTAINER.to_string(),
            })
            .is_some()
    );
    assert!(report.failure_message.is_some_and(|m| m.starts_with(
        "Error: Could not initialise caches for task."
    )));
}

#[tokio::test]
async fn directory_caches_are_created_on_the_host() {
    let engine = FakeContainerEngine::new();
    let fs = MockFileSystem::new();
    let manager = test_manager(
        &config(CacheType::Directory, true, true),
        RunOptions::for_task("test"),
        &engine,
        &fs,
    );

    let report = with_timeout(manager.run()).await;

    assert_eq!(report.result, TaskResult::Succeeded { exit_code: 0 });
    assert_eq!(
        fs.entry("/project/.dockhand/caches/deps"),
        Some(MockEntry::Dir)
    );
    assert_eq!(
        fs.entry("/project/.dockhand/caches/build"),
        Some(MockEntry::Dir)
    );
    // Directories are owned by the user already; no helper container.
    assert!(engine.creation_request(INIT_CONTAINER).is_none());

    let worker = engine.creation_request("worker").expect("worker was created");
    assert!(worker.mounts.iter().any(|m| m.container_path == "/root/deps"
        && m.source == MountSource::HostPath("/project/.dockhand/caches/deps".into())));
}

#[tokio::test]
async fn conflicting_cache_owners_fail_before_any_container_is_created() {
    let engine = FakeContainerEngine::new();
    let fs = MockFileSystem::new();
    let manager = test_manager(
        &config(CacheType::Volume, true, false),
        RunOptions::for_task("test"),
        &engine,
        &fs,
    );

    let report = with_timeout(manager.run()).await;

    assert_eq!(report.result, TaskResult::Failed);
    let message = init_failure(&report.events).expect("initialisation failed");
    assert!(message.starts_with("Containers 'app' and 'worker' share the 'deps' cache"));
    assert!(
        !engine
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::CreateContainer { .. }))
    );
}
