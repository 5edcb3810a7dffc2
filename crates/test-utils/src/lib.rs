pub mod builders;
pub mod fake_engine;

use std::sync::{Arc, Once};

use tracing_subscriber::{EnvFilter, fmt};

use dockhand::caches::CacheMountResolver;
use dockhand::config::ProjectConfig;
use dockhand::engine::ExecutionManager;
use dockhand::exec::{RunNaming, TaskStepRunner};
use dockhand::fs::MockFileSystem;
use dockhand::dag::ContainerDependencyGraph;
use dockhand::proxy::ProxyEnvironment;
use dockhand::types::RunOptions;
use dockhand::user::CurrentUser;

use crate::fake_engine::FakeContainerEngine;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Uid/gid 1000 user used by every test runner.
pub fn test_user() -> CurrentUser {
    CurrentUser::new(1000, 1000, "dev", "devs")
}

/// Step runner over a fake engine and an in-memory filesystem, with fixed
/// names (suffix `test`), a fixed user and no proxy variables.
pub fn test_runner(
    config: &ProjectConfig,
    task: &str,
    engine: &FakeContainerEngine,
    fs: &MockFileSystem,
) -> TaskStepRunner {
    TaskStepRunner::new(
        Arc::new(engine.clone()),
        Arc::new(fs.clone()),
        RunNaming::with_suffix(&config.project_name, task, "test"),
        CacheMountResolver::from_config(config),
    )
    .with_current_user(test_user())
    .with_proxy_environment(ProxyEnvironment::default())
}

/// Execution manager for `options.task_name` wired to a fake engine.
pub fn test_manager(
    config: &ProjectConfig,
    options: RunOptions,
    engine: &FakeContainerEngine,
    fs: &MockFileSystem,
) -> ExecutionManager {
    let graph = ContainerDependencyGraph::resolve(config, &options.task_name)
        .expect("task should resolve");
    let runner = test_runner(config, &options.task_name, engine, fs);
    ExecutionManager::new(graph, options, Arc::new(runner))
}
