// src/types.rs

use serde::Deserialize;

/// What to do with created resources once the task has finished.
///
/// - `Cleanup`: stop and remove everything that was created (default).
/// - `DontCleanup`: leave containers, temporary files and the network in
///   place and print the commands needed to remove them by hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CleanupPolicy {
    #[default]
    Cleanup,
    DontCleanup,
}

/// Backing store used for `type = "cache"` volume mounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// Named engine volumes (`dockhand-cache-<project>-<name>`).
    #[default]
    Volume,
    /// Directories under `.dockhand/caches/` next to the config file.
    Directory,
}

/// Immutable options for a single task invocation.
///
/// Shared by reference with every step runner; never mutated once execution
/// has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub task_name: String,
    /// Extra arguments appended to the main container's command.
    pub additional_arguments: Vec<String>,
    pub behaviour_after_success: CleanupPolicy,
    pub behaviour_after_failure: CleanupPolicy,
    pub propagate_proxy_environment_variables: bool,
    /// Upper bound on steps dispatched in one batch (`None` = unbounded).
    pub max_parallelism: Option<usize>,
}

impl RunOptions {
    pub fn for_task(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            additional_arguments: Vec::new(),
            behaviour_after_success: CleanupPolicy::Cleanup,
            behaviour_after_failure: CleanupPolicy::Cleanup,
            propagate_proxy_environment_variables: true,
            max_parallelism: None,
        }
    }

    /// Options for a prerequisite of the requested task.
    ///
    /// Additional arguments belong to the requested task only, and a
    /// prerequisite that succeeded is always cleaned up: later tasks create
    /// their own containers.
    pub fn for_prerequisite(&self, task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            additional_arguments: Vec::new(),
            behaviour_after_success: CleanupPolicy::Cleanup,
            ..self.clone()
        }
    }
}
