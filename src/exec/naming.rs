// src/exec/naming.rs

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Engine-side names for one task invocation.
///
/// Every name carries a per-invocation suffix so concurrent invocations of
/// the same task never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunNaming {
    project_name: String,
    task_name: String,
    suffix: String,
}

impl RunNaming {
    pub fn new(project_name: &str, task_name: &str) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self::with_suffix(project_name, task_name, &suffix[..12])
    }

    /// Fixed suffix, for reproducible names in tests.
    pub fn with_suffix(project_name: &str, task_name: &str, suffix: &str) -> Self {
        Self {
            project_name: sanitise(project_name),
            task_name: sanitise(task_name),
            suffix: sanitise(suffix),
        }
    }

    pub fn network_name(&self) -> String {
        format!("{}-{}-{}", self.project_name, self.task_name, self.suffix)
    }

    pub fn container_name(&self, container: &str) -> String {
        format!("{}-{}-{}", self.project_name, sanitise(container), self.suffix)
    }

    pub fn cache_init_container_name(&self) -> String {
        format!("{}-cache-init-{}", self.project_name, self.suffix)
    }

    /// Path for a temporary file or directory belonging to `container`.
    pub fn temporary_path(&self, base: &Path, container: &str, purpose: &str) -> PathBuf {
        base.join(format!(
            "dockhand-{}-{}-{}-{purpose}",
            self.project_name,
            sanitise(container),
            self.suffix
        ))
    }
}

/// Restrict to characters engines accept in object names.
fn sanitise(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}
