#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use dockhand::config::{
    ConfigSection, ContainerConfig, ProjectConfig, RawProjectConfig, RunAsCurrentUserConfig,
    SetupCommandConfig, TaskConfig, TaskRunConfig, VolumeConfig,
};
use dockhand::types::CacheType;

/// Builder for `ProjectConfig` to simplify test setup.
pub struct ProjectConfigBuilder {
    config: RawProjectConfig,
    base_directory: Option<PathBuf>,
}

impl ProjectConfigBuilder {
    pub fn new(project_name: &str) -> Self {
        Self {
            config: RawProjectConfig {
                project_name: project_name.to_string(),
                config: ConfigSection::default(),
                containers: BTreeMap::new(),
                tasks: BTreeMap::new(),
            },
            base_directory: None,
        }
    }

    pub fn with_container(mut self, name: &str, container: ContainerConfig) -> Self {
        self.config.containers.insert(name.to_string(), container);
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.tasks.insert(name.to_string(), task);
        self
    }

    pub fn with_cache_type(mut self, cache_type: CacheType) -> Self {
        self.config.config.cache_type = cache_type;
        self
    }

    pub fn with_base_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_directory = Some(dir.into());
        self
    }

    pub fn build(self) -> ProjectConfig {
        let config = ProjectConfig::try_from(self.config)
            .expect("Failed to build valid config from builder");
        match self.base_directory {
            Some(dir) => config.with_base_directory(dir),
            None => config.with_base_directory("/project"),
        }
    }
}

/// Builder for `ContainerConfig`.
pub struct ContainerConfigBuilder {
    container: ContainerConfig,
}

impl ContainerConfigBuilder {
    /// Container whose image is pulled.
    pub fn image(reference: &str) -> Self {
        Self {
            container: ContainerConfig {
                image: Some(reference.to_string()),
                dockerfile: "Dockerfile".to_string(),
                ..ContainerConfig::default()
            },
        }
    }

    /// Container whose image is built from `dir`.
    pub fn build_directory(dir: &str) -> Self {
        Self {
            container: ContainerConfig {
                build_directory: Some(PathBuf::from(dir)),
                dockerfile: "Dockerfile".to_string(),
                ..ContainerConfig::default()
            },
        }
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.container.dependencies.push(dep.to_string());
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.container.command = Some(command.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.container
            .environment
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn build_arg(mut self, key: &str, value: &str) -> Self {
        self.container
            .build_args
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn working_directory(mut self, dir: &str) -> Self {
        self.container.working_directory = Some(dir.to_string());
        self
    }

    pub fn setup_command(mut self, command: &str) -> Self {
        self.container.setup_commands.push(SetupCommandConfig {
            command: command.to_string(),
            working_directory: None,
        });
        self
    }

    pub fn cache(mut self, name: &str, container_path: &str) -> Self {
        self.container.volumes.push(VolumeConfig::Cache {
            name: name.to_string(),
            container_path: container_path.to_string(),
        });
        self
    }

    pub fn local_volume(mut self, local: &str, container_path: &str) -> Self {
        self.container.volumes.push(VolumeConfig::Local {
            local: PathBuf::from(local),
            container_path: container_path.to_string(),
            options: None,
        });
        self
    }

    pub fn run_as_current_user(mut self, home_directory: &str) -> Self {
        self.container.run_as_current_user = RunAsCurrentUserConfig {
            enabled: true,
            home_directory: Some(home_directory.to_string()),
        };
        self
    }

    pub fn build(self) -> ContainerConfig {
        self.container
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// Task that runs `container`.
    pub fn run(container: &str) -> Self {
        Self {
            task: TaskConfig {
                description: None,
                run: Some(TaskRunConfig {
                    container: container.to_string(),
                    command: None,
                    environment: BTreeMap::new(),
                }),
                prerequisites: vec![],
                dependencies: vec![],
            },
        }
    }

    /// Task without a `run` section.
    pub fn without_run() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn command(mut self, command: &str) -> Self {
        if let Some(run) = self.task.run.as_mut() {
            run.command = Some(command.to_string());
        }
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        if let Some(run) = self.task.run.as_mut() {
            run.environment.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.task.dependencies.push(dep.to_string());
        self
    }

    pub fn prerequisite(mut self, task: &str) -> Self {
        self.task.prerequisites.push(task.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
