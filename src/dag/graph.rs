// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ContainerConfig, ProjectConfig};
use crate::dag::container::{Container, ContainerName};

/// Why a task's container graph could not be resolved.
///
/// Resolution is all-or-nothing: on any of these no graph is produced and no
/// container is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("The task '{0}' does not exist.")]
    TaskNotFound(String),

    #[error("The task '{0}' does not have a run configuration and cannot be executed.")]
    TaskHasNoRunConfiguration(String),

    #[error("The task '{prerequisite}' given as a prerequisite of '{task}' does not exist.")]
    PrerequisiteDoesNotExist { task: String, prerequisite: String },

    #[error("There is a dependency cycle between tasks: {description}.")]
    TaskDependencyCycle {
        /// Tasks on the cycle, starting and ending with the same name.
        path: Vec<String>,
        description: String,
    },

    #[error("The container '{container}' referenced by {referenced_by} does not exist.")]
    ContainerDoesNotExist {
        container: ContainerName,
        referenced_by: String,
    },

    #[error("The container '{0}' cannot depend on itself.")]
    SelfDependency(ContainerName),

    #[error("There is a dependency cycle in task '{task}'. {description}")]
    DependencyCycle {
        task: String,
        /// Containers on the cycle, starting and ending with the same name.
        path: Vec<ContainerName>,
        description: String,
    },

    #[error(
        "The task '{task}' cannot have the container '{container}' as both the main task container and also a dependency."
    )]
    MainContainerIsDependency {
        task: String,
        container: ContainerName,
    },
}

/// What the task asks the main container to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRunConfiguration {
    pub container: ContainerName,
    /// Overrides the container's own command when set.
    pub command: Option<String>,
    /// Merged over the main container's environment.
    pub environment: BTreeMap<String, String>,
}

/// A container plus its position in the graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub container: Container,
    /// `true` only for the task's main container.
    pub is_root: bool,
    /// Direct dependencies. For the root this includes the task-level
    /// dependencies.
    pub dependencies: BTreeSet<ContainerName>,
    /// Direct dependents.
    pub dependents: BTreeSet<ContainerName>,
    /// Every container that (transitively) depends on this one.
    pub all_dependents: BTreeSet<ContainerName>,
}

/// Resolved, acyclic container graph for one task invocation.
///
/// Only containers reachable from the main container are part of the graph.
/// Read-only once built.
#[derive(Debug, Clone)]
pub struct ContainerDependencyGraph {
    project_name: String,
    task_name: String,
    run_configuration: TaskRunConfiguration,
    root: ContainerName,
    nodes: BTreeMap<ContainerName, GraphNode>,
}

impl ContainerDependencyGraph {
    /// Resolve the graph for `task_name`.
    pub fn resolve(config: &ProjectConfig, task_name: &str) -> Result<Self, ResolutionError> {
        let task = config
            .tasks
            .get(task_name)
            .ok_or_else(|| ResolutionError::TaskNotFound(task_name.to_string()))?;

        let run = task
            .run
            .as_ref()
            .ok_or_else(|| ResolutionError::TaskHasNoRunConfiguration(task_name.to_string()))?;

        if task.dependencies.iter().any(|d| d == &run.container) {
            return Err(ResolutionError::MainContainerIsDependency {
                task: task_name.to_string(),
                container: run.container.clone(),
            });
        }

        let task_description = format!("task '{task_name}'");
        let main = find_container(config, &run.container, &task_description)?;

        let mut root_dependencies = BTreeSet::new();
        for name in task.dependencies.iter() {
            find_container(config, name, &task_description)?;
            root_dependencies.insert(name.clone());
        }
        root_dependencies.extend(main.dependencies.iter().cloned());

        let mut resolver = Resolver {
            config,
            task_name,
            resolved: BTreeMap::new(),
        };
        let mut path = Vec::new();
        resolver.visit(&run.container, root_dependencies, &mut path)?;

        let nodes = build_nodes(config, &run.container, resolver.resolved);

        debug!(
            task = %task_name,
            containers = ?nodes.keys().collect::<Vec<_>>(),
            "resolved container dependency graph"
        );

        Ok(Self {
            project_name: config.project_name.clone(),
            task_name: task_name.to_string(),
            run_configuration: TaskRunConfiguration {
                container: run.container.clone(),
                command: run.command.clone(),
                environment: run.environment.clone(),
            },
            root: run.container.clone(),
            nodes,
        })
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn run_configuration(&self) -> &TaskRunConfiguration {
        &self.run_configuration
    }

    /// The task's main container.
    pub fn task_container(&self) -> &Container {
        // The root is always inserted by `resolve`.
        &self.nodes[&self.root].container
    }

    pub fn is_task_container(&self, name: &str) -> bool {
        self.root == name
    }

    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    /// All nodes, in name order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// All containers, in name order.
    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.nodes.values().map(|n| &n.container)
    }

    pub fn dependencies_of(&self, name: &str) -> Option<&BTreeSet<ContainerName>> {
        self.nodes.get(name).map(|n| &n.dependencies)
    }

    pub fn dependents_of(&self, name: &str) -> Option<&BTreeSet<ContainerName>> {
        self.nodes.get(name).map(|n| &n.dependents)
    }

    pub fn all_dependents_of(&self, name: &str) -> Option<&BTreeSet<ContainerName>> {
        self.nodes.get(name).map(|n| &n.all_dependents)
    }

    /// Group `containers` for teardown: every container lands in an earlier
    /// group than each of its dependencies, so dependents are always stopped
    /// and removed first. Names not in the graph are ignored.
    pub fn cleanup_order(&self, containers: &BTreeSet<ContainerName>) -> Vec<Vec<ContainerName>> {
        // Edge direction: dependent -> dependency, so a topological order
        // lists dependents before the containers they depend on.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.nodes.keys() {
            graph.add_node(name.as_str());
        }
        for (name, node) in self.nodes.iter() {
            for dep in node.dependencies.iter() {
                graph.add_edge(name.as_str(), dep.as_str(), ());
            }
        }

        let order: Vec<&str> = match toposort(&graph, None) {
            Ok(order) => order,
            Err(cycle) => {
                warn!(
                    container = %cycle.node_id(),
                    "cycle in resolved graph; falling back to name order for cleanup"
                );
                self.nodes.keys().map(|s| s.as_str()).collect()
            }
        };

        let mut levels: HashMap<&str, usize> = HashMap::new();
        for name in order {
            let level = self.nodes[name]
                .dependents
                .iter()
                .filter_map(|d| levels.get(d.as_str()))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            levels.insert(name, level);
        }

        let mut groups: BTreeMap<usize, Vec<ContainerName>> = BTreeMap::new();
        for name in containers {
            if let Some(level) = levels.get(name.as_str()) {
                groups.entry(*level).or_default().push(name.clone());
            }
        }

        groups.into_values().collect()
    }
}

/// Depth-first resolution state. `resolved` only receives a container once
/// all of its dependencies have been resolved.
struct Resolver<'a> {
    config: &'a ProjectConfig,
    task_name: &'a str,
    resolved: BTreeMap<ContainerName, BTreeSet<ContainerName>>,
}

impl Resolver<'_> {
    fn visit(
        &mut self,
        name: &str,
        dependencies: BTreeSet<ContainerName>,
        path: &mut Vec<ContainerName>,
    ) -> Result<(), ResolutionError> {
        if self.resolved.contains_key(name) {
            return Ok(());
        }

        if dependencies.contains(name) {
            return Err(ResolutionError::SelfDependency(name.to_string()));
        }

        if let Some(start) = path.iter().position(|p| p == name) {
            let mut cycle: Vec<ContainerName> = path[start..].to_vec();
            cycle.push(name.to_string());
            return Err(self.cycle_error(cycle));
        }

        path.push(name.to_string());

        let description = format!("container '{name}'");
        for dep in dependencies.iter() {
            let dep_config = find_container(self.config, dep, &description)?;
            let dep_dependencies = dep_config.dependencies.iter().cloned().collect();
            self.visit(dep, dep_dependencies, path)?;
        }

        path.pop();
        self.resolved.insert(name.to_string(), dependencies);
        Ok(())
    }

    fn cycle_error(&self, path: Vec<ContainerName>) -> ResolutionError {
        let names: Vec<String> = path.iter().map(|n| format!("'{n}'")).collect();
        let description = format!(
            "Container {} depends on {}.",
            names[0],
            names[1..].join(", which depends on ")
        );

        ResolutionError::DependencyCycle {
            task: self.task_name.to_string(),
            path,
            description,
        }
    }
}

fn find_container<'a>(
    config: &'a ProjectConfig,
    name: &str,
    referenced_by: &str,
) -> Result<&'a ContainerConfig, ResolutionError> {
    config
        .containers
        .get(name)
        .ok_or_else(|| ResolutionError::ContainerDoesNotExist {
            container: name.to_string(),
            referenced_by: referenced_by.to_string(),
        })
}

fn build_nodes(
    config: &ProjectConfig,
    root: &str,
    resolved: BTreeMap<ContainerName, BTreeSet<ContainerName>>,
) -> BTreeMap<ContainerName, GraphNode> {
    let mut dependents: BTreeMap<ContainerName, BTreeSet<ContainerName>> = BTreeMap::new();
    for (name, deps) in resolved.iter() {
        for dep in deps {
            dependents.entry(dep.clone()).or_default().insert(name.clone());
        }
    }

    let mut nodes = BTreeMap::new();
    for (name, deps) in resolved.iter() {
        // Every resolved name was looked up successfully during `visit`.
        let Some(cfg) = config.containers.get(name) else {
            continue;
        };

        let direct_dependents = dependents.get(name).cloned().unwrap_or_default();
        let all_dependents = transitive_dependents(name, &dependents);

        nodes.insert(
            name.clone(),
            GraphNode {
                container: Container::from_config(name.clone(), cfg, &config.base_directory),
                is_root: name == root,
                dependencies: deps.clone(),
                dependents: direct_dependents,
                all_dependents,
            },
        );
    }

    nodes
}

fn transitive_dependents(
    name: &str,
    dependents: &BTreeMap<ContainerName, BTreeSet<ContainerName>>,
) -> BTreeSet<ContainerName> {
    let mut stack: Vec<&ContainerName> = dependents
        .get(name)
        .map(|d| d.iter().collect())
        .unwrap_or_default();
    let mut seen = BTreeSet::new();

    while let Some(next) = stack.pop() {
        if !seen.insert(next.clone()) {
            continue;
        }
        if let Some(more) = dependents.get(next) {
            stack.extend(more.iter());
        }
    }

    seen
}
