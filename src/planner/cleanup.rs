// src/planner/cleanup.rs

use std::collections::BTreeSet;

use crate::dag::{ContainerDependencyGraph, ContainerName};
use crate::events::TaskEvent;
use crate::planner::summary::ExecutionSummary;
use crate::steps::TaskStep;

/// Ordered teardown work. Groups run one after another; the steps inside a
/// group run concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupPlan {
    pub groups: Vec<Vec<TaskStep>>,
    /// Commands a user would run to remove everything by hand.
    pub manual_commands: Vec<String>,
}

impl CleanupPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn steps(&self) -> impl Iterator<Item = &TaskStep> {
        self.groups.iter().flatten()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupStagePlanner;

impl CleanupStagePlanner {
    /// Plan teardown of everything the log says exists.
    ///
    /// Containers go first, dependents before their dependencies: for each
    /// level a group stopping the still-running ones, then a group removing
    /// them. Temporary files and directories follow, then the task network.
    /// Cache volumes are never removed.
    pub fn plan(graph: &ContainerDependencyGraph, events: &[TaskEvent]) -> CleanupPlan {
        let summary = ExecutionSummary::from_events(events);
        Self::plan_from_summary(graph, &summary)
    }

    pub fn plan_from_summary(
        graph: &ContainerDependencyGraph,
        summary: &ExecutionSummary,
    ) -> CleanupPlan {
        let mut groups = Vec::new();

        let outstanding: BTreeSet<ContainerName> = summary
            .outstanding_containers()
            .map(|(name, _)| name.clone())
            .collect();

        for level in graph.cleanup_order(&outstanding) {
            let mut stops = Vec::new();
            let mut removals = Vec::new();

            for name in level.iter() {
                let Some(handle) = summary.created.get(name) else {
                    continue;
                };

                if summary.is_running(name) {
                    stops.push(TaskStep::StopContainer {
                        container: name.clone(),
                        handle: handle.clone(),
                    });
                }
                removals.push(TaskStep::RemoveContainer {
                    container: name.clone(),
                    handle: handle.clone(),
                });
            }

            push_group(&mut groups, stops);
            push_group(&mut groups, removals);
        }

        let temporary = summary
            .outstanding_files()
            .map(|path| TaskStep::DeleteTemporaryFile { path: path.clone() })
            .chain(
                summary
                    .outstanding_directories()
                    .map(|path| TaskStep::DeleteTemporaryDirectory { path: path.clone() }),
            )
            .collect();
        push_group(&mut groups, temporary);

        if let Some(network) = summary.outstanding_network() {
            push_group(
                &mut groups,
                vec![TaskStep::DeleteTaskNetwork {
                    network: network.clone(),
                }],
            );
        }

        CleanupPlan {
            groups,
            manual_commands: manual_cleanup_commands(summary),
        }
    }
}

fn push_group(groups: &mut Vec<Vec<TaskStep>>, group: Vec<TaskStep>) {
    if !group.is_empty() {
        groups.push(group);
    }
}

/// Shell commands that remove every resource still outstanding: containers
/// (by name), then temporary files, temporary directories and finally the
/// task network.
pub fn manual_cleanup_commands(summary: &ExecutionSummary) -> Vec<String> {
    let containers = summary
        .outstanding_containers()
        .map(|(_, handle)| format!("docker rm --force --volumes {}", handle.id));
    let files = summary
        .outstanding_files()
        .map(|path| format!("rm {}", path.display()));
    let directories = summary
        .outstanding_directories()
        .map(|path| format!("rm -rf {}", path.display()));
    let network = summary
        .outstanding_network()
        .map(|network| format!("docker network rm {}", network.id));

    containers
        .chain(files)
        .chain(directories)
        .chain(network)
        .collect()
}
