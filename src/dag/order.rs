// src/dag/order.rs

use regex::Regex;
use tracing::info;

use crate::config::ProjectConfig;
use crate::dag::graph::ResolutionError;

/// Tasks to run for `task_name`, prerequisites first, the task itself last.
///
/// Prerequisites are visited depth-first in declaration order; a task that
/// is already scheduled is not scheduled again. With `skip_prerequisites`
/// only the task itself is returned.
pub fn resolve_execution_order(
    config: &ProjectConfig,
    task_name: &str,
    skip_prerequisites: bool,
) -> Result<Vec<String>, ResolutionError> {
    if !config.tasks.contains_key(task_name) {
        return Err(ResolutionError::TaskNotFound(task_name.to_string()));
    }

    let order = if skip_prerequisites {
        vec![task_name.to_string()]
    } else {
        let mut order = Vec::new();
        visit(config, task_name, &mut vec![task_name.to_string()], &mut order)?;
        order
    };

    info!(task = task_name, ?order, skip_prerequisites, "resolved task execution order");
    Ok(order)
}

fn visit(
    config: &ProjectConfig,
    task_name: &str,
    path: &mut Vec<String>,
    order: &mut Vec<String>,
) -> Result<(), ResolutionError> {
    let prerequisites = match config.tasks.get(task_name) {
        Some(task) => expand_wildcards(config, &task.prerequisites),
        None => Vec::new(),
    };

    for prerequisite in prerequisites.iter() {
        if !config.tasks.contains_key(prerequisite) {
            return Err(ResolutionError::PrerequisiteDoesNotExist {
                task: task_name.to_string(),
                prerequisite: prerequisite.clone(),
            });
        }

        if path.contains(prerequisite) {
            let mut cycle = path.clone();
            cycle.push(prerequisite.clone());
            return Err(ResolutionError::TaskDependencyCycle {
                description: describe_cycle(&cycle),
                path: cycle,
            });
        }
    }

    for prerequisite in prerequisites {
        if order.contains(&prerequisite) {
            continue;
        }
        path.push(prerequisite.clone());
        visit(config, &prerequisite, path, order)?;
        path.pop();
    }

    order.push(task_name.to_string());
    Ok(())
}

fn expand_wildcards(config: &ProjectConfig, entries: &[String]) -> Vec<String> {
    let mut expanded = Vec::new();
    for entry in entries {
        if !entry.contains('*') {
            expanded.push(entry.clone());
            continue;
        }
        // `tasks` is a BTreeMap, so matches come out sorted.
        if let Some(pattern) = wildcard_pattern(entry) {
            expanded.extend(config.tasks.keys().filter(|name| pattern.is_match(name)).cloned());
        }
    }
    expanded
}

/// `*` matches any run of characters; everything else is literal.
fn wildcard_pattern(entry: &str) -> Option<Regex> {
    let literals: Vec<String> = entry.split('*').map(regex::escape).collect();
    Regex::new(&format!("^{}$", literals.join(".*"))).ok()
}

fn describe_cycle(path: &[String]) -> String {
    let mut names = path.iter().map(|name| format!("'{name}'"));
    let first = names.next().unwrap_or_default();
    let second = names.next().unwrap_or_default();
    let mut description = format!("task {first} has {second} as a prerequisite");
    for name in names {
        description.push_str(&format!(", which has {name} as a prerequisite"));
    }
    description
}
