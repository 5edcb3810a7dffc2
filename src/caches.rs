// src/caches.rs

//! Where cache mounts live, and which containers share them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ProjectConfig;
use crate::dag::{ContainerDependencyGraph, ContainerName};
use crate::types::CacheType;

/// Backing store for one named cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheStore {
    /// Named engine volume.
    Volume(String),
    /// Directory on the host.
    Directory(PathBuf),
}

/// Maps cache names to their backing store for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMountResolver {
    project_name: String,
    cache_type: CacheType,
    base_directory: PathBuf,
}

impl CacheMountResolver {
    pub fn new(
        project_name: impl Into<String>,
        cache_type: CacheType,
        base_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            cache_type,
            base_directory: base_directory.into(),
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(
            config.project_name.clone(),
            config.config.cache_type,
            config.base_directory.clone(),
        )
    }

    pub fn store_for(&self, cache_name: &str) -> CacheStore {
        match self.cache_type {
            CacheType::Volume => {
                CacheStore::Volume(format!("dockhand-cache-{}-{cache_name}", self.project_name))
            }
            CacheType::Directory => {
                CacheStore::Directory(cache_directory(&self.base_directory, cache_name))
            }
        }
    }
}

fn cache_directory(base_directory: &Path, cache_name: &str) -> PathBuf {
    base_directory.join(".dockhand").join("caches").join(cache_name)
}

/// Two containers share a cache but disagree on run-as-current-user, so the
/// cache cannot be given a single owner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Containers '{first}' and '{second}' share the '{cache}' cache, but one has run as current user enabled and the other does not. Caches can only be shared by containers if they either both have run as current user enabled or both have it disabled."
)]
pub struct CacheConflict {
    pub cache: String,
    pub first: ContainerName,
    pub second: ContainerName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCache {
    pub name: String,
    pub store: CacheStore,
    /// Whether the containers using this cache run as the current user.
    pub run_as_current_user: bool,
    pub containers: BTreeSet<ContainerName>,
}

/// Every cache used by a task's containers, deduplicated by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheResolution {
    caches: BTreeMap<String, ResolvedCache>,
}

impl CacheResolution {
    pub fn get(&self, name: &str) -> Option<&ResolvedCache> {
        self.caches.get(name)
    }

    /// Caches in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedCache> {
        self.caches.values()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }
}

/// Resolve the caches used by every container in `graph`.
///
/// Containers are visited in name order, so the first container recorded
/// for a cache (and reported in a conflict) is deterministic.
pub fn resolve_caches(
    graph: &ContainerDependencyGraph,
    resolver: &CacheMountResolver,
) -> Result<CacheResolution, CacheConflict> {
    let mut caches: BTreeMap<String, ResolvedCache> = BTreeMap::new();

    for container in graph.containers() {
        let run_as_current_user = container.runs_as_current_user();

        for (cache_name, _) in container.cache_mounts() {
            match caches.get_mut(cache_name) {
                None => {
                    caches.insert(
                        cache_name.to_string(),
                        ResolvedCache {
                            name: cache_name.to_string(),
                            store: resolver.store_for(cache_name),
                            run_as_current_user,
                            containers: BTreeSet::from([container.name.clone()]),
                        },
                    );
                }
                Some(existing) if existing.run_as_current_user != run_as_current_user => {
                    let first = existing
                        .containers
                        .iter()
                        .next()
                        .cloned()
                        .unwrap_or_default();
                    return Err(CacheConflict {
                        cache: cache_name.to_string(),
                        first,
                        second: container.name.clone(),
                    });
                }
                Some(existing) => {
                    existing.containers.insert(container.name.clone());
                }
            }
        }
    }

    Ok(CacheResolution { caches })
}
