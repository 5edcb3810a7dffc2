// src/dag/mod.rs

//! Container dependency graph for a single task invocation.
//!
//! - [`container`] holds the immutable container definitions built from
//!   configuration.
//! - [`graph`] resolves the containers a task needs into an acyclic graph and
//!   answers dependency / dependent queries, including teardown order.
//! - [`order`] decides which tasks run, and in what order, when a task has
//!   prerequisites.

pub mod container;
pub mod graph;
pub mod order;

pub use container::{
    Container, ContainerName, ImageSource, RunAsCurrentUser, SetupCommand, VolumeMount,
};
pub use graph::{ContainerDependencyGraph, GraphNode, ResolutionError, TaskRunConfiguration};
pub use order::resolve_execution_order;
