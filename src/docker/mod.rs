// src/docker/mod.rs

//! Container engine boundary.
//!
//! - [`client`] defines the [`ContainerEngine`] trait the step runners talk
//!   to, and its error type.
//! - [`model`] holds the plain request / response data.
//! - [`cli`] is the production implementation, driving the `docker` client.
//! - [`command`] splits configured command strings into argument vectors.

pub mod cli;
pub mod client;
pub mod command;
pub mod model;

pub use cli::DockerCli;
pub use client::{ContainerEngine, EngineError, EngineResult, ProgressCallback};
pub use command::{CommandParseError, split_command};
pub use model::{
    BuildProgress, ContainerCreationRequest, ContainerHandle, ContainerInspection, EngineEvent,
    EngineEventKind, EventFilter, ExecRequest, ExecResult, HealthCheckResult, Image,
    ImageBuildRequest, MountSource, MountSpec, Network, PullProgress,
};
