// src/exec/mod.rs

//! Step execution layer.
//!
//! - [`backend`] defines the `StepRunner` seam the execution manager
//!   dispatches through, and the `StepContext` handed to every step.
//! - [`runner`] provides `TaskStepRunner`, the production implementation
//!   backed by a `ContainerEngine` and the host filesystem.
//! - [`runners`] holds one function per step kind.
//! - [`naming`] derives per-invocation engine object names.

pub mod backend;
pub mod naming;
pub mod runner;
pub mod runners;

pub use backend::{StepContext, StepRunner};
pub use naming::RunNaming;
pub use runner::TaskStepRunner;
