// src/engine/mod.rs

//! Orchestration engine for dockhand.
//!
//! This module ties together:
//! - the pure task state machine ([`core`]) that decides what to run next,
//!   when the task is over and how to clean up
//! - the execution manager ([`manager`]) that dispatches steps, waits for
//!   them and reacts to cancellation
//! - the shared cancellation signal ([`cancellation`])
//! - the session ([`session`]) that runs a task after its prerequisites

pub mod cancellation;
pub mod core;
pub mod manager;
pub mod session;

pub use cancellation::CancellationContext;
pub use core::{CleanupDecision, RunDecision, TaskStateMachine};
pub use manager::ExecutionManager;
pub use session::{PlannedTask, SessionReport, TaskOutcome, TaskSession};
