// src/planner/mod.rs

//! Pure planners over the event log.
//!
//! - [`run`] decides which run steps have become valid.
//! - [`cleanup`] turns whatever exists at the end of a run into ordered
//!   teardown groups and manual cleanup commands.
//! - [`summary`] folds an event snapshot into the facts both planners need.

pub mod cleanup;
pub mod run;
pub mod summary;

pub use cleanup::{CleanupPlan, CleanupStagePlanner, manual_cleanup_commands};
pub use run::{RunStagePlanner, image_tag};
pub use summary::ExecutionSummary;
