// src/events/mod.rs

//! Task events and the log they are recorded in.
//!
//! The log is the single source of truth for what has happened during a task
//! invocation: both planners are pure functions over a snapshot of it.

pub mod event;
pub mod log;

pub use event::TaskEvent;
pub use log::{EventLog, TaskEventSink};
