// src/events/log.rs

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::events::TaskEvent;

/// Capacity of the live broadcast channel. Slow subscribers that fall further
/// behind than this miss events (the log itself is never lossy).
const BROADCAST_CAPACITY: usize = 1024;

/// Where step runners report what happened.
pub trait TaskEventSink: Send + Sync {
    fn post_event(&self, event: TaskEvent);
}

/// An event plus the wall-clock time it was posted.
#[derive(Debug, Clone)]
struct RecordedEvent {
    timestamp: SystemTime,
    event: TaskEvent,
}

/// Append-only, in-memory event log for one task invocation.
///
/// Posting is serialised by a mutex, so every snapshot returned by
/// [`EventLog::events`] is a prefix of the final log.
#[derive(Debug)]
pub struct EventLog {
    entries: Mutex<Vec<RecordedEvent>>,
    live: broadcast::Sender<TaskEvent>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            entries: Mutex::new(Vec::new()),
            live,
        }
    }

    /// Snapshot of every event posted so far, in posting order.
    pub fn events(&self) -> Vec<TaskEvent> {
        self.lock().iter().map(|r| r.event.clone()).collect()
    }

    /// Time between the first and the last event, if any were posted.
    pub fn elapsed(&self) -> Option<Duration> {
        let entries = self.lock();
        let first = entries.first()?;
        let last = entries.last()?;
        // Wall-clock time can step backwards; report zero rather than fail.
        Some(last.timestamp.duration_since(first.timestamp).unwrap_or_default())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Receive every event posted from now on, in posting order.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.live.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedEvent>> {
        // Entries are only ever pushed whole; a poisoned log is still valid.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskEventSink for EventLog {
    fn post_event(&self, event: TaskEvent) {
        if event.is_informational() {
            trace!(event = ?event, "event posted");
        } else {
            debug!(event = ?event, "event posted");
        }

        let mut entries = self.lock();

        // Broadcast under the lock so subscribers see log order.
        let _ = self.live.send(event.clone());

        entries.push(RecordedEvent {
            timestamp: SystemTime::now(),
            event,
        });
    }
}
