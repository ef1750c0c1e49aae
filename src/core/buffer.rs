//! Bounded, time-ordered telemetry buffer shared by all producers.
//!
//! Producers only ever append. Readers take time-windowed snapshots under a
//! single lock acquisition, so a snapshot never observes a half-finished
//! append. When the buffer is full the oldest event is evicted.

use crate::core::clock::{Clock, SystemClock};
use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Default maximum number of buffered events.
pub const DEFAULT_CAPACITY: usize = 500;

/// One timestamped observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    /// Position in the buffer's append order, starting at 0
    pub seq: u64,
}

impl Event {
    /// The leading `[tag]` of the event text, if any.
    pub fn tag(&self) -> Option<&str> {
        let rest = self.text.strip_prefix('[')?;
        let end = rest.find(']')?;
        Some(&rest[..end])
    }

    /// Whether the event text starts with `[tag]`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag() == Some(tag)
    }

    /// Render as `<local ISO-8601 timestamp>  <text>`.
    pub fn format_line(&self) -> String {
        format!(
            "{}  {}",
            self.timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%dT%H:%M:%S%.6f"),
            self.text
        )
    }
}

/// Thread-safe ring buffer of [`Event`]s.
pub struct TelemetryBuffer {
    capacity: usize,
    events: Mutex<VecDeque<Event>>,
    clock: Arc<dyn Clock>,
    /// Appends over the buffer's lifetime, including evicted ones
    total_added: AtomicU64,
}

/// Handle shared between producers and the scheduler.
pub type SharedBuffer = Arc<TelemetryBuffer>;

impl TelemetryBuffer {
    /// Create a buffer backed by the system clock.
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Create a buffer that stamps events with the given clock.
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            clock,
            total_added: AtomicU64::new(0),
        }
    }

    /// Append an event stamped with the current time.
    ///
    /// The timestamp is taken while the lock is held so that buffer order
    /// and timestamp order agree across concurrent producers.
    pub fn add(&self, text: impl Into<String>) {
        let text = text.into();
        let mut events = self.lock();
        let timestamp = self.clock.now();
        let seq = self.total_added.fetch_add(1, Ordering::Relaxed);
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(Event {
            timestamp,
            text,
            seq,
        });
    }

    /// Formatted lines for every event no older than `window`, oldest first.
    pub fn snapshot(&self, window: Duration) -> Vec<String> {
        let cutoff = self.clock.now() - window;
        let events = self.lock();
        events
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .map(Event::format_line)
            .collect()
    }

    /// Formatted lines for the whole buffer, oldest first.
    pub fn snapshot_all(&self) -> Vec<String> {
        let events = self.lock();
        events.iter().map(Event::format_line).collect()
    }

    /// Raw events no older than `window`, oldest first.
    pub fn events_within(&self, window: Duration) -> Vec<Event> {
        let cutoff = self.clock.now() - window;
        let events = self.lock();
        events
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// Current time according to the buffer's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events ever appended, evicted ones included.
    pub fn total_added(&self) -> u64 {
        self.total_added.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        // Appends never leave the deque half-written, so a poisoned lock
        // still guards consistent data.
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TelemetryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
