//! Heuristic trigger engine.
//!
//! Called once per scheduler tick. Looks at a recent slice of the telemetry
//! buffer and decides whether the user should be interrupted, and why.
//! Rules are checked in order and the first match wins:
//!
//! 1. Idle pause: no `[key]`/`[mouse]` event inside the idle lookback and
//!    the idle cooldown has passed since the last prompt.
//! 2. File burst: at least `burst_threshold` separate `[file+]` events
//!    inside the burst window and the burst cooldown has passed.
//!
//! The engine never moves `last_prompt` on its own. The monitor loop calls
//! [`TriggerEngine::record_prompt`] once a fired trigger has been handled.

use crate::config::TriggerConfig;
use crate::core::buffer::TelemetryBuffer;
use crate::core::to_chrono;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why the engine decided to interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    IdlePause,
    FileBurst,
}

impl TriggerReason {
    /// Focus hint handed to the question generator.
    pub fn hint(&self) -> &'static str {
        match self {
            TriggerReason::IdlePause => {
                "I noticed a short pause—what were you thinking through just now?"
            }
            TriggerReason::FileBurst => {
                "You opened several new files—how did you choose which ones mattered?"
            }
        }
    }

    /// Short machine-friendly label.
    pub fn label(&self) -> &'static str {
        match self {
            TriggerReason::IdlePause => "idle_pause",
            TriggerReason::FileBurst => "file_burst",
        }
    }
}

impl std::fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hint())
    }
}

/// Stateful evaluator owned by the monitor loop.
pub struct TriggerEngine {
    config: TriggerConfig,
    last_prompt: DateTime<Utc>,
    /// Timestamps of counted `[file+]` events still inside the burst window,
    /// ascending. Events sharing an instant are kept separately.
    file_events: Vec<DateTime<Utc>>,
    /// Sequence number of the newest event already scanned.
    scanned_through: Option<u64>,
}

impl TriggerEngine {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            last_prompt: DateTime::<Utc>::UNIX_EPOCH,
            file_events: Vec::new(),
            scanned_through: None,
        }
    }

    /// Evaluate the rules against the current buffer contents.
    pub fn evaluate(&mut self, buffer: &TelemetryBuffer) -> Option<TriggerReason> {
        let now = buffer.now();
        let idle_lookback = to_chrono(self.config.idle_lookback);
        let burst_window = to_chrono(self.config.burst_window);

        let recent = buffer.events_within(idle_lookback.max(burst_window));
        let since_prompt = now - self.last_prompt;

        // The burst list is maintained on every call, even when the idle
        // rule wins, so stale entries never linger.
        let unseen = recent
            .iter()
            .filter(|e| self.scanned_through.map_or(true, |seq| e.seq > seq));
        for event in unseen {
            if event.has_tag("file+") {
                self.file_events.push(event.timestamp);
            }
        }
        if let Some(last) = recent.last() {
            self.scanned_through = Some(last.seq);
        }
        self.file_events.retain(|ts| now - *ts < burst_window);

        let idle_cutoff = now - idle_lookback;
        let any_input = recent
            .iter()
            .filter(|e| e.timestamp >= idle_cutoff)
            .any(|e| e.has_tag("key") || e.has_tag("mouse"));

        if !any_input && since_prompt >= to_chrono(self.config.idle_cooldown) {
            tracing::debug!(since_prompt_secs = since_prompt.num_seconds(), "idle pause");
            return Some(TriggerReason::IdlePause);
        }

        if self.file_events.len() >= self.config.burst_threshold
            && since_prompt >= to_chrono(self.config.burst_cooldown)
        {
            tracing::debug!(file_events = self.file_events.len(), "file burst");
            return Some(TriggerReason::FileBurst);
        }

        None
    }

    /// Mark a fired trigger as fully handled at `at`.
    pub fn record_prompt(&mut self, at: DateTime<Utc>) {
        self.last_prompt = at;
    }

    pub fn last_prompt(&self) -> DateTime<Utc> {
        self.last_prompt
    }

    /// Number of `[file+]` events currently counted toward a burst.
    pub fn pending_file_events(&self) -> usize {
        self.file_events.len()
    }
}
