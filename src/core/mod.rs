//! Core functionality for the CTA sensor agent.
//!
//! This module contains:
//! - The shared, bounded telemetry buffer
//! - The heuristic trigger engine
//! - Clock, cancellation and ticker primitives

pub mod buffer;
pub mod clock;
pub mod signal;
pub mod trigger;

// Re-export commonly used types
pub use buffer::{Event, SharedBuffer, TelemetryBuffer, DEFAULT_CAPACITY};
pub use clock::{Clock, ManualClock, SystemClock};
pub use signal::{StopSignal, Ticker};
pub use trigger::{TriggerEngine, TriggerReason};

/// Convert a configured `std` duration into a `chrono` one.
///
/// Values beyond a century are clamped so that `now - d` cannot overflow.
pub(crate) fn to_chrono(duration: std::time::Duration) -> chrono::Duration {
    let cap = chrono::Duration::days(36_500);
    chrono::Duration::from_std(duration)
        .map(|d| d.min(cap))
        .unwrap_or(cap)
}
