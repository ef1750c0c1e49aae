//! Cancellation and periodic scheduling primitives.
//!
//! A [`StopSignal`] is shared by every producer and the scheduler of one
//! session. Cancelling it both flips a flag (for loops that check it at an
//! iteration boundary) and disconnects a channel (so that threads parked in
//! `select!` wake immediately instead of waiting out their interval).

use crossbeam_channel::{bounded, never, select, tick, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shared cancellation signal for one monitoring session.
#[derive(Clone)]
pub struct StopSignal {
    cancelled: Arc<AtomicBool>,
    // Dropping the sender disconnects every cloned receiver.
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    wake: Receiver<()>,
}

impl StopSignal {
    /// Create a signal in the not-cancelled state.
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(tx))),
            wake: rx,
        }
    }

    /// Request every holder of this signal to stop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let mut trigger = self.trigger.lock().unwrap_or_else(|e| e.into_inner());
        trigger.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Receiver that becomes ready (disconnected) once cancelled.
    ///
    /// Intended for use inside `crossbeam_channel::select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.wake
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed, `false` on cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        select! {
            recv(self.wake) -> _ => false,
            default(duration) => !self.is_cancelled(),
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-period timer that can be interrupted by a [`StopSignal`].
pub struct Ticker {
    ticks: Receiver<Instant>,
    stop: StopSignal,
}

impl Ticker {
    pub fn new(period: Duration, stop: StopSignal) -> Self {
        let ticks = if period.is_zero() { never() } else { tick(period) };
        Self { ticks, stop }
    }

    /// Block until the next tick.
    ///
    /// Returns `false` once the stop signal has been cancelled.
    pub fn wait(&self) -> bool {
        if self.stop.is_cancelled() {
            return false;
        }
        select! {
            recv(self.ticks) -> _ => !self.stop.is_cancelled(),
            recv(self.stop.receiver()) -> _ => false,
        }
    }
}
