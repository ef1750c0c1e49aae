//! Fallback input hook for platforms without a native backend.
//!
//! This exists so the crate (and binary) can compile on non-Apple targets
//! without pulling in CoreGraphics/CoreFoundation dependencies. It never
//! delivers events, and starting it reports the missing backend whenever
//! keyboard or mouse capture was requested.

use crate::collector::input::InputHook;
use crate::collector::types::InputEvent;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Configuration for which event sources to capture.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub capture_keyboard: bool,
    pub capture_mouse: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            capture_keyboard: true,
            capture_mouse: true,
        }
    }
}

/// Errors that can occur during event collection.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyRunning,
    /// No native input hook exists on this platform
    Unsupported,
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Collector is already running"),
            CollectorError::Unsupported => {
                write!(f, "Keyboard/mouse capture is not supported on this platform")
            }
        }
    }
}

impl std::error::Error for CollectorError {}

/// A collector that never emits events.
pub struct NoopCollector {
    config: CollectorConfig,
    _sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    running: Arc<AtomicBool>,
}

impl NoopCollector {
    pub fn new(config: CollectorConfig) -> Self {
        let (sender, receiver) = bounded(1);
        Self {
            config,
            _sender: sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if the collector is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl InputHook for NoopCollector {
    fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.config.capture_keyboard || self.config.capture_mouse {
            return Err(Box::new(CollectorError::Unsupported));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Box::new(CollectorError::AlreadyRunning));
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn receiver(&self) -> &Receiver<InputEvent> {
        &self.receiver
    }
}

/// Whether this platform can capture keys and clicks.
pub const HAS_NATIVE_HOOK: bool = false;

/// There is no input permission gate without a native backend.
pub fn check_permission() -> bool {
    true
}
