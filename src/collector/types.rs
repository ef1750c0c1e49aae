//! Observation types delivered by the platform backends, and their
//! rendering into telemetry event text.
//!
//! Key names, click coordinates and paths are passed through verbatim.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Mouse button classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u8),
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MouseButton::Left => write!(f, "left"),
            MouseButton::Right => write!(f, "right"),
            MouseButton::Middle => write!(f, "middle"),
            MouseButton::Other(n) => write!(f, "button{n}"),
        }
    }
}

/// One callback from the input hook backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// A key was pressed
    Key(String),
    /// A mouse button went down (releases are never reported)
    Click { button: MouseButton, x: f64, y: f64 },
}

impl InputEvent {
    /// Telemetry text for this event.
    pub fn to_event_text(&self) -> String {
        match self {
            InputEvent::Key(key) => format!("[key] {key}"),
            InputEvent::Click { button, x, y } => format!("[mouse] {button} at {x},{y}"),
        }
    }
}

/// One callback from the filesystem watch backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsChange {
    Created(PathBuf),
    Modified(PathBuf),
}

impl FsChange {
    /// Telemetry text for this change.
    pub fn to_event_text(&self) -> String {
        match self {
            FsChange::Created(path) => format!("[file+] {}", path.display()),
            FsChange::Modified(path) => format!("[file~] {}", path.display()),
        }
    }
}

/// Failures inside a producer. These are recorded as telemetry and never
/// stop the producer or the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    WindowProbe(String),
    InputHook(String),
    FileWatch(String),
}

impl ProducerError {
    /// Telemetry text for this failure.
    ///
    /// Input hook failures use their own `[input]` tag so that they are
    /// never mistaken for user activity.
    pub fn to_event_text(&self) -> String {
        match self {
            ProducerError::WindowProbe(msg) => format!("[win] ERROR {msg}"),
            ProducerError::InputHook(msg) => format!("[input] ERROR {msg}"),
            ProducerError::FileWatch(msg) => format!("[file] ERROR {msg}"),
        }
    }
}

impl std::fmt::Display for ProducerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProducerError::WindowProbe(msg) => write!(f, "Window probe failed: {msg}"),
            ProducerError::InputHook(msg) => write!(f, "Input hook failed: {msg}"),
            ProducerError::FileWatch(msg) => write!(f, "File watch failed: {msg}"),
        }
    }
}

impl std::error::Error for ProducerError {}
