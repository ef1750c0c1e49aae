//! Telemetry producers.
//!
//! Each producer runs on its own thread, only ever appends to the shared
//! buffer, and exits once the session's [`StopSignal`] is cancelled.

pub mod fs;
pub mod input;
pub mod types;
pub mod window;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(target_os = "macos"))]
pub mod noop;

use crate::core::{SharedBuffer, StopSignal};

// Re-export commonly used types
pub use fs::FsWatcher;
pub use input::{InputHook, InputListener};
pub use types::{FsChange, InputEvent, MouseButton, ProducerError};
pub use window::{SystemWindowProbe, WindowPoller, WindowProbe};

#[cfg(target_os = "macos")]
pub use macos::{
    check_permission, CollectorConfig, CollectorError, MacOSCollector, HAS_NATIVE_HOOK,
};

/// Platform-agnostic input hook type alias
#[cfg(target_os = "macos")]
pub type Collector = MacOSCollector;

#[cfg(not(target_os = "macos"))]
pub use noop::{
    check_permission, CollectorConfig, CollectorError, NoopCollector, HAS_NATIVE_HOOK,
};

/// Platform-agnostic input hook type alias
#[cfg(not(target_os = "macos"))]
pub type Collector = NoopCollector;

/// A concurrent collector feeding the telemetry buffer.
pub trait Producer: Send {
    /// Thread name used when the producer is spawned.
    fn name(&self) -> &'static str;

    /// Run until `stop` is cancelled.
    ///
    /// Failures are appended to `buffer` as telemetry and never end the
    /// producer early.
    fn run(self: Box<Self>, buffer: SharedBuffer, stop: StopSignal);
}
