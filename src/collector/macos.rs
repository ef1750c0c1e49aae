//! macOS input hook using a CGEvent tap.
//!
//! Captures key presses and mouse-button presses at the session level. It
//! requires Input Monitoring permission.

use crate::collector::input::InputHook;
use crate::collector::types::{InputEvent, MouseButton};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CallbackResult, EventField,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

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

/// The macOS input collector using a CGEvent tap.
pub struct MacOSCollector {
    config: CollectorConfig,
    sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacOSCollector {
    pub fn new(config: CollectorConfig) -> Self {
        // Bounded so a stalled consumer cannot grow memory without limit
        let (sender, receiver) = bounded(10_000);

        Self {
            config,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Check if the collector is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl InputHook for MacOSCollector {
    /// Start the event tap on a background thread.
    fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.running.load(Ordering::SeqCst) {
            return Err(Box::new(CollectorError::AlreadyRunning));
        }
        if !check_permission() {
            return Err(Box::new(CollectorError::PermissionDenied));
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let config = self.config.clone();

        let handle = thread::spawn(move || {
            if let Err(e) = run_event_loop(sender, running.clone(), config) {
                tracing::error!(error = %e, "event tap loop failed");
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // The run loop wakes every 100ms and sees the flag
            let _ = handle.join();
        }
    }

    fn receiver(&self) -> &Receiver<InputEvent> {
        &self.receiver
    }
}

impl Drop for MacOSCollector {
    fn drop(&mut self) {
        InputHook::stop(self);
    }
}

/// Errors that can occur while installing the event tap.
#[derive(Debug)]
pub enum CollectorError {
    AlreadyRunning,
    PermissionDenied,
    TapCreationFailed,
    RunLoopSourceFailed,
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::AlreadyRunning => write!(f, "Collector is already running"),
            CollectorError::PermissionDenied => {
                write!(f, "Input Monitoring permission not granted")
            }
            CollectorError::TapCreationFailed => write!(f, "Failed to create CGEvent tap"),
            CollectorError::RunLoopSourceFailed => {
                write!(f, "Failed to create run loop source")
            }
        }
    }
}

impl std::error::Error for CollectorError {}

/// Build the list of event types to tap.
fn build_event_types(config: &CollectorConfig) -> Vec<CGEventType> {
    let mut types = Vec::new();

    if config.capture_keyboard {
        types.push(CGEventType::KeyDown);
        types.push(CGEventType::FlagsChanged);
    }

    if config.capture_mouse {
        types.push(CGEventType::LeftMouseDown);
        types.push(CGEventType::RightMouseDown);
        types.push(CGEventType::OtherMouseDown);
    }

    types
}

/// Run the Core Graphics event loop until `running` is cleared.
fn run_event_loop(
    sender: Sender<InputEvent>,
    running: Arc<AtomicBool>,
    config: CollectorConfig,
) -> Result<(), CollectorError> {
    let event_types = build_event_types(&config);

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        event_types,
        move |_proxy, event_type, event| {
            if let Some(input) = process_cg_event(event_type, event) {
                // Never block the tap; drop the event if the channel is full
                let _ = sender.try_send(input);
            }
            CallbackResult::Keep
        },
    )
    .map_err(|_| CollectorError::TapCreationFailed)?;

    let source = tap
        .mach_port()
        .create_runloop_source(0)
        .map_err(|_| CollectorError::RunLoopSourceFailed)?;

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }

    tap.enable();

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            std::time::Duration::from_millis(100),
            false,
        );
    }

    Ok(())
}

/// Convert a tapped CGEvent into an [`InputEvent`].
fn process_cg_event(event_type: CGEventType, event: &CGEvent) -> Option<InputEvent> {
    use core_graphics::event::CGEventType::*;

    match event_type {
        KeyDown | FlagsChanged => {
            let keycode = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
            Some(InputEvent::Key(key_name(keycode)))
        }
        LeftMouseDown | RightMouseDown | OtherMouseDown => {
            let button = match event_type {
                LeftMouseDown => MouseButton::Left,
                RightMouseDown => MouseButton::Right,
                _ => match event.get_integer_value_field(EventField::MOUSE_EVENT_BUTTON_NUMBER) {
                    2 => MouseButton::Middle,
                    n => MouseButton::Other(n.clamp(0, u8::MAX as i64) as u8),
                },
            };
            let location = event.location();
            Some(InputEvent::Click {
                button,
                x: location.x,
                y: location.y,
            })
        }
        _ => None,
    }
}

/// Name for an ANSI virtual keycode.
fn key_name(keycode: i64) -> String {
    let name = match keycode {
        0 => "a",
        1 => "s",
        2 => "d",
        3 => "f",
        4 => "h",
        5 => "g",
        6 => "z",
        7 => "x",
        8 => "c",
        9 => "v",
        11 => "b",
        12 => "q",
        13 => "w",
        14 => "e",
        15 => "r",
        16 => "y",
        17 => "t",
        18 => "1",
        19 => "2",
        20 => "3",
        21 => "4",
        22 => "6",
        23 => "5",
        24 => "=",
        25 => "9",
        26 => "7",
        27 => "-",
        28 => "8",
        29 => "0",
        30 => "]",
        31 => "o",
        32 => "u",
        33 => "[",
        34 => "i",
        35 => "p",
        36 => "Key.enter",
        37 => "l",
        38 => "j",
        39 => "'",
        40 => "k",
        41 => ";",
        42 => "\\",
        43 => ",",
        44 => "/",
        45 => "n",
        46 => "m",
        47 => ".",
        48 => "Key.tab",
        49 => "Key.space",
        50 => "`",
        51 => "Key.backspace",
        53 => "Key.esc",
        55 => "Key.cmd",
        56 => "Key.shift",
        57 => "Key.caps_lock",
        58 => "Key.alt",
        59 => "Key.ctrl",
        60 => "Key.shift_r",
        61 => "Key.alt_r",
        62 => "Key.ctrl_r",
        123 => "Key.left",
        124 => "Key.right",
        125 => "Key.down",
        126 => "Key.up",
        _ => return format!("<{keycode}>"),
    };
    name.to_string()
}

/// Whether this platform can capture keys and clicks.
pub const HAS_NATIVE_HOOK: bool = true;

/// Check if the application has Input Monitoring permission.
///
/// macOS has no direct query for this; creating a passive tap fails when
/// permission has not been granted.
pub fn check_permission() -> bool {
    let result = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    );

    result.is_ok()
}
