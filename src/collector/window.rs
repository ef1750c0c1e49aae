//! Active window title probe and the poller that feeds it into telemetry.

use crate::collector::types::ProducerError;
use crate::collector::Producer;
use crate::core::{SharedBuffer, StopSignal};
use std::time::Duration;

/// Platform collaborator that reports the focused window's title.
pub trait WindowProbe: Send {
    fn active_window_title(&mut self) -> Result<String, ProducerError>;
}

/// Probe backed by the platform's native facilities.
///
/// macOS asks System Events through `osascript`, X11 desktops use
/// `xdotool`, and Windows reads the foreground window directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWindowProbe;

impl WindowProbe for SystemWindowProbe {
    #[cfg(target_os = "macos")]
    fn active_window_title(&mut self) -> Result<String, ProducerError> {
        run_probe_command(
            "osascript",
            &[
                "-e",
                "tell app \"System Events\" to get name of (process 1 where frontmost is true)",
            ],
        )
    }

    #[cfg(target_os = "windows")]
    fn active_window_title(&mut self) -> Result<String, ProducerError> {
        use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowTextW};

        let mut title = [0u16; 512];
        let len = unsafe {
            let hwnd = GetForegroundWindow();
            GetWindowTextW(hwnd, &mut title)
        };
        if len <= 0 {
            return Err(ProducerError::WindowProbe(
                "no foreground window title".to_string(),
            ));
        }
        Ok(String::from_utf16_lossy(&title[..len as usize]))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    fn active_window_title(&mut self) -> Result<String, ProducerError> {
        run_probe_command("xdotool", &["getactivewindow", "getwindowname"])
    }
}

#[cfg(not(target_os = "windows"))]
fn run_probe_command(program: &str, args: &[&str]) -> Result<String, ProducerError> {
    let output = std::process::Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ProducerError::WindowProbe(format!("{program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProducerError::WindowProbe(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Samples the active window title at a fixed interval.
pub struct WindowPoller<P: WindowProbe> {
    probe: P,
    interval: Duration,
}

impl<P: WindowProbe> WindowPoller<P> {
    pub fn new(probe: P, interval: Duration) -> Self {
        Self { probe, interval }
    }

    /// Take one sample and append it to the buffer.
    pub fn poll_once(&mut self, buffer: &SharedBuffer) {
        match self.probe.active_window_title() {
            Ok(title) => buffer.add(format!("[win] {title}")),
            Err(e) => {
                tracing::debug!(error = %e, "window probe failed");
                buffer.add(e.to_event_text());
            }
        }
    }
}

impl<P: WindowProbe + 'static> Producer for WindowPoller<P> {
    fn name(&self) -> &'static str {
        "window-poller"
    }

    fn run(mut self: Box<Self>, buffer: SharedBuffer, stop: StopSignal) {
        while !stop.is_cancelled() {
            self.poll_once(&buffer);
            if !stop.sleep(self.interval) {
                break;
            }
        }
    }
}
