//! Keyboard and mouse listener.
//!
//! Wraps a platform [`InputHook`] for the lifetime of a session and turns
//! every delivered callback into one telemetry event.

use crate::collector::types::{InputEvent, ProducerError};
use crate::collector::Producer;
use crate::core::{SharedBuffer, StopSignal};
use crossbeam_channel::{select, Receiver};

/// Platform input hook backend.
pub trait InputHook: Send {
    /// Install the hook. Events arrive on [`InputHook::receiver`].
    fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Remove the hook.
    fn stop(&mut self);

    fn receiver(&self) -> &Receiver<InputEvent>;
}

/// Producer that appends `[key]` and `[mouse]` events.
pub struct InputListener<H: InputHook> {
    hook: H,
}

impl<H: InputHook> InputListener<H> {
    pub fn new(hook: H) -> Self {
        Self { hook }
    }
}

impl<H: InputHook + 'static> Producer for InputListener<H> {
    fn name(&self) -> &'static str {
        "input-listener"
    }

    fn run(mut self: Box<Self>, buffer: SharedBuffer, stop: StopSignal) {
        if let Err(e) = self.hook.start() {
            tracing::warn!(error = %e, "input hook unavailable");
            buffer.add(ProducerError::InputHook(e.to_string()).to_event_text());
            // Nothing to listen to; park until the session ends.
            let _ = stop.receiver().recv();
            return;
        }

        let events = self.hook.receiver().clone();
        loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(event) => buffer.add(event.to_event_text()),
                    Err(_) => {
                        buffer.add(
                            ProducerError::InputHook("event stream closed".to_string())
                                .to_event_text(),
                        );
                        let _ = stop.receiver().recv();
                        break;
                    }
                },
                recv(stop.receiver()) -> _ => break,
            }
        }

        self.hook.stop();
    }
}
