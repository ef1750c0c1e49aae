//! CTA Sensor Agent - live cognitive task analysis on the workstation.
//!
//! The agent watches what the user is doing (active window titles, keys and
//! clicks, file creation and modification), keeps the last few minutes in a
//! bounded buffer, and at well-chosen moments asks one short question about
//! the reasoning behind the activity. Questions, answers and the context that
//! prompted them are appended to a JSON Lines log.
//!
//! # Capture Notice
//!
//! Unlike a timing-only sensor, this agent records **content**: keystrokes
//! verbatim, window titles and file paths. See [`CAPTURE_NOTICE`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       CTA Sensor Agent                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐                                             │
//! │  │WindowPoller │──┐                                          │
//! │  └─────────────┘  │   ┌──────────────┐   ┌──────────────┐    │
//! │  ┌─────────────┐  ├──▶│  Telemetry   │──▶│   Trigger    │    │
//! │  │InputListener│──┤   │   Buffer     │   │   Engine     │    │
//! │  └─────────────┘  │   └──────────────┘   └──────────────┘    │
//! │  ┌─────────────┐  │          │                  │ (1 s tick) │
//! │  │  FsWatcher  │──┘          ▼                  ▼            │
//! │  └─────────────┘     ┌──────────────┐   ┌──────────────┐     │
//! │                      │ session_*.log│   │ Interaction  │──▶ cta_log.jsonl
//! │                      └──────────────┘   │ Controller   │     │
//! │                                         └──────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use cta_sensor_agent::{
//!     build_producers, Config, ConsolePrompter, HintQuestionGenerator, InteractionController,
//!     QaLog, Session, TelemetryBuffer,
//! };
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let buffer = Arc::new(TelemetryBuffer::new(config.buffer_capacity));
//! let stats = cta_sensor_agent::transparency::create_shared_log();
//! let controller = InteractionController::new(
//!     config.interaction.clone(),
//!     Box::new(HintQuestionGenerator),
//!     Box::new(ConsolePrompter::stdio()),
//!     QaLog::new(config.qa_log_path()),
//! );
//!
//! let mut session = Session::new(config.clone(), buffer, stats);
//! session.start(build_producers(&config), controller).unwrap();
//! // ...
//! let log = session.stop().unwrap();
//! println!("session log: {}", log.display());
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod interaction;
pub mod monitor;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use collector::{Collector, CollectorConfig, FsWatcher, InputListener, Producer, WindowPoller};
pub use config::{Config, SourceConfig};
pub use core::{Event, StopSignal, TelemetryBuffer, TriggerEngine, TriggerReason};
pub use interaction::{
    ConsolePrompter, Disposition, HintQuestionGenerator, InteractionController,
    InteractionOutcome, QaLog, QaRecord,
};
pub use monitor::{build_producers, MonitorLoop, Session, SessionError};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

#[cfg(feature = "openai")]
pub use interaction::{BlockingOpenAiClient, OpenAiClient};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Disclosure shown before capture starts.
pub const CAPTURE_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              CTA SENSOR AGENT - CAPTURE NOTICE                   ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent records what you do in order to ask you about it.    ║
║                                                                  ║
║  ✓ WHAT IS CAPTURED:                                             ║
║    • Every key you press, verbatim (including passwords)         ║
║    • Mouse clicks with screen coordinates                        ║
║    • Titles of the windows you focus                             ║
║    • Paths of files created or modified under the watch root     ║
║    • Your answers, typed or spoken                               ║
║                                                                  ║
║  ✓ WHERE IT GOES:                                                ║
║    • The last 60 seconds of activity are sent to the configured  ║
║      language model whenever a question is generated             ║
║    • Spoken answers are uploaded for transcription, then the     ║
║      recording is deleted                                        ║
║    • Questions, answers and context: cta_log.jsonl               ║
║    • Full activity buffer at stop: session_<epoch>.log           ║
║                                                                  ║
║  Disable sources with:  cta-sensor start --sources window,files  ║
║  View statistics with:  cta-sensor status                        ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_notice_contents() {
        assert!(CAPTURE_NOTICE.contains("CAPTURE NOTICE"));
        assert!(CAPTURE_NOTICE.contains("verbatim"));
        assert!(CAPTURE_NOTICE.contains("cta_log.jsonl"));
    }
}
