//! Monitoring session: producers, the periodic monitor loop and the
//! session log.
//!
//! Starting a session spawns one thread per producer plus one scheduler
//! thread. The scheduler ticks at a fixed period, evaluates the trigger
//! engine and, when it fires, runs a full interaction cycle before the next
//! tick. Producers are never blocked by an interaction in flight.
//!
//! Stopping cancels the shared [`StopSignal`], waits for every producer to
//! exit, writes the full buffer to `session_<start_epoch>.log`, then waits
//! for the scheduler to finish any cycle it is in.

use crate::collector::{
    Collector, CollectorConfig, FsWatcher, InputListener, Producer, SystemWindowProbe,
    WindowPoller,
};
use crate::config::Config;
use crate::core::{to_chrono, SharedBuffer, StopSignal, Ticker, TriggerEngine, TriggerReason};
use crate::interaction::{InteractionController, InteractionOutcome};
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Session lifecycle errors.
#[derive(Debug)]
pub enum SessionError {
    AlreadyRunning,
    NotRunning,
    /// A producer or scheduler thread could not be spawned
    Spawn(std::io::Error),
    /// The session log could not be written
    Io(std::io::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::AlreadyRunning => write!(f, "Session is already running"),
            SessionError::NotRunning => write!(f, "Session is not running"),
            SessionError::Spawn(e) => write!(f, "Could not spawn session thread: {e}"),
            SessionError::Io(e) => write!(f, "Could not write session log: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Periodic trigger evaluation plus interaction hand-off.
///
/// This is the only writer of the engine's `last_prompt`.
pub struct MonitorLoop {
    engine: TriggerEngine,
    controller: InteractionController,
    buffer: SharedBuffer,
    context_window: chrono::Duration,
    stats: SharedTransparencyLog,
}

impl MonitorLoop {
    pub fn new(
        engine: TriggerEngine,
        controller: InteractionController,
        buffer: SharedBuffer,
        context_window: Duration,
        stats: SharedTransparencyLog,
    ) -> Self {
        Self {
            engine,
            controller,
            buffer,
            context_window: to_chrono(context_window),
            stats,
        }
    }

    /// Evaluate once and, if triggered, run one interaction cycle.
    ///
    /// `last_prompt` moves only when the user was actually asked; a failed
    /// question generation leaves it alone so the trigger can fire again.
    pub fn tick(&mut self) -> Option<(TriggerReason, InteractionOutcome)> {
        let reason = self.engine.evaluate(&self.buffer)?;
        self.stats.record_trigger();
        tracing::info!(reason = reason.label(), "trigger fired");

        let context = self.buffer.snapshot(self.context_window);
        let outcome = self.controller.run_cycle(reason, &context);

        match &outcome {
            InteractionOutcome::Completed { disposition, .. } => {
                self.engine.record_prompt(self.buffer.now());
                self.stats.record_question(*disposition);
                tracing::info!(reason = reason.label(), ?disposition, "interaction complete");
            }
            InteractionOutcome::Aborted(e) => {
                self.stats.record_model_failure();
                tracing::warn!(reason = reason.label(), error = %e, "interaction aborted");
            }
        }

        Some((reason, outcome))
    }

    pub fn engine(&self) -> &TriggerEngine {
        &self.engine
    }

    /// Tick until the ticker is cancelled.
    ///
    /// A panicking collaborator ends only the cycle it happened in.
    pub fn run(mut self, ticker: Ticker) {
        while ticker.wait() {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| self.tick())) {
                tracing::error!(panic = panic_message(&*panic), "interaction cycle panicked");
            }
        }
        tracing::debug!("monitor loop stopped");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

/// One start/stop monitoring session over a shared buffer.
pub struct Session {
    config: Config,
    buffer: SharedBuffer,
    stats: SharedTransparencyLog,
    stop: StopSignal,
    producers: Vec<JoinHandle<()>>,
    scheduler: Option<JoinHandle<()>>,
    started_at: Option<DateTime<Utc>>,
    added_at_start: u64,
}

impl Session {
    pub fn new(config: Config, buffer: SharedBuffer, stats: SharedTransparencyLog) -> Self {
        Self {
            config,
            buffer,
            stats,
            stop: StopSignal::new(),
            producers: Vec::new(),
            scheduler: None,
            started_at: None,
            added_at_start: 0,
        }
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Launch every producer and the monitor loop with a fresh stop signal.
    pub fn start(
        &mut self,
        producers: Vec<Box<dyn Producer>>,
        mut controller: InteractionController,
    ) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }

        self.stop = StopSignal::new();
        self.added_at_start = self.buffer.total_added();

        for producer in producers {
            let name = producer.name();
            let buffer = self.buffer.clone();
            let stop = self.stop.clone();
            let spawned = thread::Builder::new()
                .name(name.to_string())
                .spawn(move || producer.run(buffer, stop));
            match spawned {
                Ok(handle) => self.producers.push(handle),
                Err(e) => {
                    self.abort_start();
                    return Err(SessionError::Spawn(e));
                }
            }
            tracing::debug!(producer = name, "producer started");
        }

        controller.set_stop_signal(self.stop.clone());
        let monitor = MonitorLoop::new(
            TriggerEngine::new(self.config.trigger.clone()),
            controller,
            self.buffer.clone(),
            self.config.context_window,
            self.stats.clone(),
        );
        let ticker = Ticker::new(self.config.tick_interval, self.stop.clone());
        let scheduler = thread::Builder::new()
            .name("monitor-loop".to_string())
            .spawn(move || monitor.run(ticker));
        match scheduler {
            Ok(handle) => self.scheduler = Some(handle),
            Err(e) => {
                self.abort_start();
                return Err(SessionError::Spawn(e));
            }
        }

        let started_at = self.buffer.now();
        self.started_at = Some(started_at);
        tracing::info!(start = started_at.timestamp(), "session started");
        Ok(())
    }

    /// Stop all producers, write the session log and return its path.
    pub fn stop(&mut self) -> Result<PathBuf, SessionError> {
        let started_at = self.started_at.take().ok_or(SessionError::NotRunning)?;

        self.stop.cancel();
        for handle in self.producers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("producer thread panicked");
            }
        }

        let path = session_log_path(&self.config.data_path, started_at);
        let written = write_session_log(&path, &self.buffer.snapshot_all());

        // Let an in-flight interaction cycle finish its QA record.
        if let Some(handle) = self.scheduler.take() {
            if handle.join().is_err() {
                tracing::error!("monitor loop panicked");
            }
        }

        self.stats.record_session();
        self.stats
            .record_events(self.buffer.total_added() - self.added_at_start);
        if let Err(e) = self.stats.save() {
            tracing::warn!(error = %e, "could not save statistics");
        }

        written.map_err(SessionError::Io)?;
        tracing::info!(path = %path.display(), "session log written");
        Ok(path)
    }

    fn abort_start(&mut self) {
        self.stop.cancel();
        for handle in self.producers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.stop() {
                tracing::warn!(error = %e, "session stop on drop failed");
            }
        }
    }
}

/// `session_<start_epoch>.log` inside `dir`.
pub fn session_log_path(dir: &Path, started_at: DateTime<Utc>) -> PathBuf {
    dir.join(format!("session_{}.log", started_at.timestamp()))
}

fn write_session_log(path: &Path, lines: &[String]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for line in lines {
        writeln!(file, "{line}")?;
    }
    file.flush()
}

/// The producers enabled by `config.sources`, backed by the platform.
pub fn build_producers(config: &Config) -> Vec<Box<dyn Producer>> {
    let mut producers: Vec<Box<dyn Producer>> = Vec::new();

    if config.sources.window {
        producers.push(Box::new(WindowPoller::new(
            SystemWindowProbe,
            config.window_poll_interval,
        )));
    }
    if config.sources.input {
        producers.push(Box::new(InputListener::new(Collector::new(
            CollectorConfig::default(),
        ))));
    }
    if config.sources.files {
        producers.push(Box::new(FsWatcher::new(config.resolved_watch_root())));
    }

    producers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InteractionConfig;
    use crate::core::{ManualClock, TelemetryBuffer};
    use crate::interaction::{
        ModelError, PromptError, Prompter, QaLog, QuestionGenerator,
    };
    use crate::transparency::create_shared_log;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    const BASE: i64 = 1_700_000_000;

    struct FlakyModel {
        fail: Arc<AtomicBool>,
    }

    impl QuestionGenerator for FlakyModel {
        fn generate(&mut self, _: &str, _: &[String], hint: &str) -> Result<String, ModelError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(ModelError::Server {
                    status: 429,
                    message: "quota".into(),
                })
            } else {
                Ok(format!("Q: {hint}"))
            }
        }
    }

    struct Decliner;

    impl Prompter for Decliner {
        fn ask(&mut self, _: &str) -> Result<bool, PromptError> {
            Ok(false)
        }
        fn read_answer(&mut self) -> Result<Option<String>, PromptError> {
            Ok(None)
        }
        fn notify(&mut self, _: &str) {}
    }

    struct PanicsOnce {
        calls: Arc<AtomicUsize>,
    }

    impl QuestionGenerator for PanicsOnce {
        fn generate(&mut self, _: &str, _: &[String], hint: &str) -> Result<String, ModelError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("model client bug");
            }
            Ok(format!("Q: {hint}"))
        }
    }

    fn monitor(
        dir: &Path,
        fail: Arc<AtomicBool>,
    ) -> (MonitorLoop, SharedBuffer, ManualClock, SharedTransparencyLog) {
        monitor_with(dir, Box::new(FlakyModel { fail }))
    }

    fn monitor_with(
        dir: &Path,
        questions: Box<dyn QuestionGenerator>,
    ) -> (MonitorLoop, SharedBuffer, ManualClock, SharedTransparencyLog) {
        let clock = ManualClock::at_secs(BASE);
        let buffer: SharedBuffer = Arc::new(TelemetryBuffer::with_clock(500, Arc::new(clock.clone())));
        let stats = create_shared_log();
        let controller = InteractionController::new(
            InteractionConfig::default(),
            questions,
            Box::new(Decliner),
            QaLog::new(dir.join("cta_log.jsonl")),
        );
        let monitor = MonitorLoop::new(
            TriggerEngine::new(Default::default()),
            controller,
            buffer.clone(),
            Duration::from_secs(60),
            stats.clone(),
        );
        (monitor, buffer, clock, stats)
    }

    #[test]
    fn test_failed_generation_leaves_last_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let fail = Arc::new(AtomicBool::new(true));
        let (mut monitor, _buffer, clock, stats) = monitor(dir.path(), fail.clone());

        clock.set_secs(BASE + 20);
        let before = monitor.engine().last_prompt();
        let (reason, outcome) = monitor.tick().unwrap();
        assert_eq!(reason, TriggerReason::IdlePause);
        assert!(!outcome.is_handled());
        assert_eq!(monitor.engine().last_prompt(), before);
        assert!(!dir.path().join("cta_log.jsonl").exists());

        // Same condition fires again on the next tick.
        clock.set_secs(BASE + 21);
        fail.store(false, Ordering::SeqCst);
        let (_, outcome) = monitor.tick().unwrap();
        assert!(outcome.is_handled());
        assert_eq!(monitor.engine().last_prompt().timestamp(), BASE + 21);

        let stats = stats.stats();
        assert_eq!(stats.triggers_fired, 2);
        assert_eq!(stats.model_failures, 1);
        assert_eq!(stats.questions_asked, 1);
    }

    #[test]
    fn test_handled_trigger_starts_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let (mut monitor, _buffer, clock, _stats) =
            monitor(dir.path(), Arc::new(AtomicBool::new(false)));

        clock.set_secs(BASE + 20);
        assert!(monitor.tick().is_some());
        clock.set_secs(BASE + 30);
        assert!(monitor.tick().is_none());
        clock.set_secs(BASE + 35);
        assert!(monitor.tick().is_some());

        let records = QaLog::new(dir.path().join("cta_log.jsonl"))
            .read_recent(10)
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.answer.is_none()));
    }

    #[test]
    fn test_loop_survives_panicking_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let (monitor, _buffer, clock, _stats) = monitor_with(
            dir.path(),
            Box::new(PanicsOnce {
                calls: calls.clone(),
            }),
        );
        clock.set_secs(BASE + 20);

        let stop = StopSignal::new();
        let ticker = Ticker::new(Duration::from_millis(10), stop.clone());
        let handle = thread::spawn(move || monitor.run(ticker));

        let log = QaLog::new(dir.path().join("cta_log.jsonl"));
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline && log.read_recent(1).map_or(true, |r| r.is_empty()) {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!handle.is_finished());

        stop.cancel();
        assert!(handle.join().is_ok());
        assert!(calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(log.read_recent(10).unwrap().len(), 1);
    }

    #[test]
    fn test_session_log_path() {
        let start = DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(1_700_000_123);
        let path = session_log_path(Path::new("/data"), start);
        assert_eq!(path, PathBuf::from("/data/session_1700000123.log"));
    }

    #[test]
    fn test_build_producers_follows_sources() {
        let mut config = Config::default();
        config.sources = crate::config::SourceConfig::from_csv("window,files");
        assert_eq!(build_producers(&config).len(), 2);

        config.sources = crate::config::SourceConfig::from_csv("none");
        assert!(build_producers(&config).is_empty());
    }
}
