//! Integration tests for a full monitoring session

use crossbeam_channel::{bounded, Receiver, Sender};
use cta_sensor_agent::collector::{InputEvent, InputHook, ProducerError, WindowProbe};
use cta_sensor_agent::core::ManualClock;
use cta_sensor_agent::interaction::{
    ConsolePrompter, ModelError, PromptError, Prompter, QuestionGenerator,
};
use cta_sensor_agent::transparency::create_shared_log;
use cta_sensor_agent::{
    Config, InputListener, InteractionController, Producer, QaLog, Session, SessionError,
    TelemetryBuffer, WindowPoller,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const BASE: i64 = 1_700_000_000;

struct ScriptedProbe;

impl WindowProbe for ScriptedProbe {
    fn active_window_title(&mut self) -> Result<String, ProducerError> {
        Ok("Budget.xlsx - Spreadsheet".to_string())
    }
}

struct FakeHook {
    receiver: Receiver<InputEvent>,
}

impl InputHook for FakeHook {
    fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn receiver(&self) -> &Receiver<InputEvent> {
        &self.receiver
    }
}

struct FixedQuestion;

impl QuestionGenerator for FixedQuestion {
    fn generate(&mut self, _: &str, context: &[String], _: &str) -> Result<String, ModelError> {
        Ok(format!("What were you checking across {} events?", context.len()))
    }
}

struct CountingQuestion {
    calls: Arc<AtomicUsize>,
}

impl QuestionGenerator for CountingQuestion {
    fn generate(&mut self, _: &str, _: &[String], hint: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(hint.to_string())
    }
}

struct TypingUser {
    asked: Arc<Mutex<Vec<String>>>,
}

impl Prompter for TypingUser {
    fn ask(&mut self, question: &str) -> Result<bool, PromptError> {
        self.asked.lock().unwrap().push(question.to_string());
        Ok(true)
    }

    fn read_answer(&mut self) -> Result<Option<String>, PromptError> {
        Ok(Some("checked the totals".to_string()))
    }

    fn notify(&mut self, _: &str) {}
}

fn test_config(dir: &Path) -> Config {
    Config {
        tick_interval: Duration::from_millis(20),
        window_poll_interval: Duration::from_millis(20),
        data_path: dir.to_path_buf(),
        ..Config::default()
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

fn controller(config: &Config, asked: Arc<Mutex<Vec<String>>>) -> InteractionController {
    InteractionController::new(
        config.interaction.clone(),
        Box::new(FixedQuestion),
        Box::new(TypingUser { asked }),
        QaLog::new(config.qa_log_path()),
    )
}

fn producers(keys: Receiver<InputEvent>) -> Vec<Box<dyn Producer>> {
    vec![
        Box::new(WindowPoller::new(ScriptedProbe, Duration::from_millis(20))),
        Box::new(InputListener::new(FakeHook { receiver: keys })),
    ]
}

#[test]
fn test_session_asks_after_idle_pause_and_logs() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let clock = ManualClock::at_secs(BASE);
    let buffer = Arc::new(TelemetryBuffer::with_clock(
        config.buffer_capacity,
        Arc::new(clock.clone()),
    ));
    let stats = create_shared_log();
    let asked = Arc::new(Mutex::new(Vec::new()));
    let (keys_tx, keys_rx): (Sender<InputEvent>, _) = bounded(16);

    // The user was typing just before the session began.
    buffer.add("[key] shift");

    let mut session = Session::new(config.clone(), buffer.clone(), stats.clone());
    session
        .start(producers(keys_rx), controller(&config, asked.clone()))
        .unwrap();
    assert!(session.is_running());

    keys_tx.send(InputEvent::Key("a".to_string())).unwrap();
    assert!(wait_for(|| {
        let lines = buffer.snapshot_all();
        lines.iter().any(|l| l.ends_with("[key] a"))
            && lines.iter().any(|l| l.ends_with("[win] Budget.xlsx - Spreadsheet"))
    }));
    assert!(asked.lock().unwrap().is_empty());

    // Twenty quiet seconds later the idle rule fires exactly once.
    clock.advance(chrono::Duration::seconds(20));
    let qa_log = QaLog::new(config.qa_log_path());
    assert!(wait_for(|| qa_log.read_recent(10).map(|r| r.len() == 1).unwrap_or(false)));
    thread::sleep(Duration::from_millis(100));

    let session_log = session.stop().unwrap();
    assert!(!session.is_running());
    assert_eq!(
        session_log,
        dir.path().join(format!("session_{BASE}.log"))
    );

    let records = qa_log.read_recent(10).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert!(record.question.starts_with("What were you checking"));
    assert_eq!(record.answer.as_deref(), Some("checked the totals"));
    assert!(!record.context.is_empty());
    assert!(record.context.len() <= config.interaction.logged_context_lines);
    assert!(record.context.iter().any(|l| l.contains("[win] Budget.xlsx")));
    assert_eq!(asked.lock().unwrap().len(), 1);

    let contents = std::fs::read_to_string(&session_log).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), buffer.len());
    assert!(lines[0].ends_with("  [key] shift"));
    assert!(lines.iter().any(|l| l.ends_with("  [key] a")));

    let stats = stats.stats();
    assert_eq!(stats.sessions, 1);
    assert_eq!(stats.triggers_fired, 1);
    assert_eq!(stats.questions_asked, 1);
    assert_eq!(stats.answers_recorded, 1);
    assert!(stats.events_observed >= 3);
}

#[test]
fn test_session_lifecycle_errors() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let buffer = Arc::new(TelemetryBuffer::new(config.buffer_capacity));
    let asked = Arc::new(Mutex::new(Vec::new()));
    let mut session = Session::new(config.clone(), buffer, create_shared_log());

    assert!(matches!(session.stop(), Err(SessionError::NotRunning)));

    let (_keys_tx, keys_rx) = bounded(1);
    session
        .start(producers(keys_rx), controller(&config, asked.clone()))
        .unwrap();

    let (_other_tx, other_rx) = bounded(1);
    let second = session.start(producers(other_rx), controller(&config, asked.clone()));
    assert!(matches!(second, Err(SessionError::AlreadyRunning)));

    let path = session.stop().unwrap();
    assert!(path.exists());

    // A stopped session can be started again.
    let (_again_tx, again_rx) = bounded(1);
    session
        .start(producers(again_rx), controller(&config, asked))
        .unwrap();
    assert!(session.stop().is_ok());
}

#[test]
fn test_stop_abandons_unanswered_console_question() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let buffer = Arc::new(TelemetryBuffer::new(config.buffer_capacity));
    let calls = Arc::new(AtomicUsize::new(0));

    // Nobody ever types anything.
    let (_keyboard, lines) = bounded::<String>(1);
    let controller = InteractionController::new(
        config.interaction.clone(),
        Box::new(CountingQuestion {
            calls: calls.clone(),
        }),
        Box::new(ConsolePrompter::from_lines(lines, std::io::sink())),
        QaLog::new(config.qa_log_path()),
    );

    let mut session = Session::new(config.clone(), buffer, create_shared_log());
    session.start(Vec::new(), controller).unwrap();
    assert!(wait_for(|| calls.load(Ordering::SeqCst) >= 1));
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    session.stop().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    let records = QaLog::new(config.qa_log_path()).read_recent(10).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].answer, None);
}
