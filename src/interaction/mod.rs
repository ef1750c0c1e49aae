//! One question/answer cycle.
//!
//! Given a trigger reason and a context snapshot, the controller asks the
//! language model for a question, shows it to the user, optionally records
//! and transcribes a spoken answer, and appends a [`QaRecord`] to the log.
//! The whole cycle blocks the calling thread; producers keep running on
//! their own threads meanwhile.

pub mod audio;
#[cfg(feature = "openai")]
pub mod openai;
pub mod prompt;
pub mod record;

use crate::config::InteractionConfig;
use crate::core::{StopSignal, TriggerReason};
use chrono::Utc;

pub use audio::{AudioArtifact, AudioRecorder, CaptureError, CommandRecorder};
#[cfg(feature = "openai")]
pub use openai::{BlockingOpenAiClient, OpenAiClient};
pub use prompt::{ConsolePrompter, PromptError, Prompter};
pub use record::{QaLog, QaLogError, QaRecord};

/// Instruction given to the model for every question.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert CTA interviewer. Ask ONE concise question \
to reveal the user's hidden cues/decision-making, given context.";

/// Question generation failures. The cycle aborts before anything is shown.
#[derive(Debug)]
pub enum ModelError {
    /// Client is not usable (missing key, bad URL, runtime failure)
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// The API returned an error response (quota, auth, ...)
    Server { status: u16, message: String },
    /// The response did not contain a usable question
    Malformed(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Config(msg) => write!(f, "Model config error: {msg}"),
            ModelError::Network(msg) => write!(f, "Model network error: {msg}"),
            ModelError::Server { status, message } => {
                write!(f, "Model server error ({status}): {message}")
            }
            ModelError::Malformed(msg) => write!(f, "Malformed model response: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}

/// Transcription failures. The answer is recorded as absent.
#[derive(Debug)]
pub enum TranscriptionError {
    Io(std::io::Error),
    Network(String),
    Server { status: u16, message: String },
    Malformed(String),
}

impl std::fmt::Display for TranscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptionError::Io(e) => write!(f, "Transcription IO error: {e}"),
            TranscriptionError::Network(msg) => write!(f, "Transcription network error: {msg}"),
            TranscriptionError::Server { status, message } => {
                write!(f, "Transcription server error ({status}): {message}")
            }
            TranscriptionError::Malformed(msg) => {
                write!(f, "Malformed transcription response: {msg}")
            }
        }
    }
}

impl std::error::Error for TranscriptionError {}

/// Language model collaborator.
pub trait QuestionGenerator: Send {
    fn generate(
        &mut self,
        system_instruction: &str,
        context: &[String],
        hint: &str,
    ) -> Result<String, ModelError>;
}

/// Speech-to-text collaborator.
pub trait Transcriber: Send {
    fn transcribe(&mut self, artifact: &AudioArtifact) -> Result<String, TranscriptionError>;
}

/// Generator that asks the trigger hint verbatim. Used when no model is
/// configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct HintQuestionGenerator;

impl QuestionGenerator for HintQuestionGenerator {
    fn generate(&mut self, _: &str, _: &[String], hint: &str) -> Result<String, ModelError> {
        Ok(hint.to_string())
    }
}

/// User message sent alongside [`SYSTEM_INSTRUCTION`].
pub fn build_user_message(context: &[String], hint: &str, window_secs: u64) -> String {
    let mut lines = Vec::with_capacity(context.len() + 3);
    lines.push(format!("Context (last {window_secs} s, most recent last):"));
    lines.extend(context.iter().cloned());
    lines.push(String::new());
    lines.push(format!("Suggested focus: {hint}"));
    lines.join("\n")
}

/// How a completed cycle ended for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Answered,
    Declined,
    PromptFailed,
    CaptureFailed,
    TranscriptionFailed,
}

/// Result of [`InteractionController::run_cycle`].
#[derive(Debug)]
pub enum InteractionOutcome {
    /// No question could be generated; nothing was shown or logged.
    Aborted(ModelError),
    /// The user was asked.
    Completed {
        record: QaRecord,
        disposition: Disposition,
        /// Whether the record reached the QA log
        logged: bool,
    },
}

impl InteractionOutcome {
    /// Whether the trigger counts as handled, i.e. the user was asked.
    pub fn is_handled(&self) -> bool {
        matches!(self, InteractionOutcome::Completed { .. })
    }
}

struct AudioPipeline {
    recorder: Box<dyn AudioRecorder>,
    transcriber: Box<dyn Transcriber>,
}

/// Runs question/answer cycles. Only one cycle runs at a time.
pub struct InteractionController {
    config: InteractionConfig,
    questions: Box<dyn QuestionGenerator>,
    prompter: Box<dyn Prompter>,
    audio: Option<AudioPipeline>,
    log: QaLog,
}

impl InteractionController {
    /// Controller that collects typed answers.
    pub fn new(
        config: InteractionConfig,
        questions: Box<dyn QuestionGenerator>,
        prompter: Box<dyn Prompter>,
        log: QaLog,
    ) -> Self {
        Self {
            config,
            questions,
            prompter,
            audio: None,
            log,
        }
    }

    /// Record and transcribe spoken answers instead of typed ones.
    pub fn with_audio(
        mut self,
        recorder: Box<dyn AudioRecorder>,
        transcriber: Box<dyn Transcriber>,
    ) -> Self {
        self.audio = Some(AudioPipeline {
            recorder,
            transcriber,
        });
        self
    }

    /// Let a pending question be abandoned when `stop` is cancelled.
    pub fn set_stop_signal(&mut self, stop: StopSignal) {
        self.prompter.set_stop_signal(stop);
    }

    pub fn log(&self) -> &QaLog {
        &self.log
    }

    /// Run one full cycle for `reason` with `context` (oldest first).
    pub fn run_cycle(&mut self, reason: TriggerReason, context: &[String]) -> InteractionOutcome {
        let model_context = tail(context, self.config.model_context_lines);
        let question = match self
            .questions
            .generate(SYSTEM_INSTRUCTION, model_context, reason.hint())
        {
            Ok(q) if !q.trim().is_empty() => q.trim().to_string(),
            Ok(_) => {
                let e = ModelError::Malformed("empty question".to_string());
                tracing::warn!(reason = reason.label(), error = %e, "question generation failed");
                return InteractionOutcome::Aborted(e);
            }
            Err(e) => {
                tracing::warn!(reason = reason.label(), error = %e, "question generation failed");
                return InteractionOutcome::Aborted(e);
            }
        };

        let (answer, disposition) = match self.prompter.ask(&question) {
            Ok(true) => self.collect_answer(),
            Ok(false) => (None, Disposition::Declined),
            Err(e) => {
                tracing::warn!(error = %e, "could not present question");
                (None, Disposition::PromptFailed)
            }
        };

        let record = QaRecord::new(
            Utc::now(),
            question,
            answer,
            tail(context, self.config.logged_context_lines).to_vec(),
        );

        let logged = match self.log.append(&record) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %self.log.path().display(), error = %e, "could not write QA record");
                false
            }
        };

        InteractionOutcome::Completed {
            record,
            disposition,
            logged,
        }
    }

    fn collect_answer(&mut self) -> (Option<String>, Disposition) {
        let Some(audio) = self.audio.as_mut() else {
            return match self.prompter.read_answer() {
                Ok(Some(answer)) => (Some(answer), Disposition::Answered),
                Ok(None) => (None, Disposition::Declined),
                Err(e) => {
                    tracing::warn!(error = %e, "could not read answer");
                    (None, Disposition::PromptFailed)
                }
            };
        };

        self.prompter.notify("Recording... speak now.");
        let artifact = match audio.recorder.capture(self.config.record_duration) {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!(error = %e, "audio capture failed");
                self.prompter.notify("Recording failed.");
                return (None, Disposition::CaptureFailed);
            }
        };
        self.prompter.notify("Recording finished.");

        // `artifact` is dropped (and its file removed) when this returns.
        match audio.transcriber.transcribe(&artifact) {
            Ok(text) if !text.trim().is_empty() => {
                (Some(text.trim().to_string()), Disposition::Answered)
            }
            Ok(_) => (None, Disposition::TranscriptionFailed),
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                (None, Disposition::TranscriptionFailed)
            }
        }
    }
}

/// The last `n` lines.
fn tail(lines: &[String], n: usize) -> &[String] {
    &lines[lines.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct FixedQuestion(Result<String, ()>, Arc<Mutex<Vec<usize>>>);

    impl QuestionGenerator for FixedQuestion {
        fn generate(
            &mut self,
            system: &str,
            context: &[String],
            _hint: &str,
        ) -> Result<String, ModelError> {
            assert_eq!(system, SYSTEM_INSTRUCTION);
            self.1.lock().unwrap().push(context.len());
            self.0
                .clone()
                .map_err(|_| ModelError::Network("connection refused".into()))
        }
    }

    struct ScriptedPrompter {
        accept: bool,
        typed: Option<String>,
        asked: Arc<Mutex<Vec<String>>>,
    }

    impl Prompter for ScriptedPrompter {
        fn ask(&mut self, question: &str) -> Result<bool, PromptError> {
            self.asked.lock().unwrap().push(question.to_string());
            Ok(self.accept)
        }

        fn read_answer(&mut self) -> Result<Option<String>, PromptError> {
            Ok(self.typed.clone())
        }

        fn notify(&mut self, _message: &str) {}
    }

    struct TempRecorder {
        last_path: Arc<Mutex<Option<PathBuf>>>,
        fail: bool,
    }

    impl AudioRecorder for TempRecorder {
        fn capture(&mut self, _duration: Duration) -> Result<AudioArtifact, CaptureError> {
            if self.fail {
                return Err(CaptureError::Failed("device busy".into()));
            }
            let artifact = AudioArtifact::temporary()?;
            *self.last_path.lock().unwrap() = Some(artifact.path().to_path_buf());
            Ok(artifact)
        }
    }

    enum TranscriberMode {
        Text(&'static str),
        Fail,
        Panic,
    }

    struct FakeTranscriber(TranscriberMode);

    impl Transcriber for FakeTranscriber {
        fn transcribe(&mut self, artifact: &AudioArtifact) -> Result<String, TranscriptionError> {
            assert!(artifact.path().exists());
            match self.0 {
                TranscriberMode::Text(t) => Ok(t.to_string()),
                TranscriberMode::Fail => Err(TranscriptionError::Network("timeout".into())),
                TranscriberMode::Panic => panic!("transcriber blew up"),
            }
        }
    }

    struct Harness {
        controller: InteractionController,
        asked: Arc<Mutex<Vec<String>>>,
        model_calls: Arc<Mutex<Vec<usize>>>,
        last_audio: Arc<Mutex<Option<PathBuf>>>,
        _dir: tempfile::TempDir,
    }

    fn harness(question: Result<&str, ()>, accept: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let asked = Arc::new(Mutex::new(Vec::new()));
        let model_calls = Arc::new(Mutex::new(Vec::new()));
        let controller = InteractionController::new(
            InteractionConfig::default(),
            Box::new(FixedQuestion(
                question.map(str::to_string),
                model_calls.clone(),
            )),
            Box::new(ScriptedPrompter {
                accept,
                typed: Some("typed answer".into()),
                asked: asked.clone(),
            }),
            QaLog::new(dir.path().join("cta_log.jsonl")),
        );
        Harness {
            controller,
            asked,
            model_calls,
            last_audio: Arc::new(Mutex::new(None)),
            _dir: dir,
        }
    }

    fn with_audio(mut h: Harness, fail_capture: bool, mode: TranscriberMode) -> Harness {
        let recorder = TempRecorder {
            last_path: h.last_audio.clone(),
            fail: fail_capture,
        };
        h.controller = h
            .controller
            .with_audio(Box::new(recorder), Box::new(FakeTranscriber(mode)));
        h
    }

    fn context(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn test_model_failure_aborts_without_prompt_or_record() {
        let mut h = harness(Err(()), true);
        let outcome = h.controller.run_cycle(TriggerReason::IdlePause, &context(5));

        assert!(matches!(outcome, InteractionOutcome::Aborted(_)));
        assert!(!outcome.is_handled());
        assert!(h.asked.lock().unwrap().is_empty());
        assert!(h.controller.log().read_recent(10).unwrap().is_empty());
    }

    #[test]
    fn test_blank_question_aborts_as_malformed() {
        let mut h = harness(Ok("   \n"), true);
        let outcome = h.controller.run_cycle(TriggerReason::FileBurst, &context(3));

        assert!(matches!(
            outcome,
            InteractionOutcome::Aborted(ModelError::Malformed(_))
        ));
        assert!(h.asked.lock().unwrap().is_empty());
        assert!(h.controller.log().read_recent(10).unwrap().is_empty());
    }

    #[test]
    fn test_context_caps() {
        let mut h = harness(Ok("  What made you stop?  "), false);
        let outcome = h.controller.run_cycle(TriggerReason::IdlePause, &context(100));

        assert_eq!(*h.model_calls.lock().unwrap(), vec![40]);
        match outcome {
            InteractionOutcome::Completed {
                record,
                disposition,
                logged,
            } => {
                assert_eq!(record.question, "What made you stop?");
                assert_eq!(record.context.len(), 20);
                assert_eq!(record.context[19], "line 99");
                assert_eq!(record.answer, None);
                assert_eq!(disposition, Disposition::Declined);
                assert!(logged);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_typed_answer_when_no_audio() {
        let mut h = harness(Ok("Why?"), true);
        h.controller.run_cycle(TriggerReason::FileBurst, &context(3));

        let records = h.controller.log().read_recent(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].answer.as_deref(), Some("typed answer"));
        assert_eq!(records[0].context, context(3));
    }

    #[test]
    fn test_spoken_answer_transcribed_and_artifact_removed() {
        let mut h = with_audio(
            harness(Ok("Why?"), true),
            false,
            TranscriberMode::Text(" I compared dates "),
        );
        let outcome = h.controller.run_cycle(TriggerReason::FileBurst, &context(3));

        let InteractionOutcome::Completed { record, disposition, .. } = outcome else {
            panic!("cycle should complete");
        };
        assert_eq!(record.answer.as_deref(), Some("I compared dates"));
        assert_eq!(disposition, Disposition::Answered);

        let path = h.last_audio.lock().unwrap().clone().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_transcription_failure_keeps_question_and_context() {
        let mut h = with_audio(harness(Ok("Why?"), true), false, TranscriberMode::Fail);
        let outcome = h.controller.run_cycle(TriggerReason::IdlePause, &context(3));

        let InteractionOutcome::Completed { record, disposition, .. } = outcome else {
            panic!("cycle should complete");
        };
        assert_eq!(disposition, Disposition::TranscriptionFailed);
        assert_eq!(record.answer, None);
        assert_eq!(record.question, "Why?");
        assert_eq!(record.context.len(), 3);
        assert!(!h.last_audio.lock().unwrap().clone().unwrap().exists());
    }

    #[test]
    fn test_capture_failure_is_like_decline() {
        let mut h = with_audio(
            harness(Ok("Why?"), true),
            true,
            TranscriberMode::Text("unused"),
        );
        let outcome = h.controller.run_cycle(TriggerReason::IdlePause, &context(2));

        let InteractionOutcome::Completed { record, disposition, .. } = outcome else {
            panic!("cycle should complete");
        };
        assert_eq!(disposition, Disposition::CaptureFailed);
        assert_eq!(record.answer, None);
        assert_eq!(h.controller.log().read_recent(10).unwrap().len(), 1);
    }

    #[test]
    fn test_artifact_removed_when_transcriber_panics() {
        let mut h = with_audio(harness(Ok("Why?"), true), false, TranscriberMode::Panic);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            h.controller.run_cycle(TriggerReason::IdlePause, &context(2))
        }));

        assert!(result.is_err());
        let path = h.last_audio.lock().unwrap().clone().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_build_user_message() {
        let msg = build_user_message(&context(2), "focus here", 60);
        assert_eq!(
            msg,
            "Context (last 60 s, most recent last):\nline 0\nline 1\n\nSuggested focus: focus here"
        );
    }

    #[test]
    fn test_hint_generator_echoes_hint() {
        let mut generator = HintQuestionGenerator;
        let q = generator
            .generate(SYSTEM_INSTRUCTION, &[], TriggerReason::IdlePause.hint())
            .unwrap();
        assert_eq!(q, TriggerReason::IdlePause.hint());
    }
}
