//! Session statistics.
//!
//! Tracks how much was observed and how often the user was interrupted, so
//! that collection stays auditable. Counters are cumulative across sessions
//! when persistence is enabled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::interaction::Disposition;

/// Collection and interaction statistics.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Number of completed monitoring sessions
    sessions: AtomicU64,
    /// Number of telemetry events observed
    events_observed: AtomicU64,
    /// Number of triggers fired
    triggers_fired: AtomicU64,
    /// Number of questions shown to the user
    questions_asked: AtomicU64,
    /// Number of questions that got an answer
    answers_recorded: AtomicU64,
    /// Number of questions declined or left without an answer
    answers_missing: AtomicU64,
    /// Number of cycles aborted by question generation failures
    model_failures: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            sessions: AtomicU64::new(0),
            events_observed: AtomicU64::new(0),
            triggers_fired: AtomicU64::new(0),
            questions_asked: AtomicU64::new(0),
            answers_recorded: AtomicU64::new(0),
            answers_missing: AtomicU64::new(0),
            model_failures: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that loads and saves cumulative counters at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!(error = %e, "could not load previous statistics");
        }

        log
    }

    pub fn record_session(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events(&self, count: u64) {
        self.events_observed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_trigger(&self) {
        self.triggers_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_model_failure(&self) {
        self.model_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a question that was shown, and how it ended.
    pub fn record_question(&self, disposition: Disposition) {
        self.questions_asked.fetch_add(1, Ordering::Relaxed);
        if disposition == Disposition::Answered {
            self.answers_recorded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.answers_missing.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            sessions: self.sessions.load(Ordering::Relaxed),
            events_observed: self.events_observed.load(Ordering::Relaxed),
            triggers_fired: self.triggers_fired.load(Ordering::Relaxed),
            questions_asked: self.questions_asked.load(Ordering::Relaxed),
            answers_recorded: self.answers_recorded.load(Ordering::Relaxed),
            answers_missing: self.answers_missing.load(Ordering::Relaxed),
            model_failures: self.model_failures.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Events observed: {}\n\
             - Triggers fired: {}\n\
             - Questions asked: {}\n\
             - Answers recorded: {}\n\
             - Declined or unanswered: {}\n\
             - Question generation failures: {}\n\
             - Session duration: {} seconds",
            stats.events_observed,
            stats.triggers_fired,
            stats.questions_asked,
            stats.answers_recorded,
            stats.answers_missing,
            stats.model_failures,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                sessions: stats.sessions,
                events_observed: stats.events_observed,
                triggers_fired: stats.triggers_fired,
                questions_asked: stats.questions_asked,
                answers_recorded: stats.answers_recorded,
                answers_missing: stats.answers_missing,
                model_failures: stats.model_failures,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.sessions.store(persisted.sessions, Ordering::Relaxed);
                self.events_observed
                    .store(persisted.events_observed, Ordering::Relaxed);
                self.triggers_fired
                    .store(persisted.triggers_fired, Ordering::Relaxed);
                self.questions_asked
                    .store(persisted.questions_asked, Ordering::Relaxed);
                self.answers_recorded
                    .store(persisted.answers_recorded, Ordering::Relaxed);
                self.answers_missing
                    .store(persisted.answers_missing, Ordering::Relaxed);
                self.model_failures
                    .store(persisted.model_failures, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub sessions: u64,
    pub events_observed: u64,
    pub triggers_fired: u64,
    pub questions_asked: u64,
    pub answers_recorded: u64,
    pub answers_missing: u64,
    pub model_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(default)]
    sessions: u64,
    events_observed: u64,
    triggers_fired: u64,
    questions_asked: u64,
    answers_recorded: u64,
    answers_missing: u64,
    model_failures: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared statistics.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_dispositions() {
        let log = TransparencyLog::new();
        log.record_trigger();
        log.record_trigger();
        log.record_question(Disposition::Answered);
        log.record_question(Disposition::Declined);
        log.record_question(Disposition::TranscriptionFailed);
        log.record_model_failure();

        let stats = log.stats();
        assert_eq!(stats.triggers_fired, 2);
        assert_eq!(stats.questions_asked, 3);
        assert_eq!(stats.answers_recorded, 1);
        assert_eq!(stats.answers_missing, 2);
        assert_eq!(stats.model_failures, 1);
    }

    #[test]
    fn test_persistence_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let first = TransparencyLog::with_persistence(path.clone());
        first.record_session();
        first.record_events(40);
        first.save().unwrap();

        let second = TransparencyLog::with_persistence(path);
        second.record_session();
        second.record_events(2);

        let stats = second.stats();
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.events_observed, 42);
    }

    #[test]
    fn test_summary_format() {
        let log = TransparencyLog::new();
        let summary = log.summary();

        assert!(summary.contains("Events observed"));
        assert!(summary.contains("Questions asked"));
        assert!(summary.contains("Session duration"));
    }
}
