//! Question/answer records and the append-only JSONL log they go to.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One asked question, its answer (if any) and the context it was asked in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    /// Local ISO-8601 time the record was written
    pub ts: String,
    pub question: String,
    /// `null` when declined or when recording/transcription failed
    pub answer: Option<String>,
    /// Most recent context lines, oldest first
    pub context: Vec<String>,
}

impl QaRecord {
    pub fn new(
        at: DateTime<Utc>,
        question: String,
        answer: Option<String>,
        context: Vec<String>,
    ) -> Self {
        Self {
            ts: at
                .with_timezone(&Local)
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
            question,
            answer,
            context,
        }
    }
}

/// Errors writing or reading the QA log.
#[derive(Debug)]
pub enum QaLogError {
    Io(std::io::Error),
    Serialize(serde_json::Error),
}

impl std::fmt::Display for QaLogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QaLogError::Io(e) => write!(f, "QA log IO error: {e}"),
            QaLogError::Serialize(e) => write!(f, "QA log serialize error: {e}"),
        }
    }
}

impl std::error::Error for QaLogError {}

impl From<std::io::Error> for QaLogError {
    fn from(e: std::io::Error) -> Self {
        QaLogError::Io(e)
    }
}

impl From<serde_json::Error> for QaLogError {
    fn from(e: serde_json::Error) -> Self {
        QaLogError::Serialize(e)
    }
}

/// Append-only log, one JSON object per line.
#[derive(Debug, Clone)]
pub struct QaLog {
    path: PathBuf,
}

impl QaLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line.
    pub fn append(&self, record: &QaRecord) -> Result<(), QaLogError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// The last `limit` records, oldest first. Unparseable lines are skipped.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<QaRecord>, QaLogError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&self.path)?;
        let mut records: Vec<QaRecord> = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::debug!(error = %e, "skipping malformed QA log line"),
            }
        }

        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }
}
