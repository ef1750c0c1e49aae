//! Spoken-answer capture.
//!
//! Recording is delegated to an external command (`rec` from SoX by
//! default) that writes a WAV file into a temporary path. The resulting
//! [`AudioArtifact`] deletes that file when dropped, so every exit path of
//! a capture/transcribe step cleans up, including unwinding.

use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tempfile::TempPath;

/// A recorded answer on disk. The file is removed on drop.
#[derive(Debug)]
pub struct AudioArtifact {
    path: TempPath,
}

impl AudioArtifact {
    /// Create an empty temporary `.wav` artifact.
    pub fn temporary() -> Result<Self, CaptureError> {
        let file = tempfile::Builder::new()
            .prefix("ans_")
            .suffix(".wav")
            .tempfile()
            .map_err(CaptureError::Io)?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Errors while capturing audio. Treated like a declined recording.
#[derive(Debug)]
pub enum CaptureError {
    /// The recorder is not configured
    NotConfigured,
    /// The recorder process could not be started
    Spawn(String),
    /// The recorder exited unsuccessfully
    Failed(String),
    Io(std::io::Error),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::NotConfigured => write!(f, "No recorder command configured"),
            CaptureError::Spawn(msg) => write!(f, "Could not start recorder: {msg}"),
            CaptureError::Failed(msg) => write!(f, "Recorder failed: {msg}"),
            CaptureError::Io(e) => write!(f, "Recorder IO error: {e}"),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Audio capture collaborator.
///
/// Taking `&mut self` gives the holder exclusive use of the device for the
/// whole recording.
pub trait AudioRecorder: Send {
    fn capture(&mut self, duration: Duration) -> Result<AudioArtifact, CaptureError>;
}

/// Recorder that shells out to a configurable command.
///
/// `{path}`, `{secs}` and `{rate}` in the argv template are replaced with
/// the artifact path, the duration in whole seconds and the sample rate.
#[derive(Debug, Clone)]
pub struct CommandRecorder {
    argv: Vec<String>,
    sample_rate: u32,
}

impl CommandRecorder {
    pub fn new(argv: Vec<String>, sample_rate: u32) -> Self {
        Self { argv, sample_rate }
    }

    fn expand(&self, path: &Path, duration: Duration) -> Vec<String> {
        let path = path.display().to_string();
        let secs = duration.as_secs().max(1).to_string();
        let rate = self.sample_rate.to_string();
        self.argv
            .iter()
            .map(|arg| {
                arg.replace("{path}", &path)
                    .replace("{secs}", &secs)
                    .replace("{rate}", &rate)
            })
            .collect()
    }
}

impl AudioRecorder for CommandRecorder {
    fn capture(&mut self, duration: Duration) -> Result<AudioArtifact, CaptureError> {
        let artifact = AudioArtifact::temporary()?;
        let argv = self.expand(artifact.path(), duration);
        let (program, args) = argv.split_first().ok_or(CaptureError::NotConfigured)?;

        tracing::debug!(program = %program, secs = duration.as_secs(), "recording answer");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| CaptureError::Spawn(format!("{program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::Failed(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(artifact)
    }
}
