//! Configuration for the CTA sensor agent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the append-only question/answer log inside `data_path`.
pub const QA_LOG_FILE: &str = "cta_log.jsonl";

/// Name of the cumulative statistics file inside `data_path`.
pub const STATS_FILE: &str = "stats.json";

/// Main configuration for the sensor agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of events held in the telemetry buffer
    pub buffer_capacity: usize,

    /// Period of the monitor loop
    #[serde(with = "duration_serde")]
    pub tick_interval: Duration,

    /// How often the active window title is sampled
    #[serde(with = "duration_serde")]
    pub window_poll_interval: Duration,

    /// How much recent telemetry is handed to an interaction cycle
    #[serde(with = "duration_serde")]
    pub context_window: Duration,

    /// Which producers to run
    pub sources: SourceConfig,

    /// Root of the recursive filesystem watch (current directory if unset)
    pub watch_root: Option<PathBuf>,

    /// Directory for the QA log, session logs and statistics
    pub data_path: PathBuf,

    pub trigger: TriggerConfig,

    pub interaction: InteractionConfig,

    pub model: ModelConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cta-sensor-agent");

        Self {
            buffer_capacity: crate::core::buffer::DEFAULT_CAPACITY,
            tick_interval: Duration::from_secs(1),
            window_poll_interval: Duration::from_secs(1),
            context_window: Duration::from_secs(60),
            sources: SourceConfig::default(),
            watch_root: None,
            data_path: data_dir,
            trigger: TriggerConfig::default(),
            interaction: InteractionConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cta-sensor-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    pub fn qa_log_path(&self) -> PathBuf {
        self.data_path.join(QA_LOG_FILE)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join(STATS_FILE)
    }

    /// Directory to watch, falling back to the process working directory.
    pub fn resolved_watch_root(&self) -> PathBuf {
        self.watch_root.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }
}

/// Which producers to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Active window title poller
    pub window: bool,
    /// Keyboard and mouse hook
    pub input: bool,
    /// Recursive filesystem watcher
    pub files: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            window: true,
            input: true,
            files: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();
        let has = |name: &str| sources.iter().any(|s| s == name || s == "all");

        Self {
            window: has("window"),
            input: has("input"),
            files: has("files"),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.window || self.input || self.files
    }
}

/// Thresholds for the trigger heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// How far back to look for keyboard/mouse input
    #[serde(with = "duration_serde")]
    pub idle_lookback: Duration,
    /// Minimum time since the last prompt before an idle pause fires
    #[serde(with = "duration_serde")]
    pub idle_cooldown: Duration,
    /// Window within which created files count toward a burst
    #[serde(with = "duration_serde")]
    pub burst_window: Duration,
    /// Number of created files that make a burst
    pub burst_threshold: usize,
    /// Minimum time since the last prompt before a file burst fires
    #[serde(with = "duration_serde")]
    pub burst_cooldown: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            idle_lookback: Duration::from_secs(6),
            idle_cooldown: Duration::from_secs(15),
            burst_window: Duration::from_secs(30),
            burst_threshold: 3,
            burst_cooldown: Duration::from_secs(30),
        }
    }
}

/// Settings for one question/answer cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Most recent context lines sent to the model
    pub model_context_lines: usize,
    /// Most recent context lines stored with each QA record
    pub logged_context_lines: usize,
    /// Whether an accepted question records a spoken answer
    pub record_audio: bool,
    /// Length of a spoken answer recording
    #[serde(with = "duration_serde")]
    pub record_duration: Duration,
    /// Recorder sample rate in Hz
    pub sample_rate: u32,
    /// Recorder argv; `{path}`, `{secs}` and `{rate}` are substituted
    pub record_command: Vec<String>,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            model_context_lines: 40,
            logged_context_lines: 20,
            record_audio: true,
            record_duration: Duration::from_secs(12),
            sample_rate: 16_000,
            record_command: [
                "rec", "-q", "-c", "1", "-r", "{rate}", "{path}", "trim", "0", "{secs}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Language model endpoint settings. The API key comes from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub question_model: String,
    pub transcription_model: String,
    pub temperature: f32,
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            question_model: "gpt-4o-mini".to_string(),
            transcription_model: "whisper-1".to_string(),
            temperature: 0.4,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ModelConfig {
    /// Environment variable holding the API key.
    pub const API_KEY_ENV: &'static str = "OPENAI_API_KEY";

    pub fn api_key(&self) -> Option<String> {
        std::env::var(Self::API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
