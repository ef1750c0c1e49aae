//! OpenAI-compatible HTTP client for question generation and transcription.
//!
//! The async [`OpenAiClient`] does the HTTP work; [`BlockingOpenAiClient`]
//! drives it on a private current-thread runtime so the monitor loop can
//! stay synchronous.

use crate::config::ModelConfig;
use crate::interaction::{
    build_user_message, AudioArtifact, ModelError, QuestionGenerator, Transcriber,
    TranscriptionError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Async client for the chat-completions and transcription endpoints.
pub struct OpenAiClient {
    config: ModelConfig,
    api_key: String,
    client: reqwest::Client,
    context_window_secs: u64,
}

impl OpenAiClient {
    /// Create a client, reading the API key from the environment.
    pub fn from_env(config: ModelConfig) -> Result<Self, ModelError> {
        let api_key = config.api_key().ok_or_else(|| {
            ModelError::Config(format!("{} is not set", ModelConfig::API_KEY_ENV))
        })?;
        Self::new(config, api_key)
    }

    pub fn new(config: ModelConfig, api_key: impl Into<String>) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            api_key: api_key.into(),
            client,
            context_window_secs: 60,
        })
    }

    /// Length of the context window mentioned in the user message.
    pub fn with_context_window_secs(mut self, secs: u64) -> Self {
        self.context_window_secs = secs;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    pub fn chat_url(&self) -> String {
        self.url("chat/completions")
    }

    pub fn transcription_url(&self) -> String {
        self.url("audio/transcriptions")
    }

    /// Ask the model for one interview question.
    pub async fn generate_question(
        &self,
        system_instruction: &str,
        context: &[String],
        hint: &str,
    ) -> Result<String, ModelError> {
        let user_message = build_user_message(context, hint, self.context_window_secs);
        let request = ChatRequest {
            model: &self.config.question_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &user_message,
                },
            ],
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ModelError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ModelError::Malformed("no question in response".to_string()))
    }

    /// Upload a recorded answer and return its transcript.
    pub async fn transcribe(&self, artifact: &AudioArtifact) -> Result<String, TranscriptionError> {
        let bytes = std::fs::read(artifact.path()).map_err(TranscriptionError::Io)?;
        let file_name = artifact
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "answer.wav".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::Malformed(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.config.transcription_model.clone())
            .part("file", part);

        let response = self
            .client
            .post(self.transcription_url())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TranscriptionError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let transcription: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Malformed(e.to_string()))?;
        Ok(transcription.text)
    }
}

/// Blocking wrapper for use from the monitor loop.
pub struct BlockingOpenAiClient {
    inner: OpenAiClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingOpenAiClient {
    pub fn new(inner: OpenAiClient) -> Result<Self, ModelError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ModelError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self { inner, runtime })
    }

    /// Create a blocking client, reading the API key from the environment.
    pub fn from_env(config: ModelConfig) -> Result<Self, ModelError> {
        Self::new(OpenAiClient::from_env(config)?)
    }
}

impl QuestionGenerator for BlockingOpenAiClient {
    fn generate(
        &mut self,
        system_instruction: &str,
        context: &[String],
        hint: &str,
    ) -> Result<String, ModelError> {
        self.runtime
            .block_on(self.inner.generate_question(system_instruction, context, hint))
    }
}

impl Transcriber for BlockingOpenAiClient {
    fn transcribe(&mut self, artifact: &AudioArtifact) -> Result<String, TranscriptionError> {
        self.runtime.block_on(self.inner.transcribe(artifact))
    }
}
