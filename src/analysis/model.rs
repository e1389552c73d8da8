//! The AI-model invocation seam.
//!
//! Everything above this module talks to [`ModelClient`]; the production
//! implementation posts OpenAI-style chat-completion requests to the
//! configured inference endpoint. Keeping the seam a trait lets tests count
//! and script completions without any network.

use std::time::Duration;

use async_trait::async_trait;
use miette::Diagnostic;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// One completion request. Prompt construction happens in the engine; this
/// carries only what the wire call needs.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.1,
            max_tokens: 2500,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("model transport error: {0}")]
    #[diagnostic(code(billscope::model::transport))]
    Transport(#[from] reqwest::Error),

    #[error("inference endpoint returned HTTP {status}: {body}")]
    #[diagnostic(code(billscope::model::status))]
    Status { status: u16, body: String },

    #[error("inference endpoint returned a malformed completion payload")]
    #[diagnostic(
        code(billscope::model::malformed),
        help("Expected an OpenAI-style chat completion with at least one choice.")
    )]
    Malformed,
}

impl ModelError {
    fn is_retryable(&self) -> bool {
        match self {
            ModelError::Transport(_) => true,
            ModelError::Status { status, .. } => *status >= 500 || *status == 429,
            ModelError::Malformed => false,
        }
    }
}

/// Abstraction over the AI text model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Produce a completion for `request`, applying the implementation's own
    /// retry budget. An error here means the budget is exhausted.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError>;
}

/// Connection settings for the inference endpoint.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model_id: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ModelConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model_id: model_id.into(),
            timeout: Duration::from_secs(120),
            max_retries: 2,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Chat-completions client for the configured inference endpoint.
pub struct HttpModelClient {
    client: Client,
    config: ModelConfig,
}

impl HttpModelClient {
    pub fn new(config: ModelConfig) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let body = ChatRequest {
            model: &self.config.model_id,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or(ModelError::Malformed)
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        let mut last: Option<ModelError> = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
            }
            match self.send_once(&request).await {
                Ok(content) => return Ok(content),
                Err(error) if error.is_retryable() => {
                    warn!(attempt, error = %error, "model call failed, retrying");
                    last = Some(error);
                }
                Err(error) => return Err(error),
            }
        }
        Err(last.expect("at least one model attempt was made"))
    }
}
