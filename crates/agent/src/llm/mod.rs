use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use querybot_core::config::{LlmConfig, LlmProvider};
use thiserror::Error;

pub mod gemini;
pub mod ollama;
pub mod openai;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model request failed: {0}")]
    Http(String),
    #[error("model service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected model response: {0}")]
    Parse(String),
    #[error("model client misconfigured: {0}")]
    Config(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(error.to_string())
    }
}

/// One request to a chat model: optional system instruction, the user turn,
/// and sequences at which generation must stop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
    pub stop: Vec<String>,
}

impl Prompt {
    pub fn user(text: impl Into<String>) -> Self {
        Self { user: text.into(), ..Self::default() }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;

    fn name(&self) -> &'static str;
}

/// Builds the client for the configured provider. A missing API key is not
/// an error here; the first request reports it.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let http = http_client(config.timeout_secs)?;
    let api_key = config.api_key().map(str::to_string);

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::new(
            http,
            config.base_url.as_deref().unwrap_or(gemini::DEFAULT_BASE_URL),
            &config.model,
            api_key,
            config.temperature,
        )),
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(
            http,
            config.base_url.as_deref().unwrap_or(openai::DEFAULT_BASE_URL),
            &config.model,
            api_key,
            config.temperature,
        )),
        LlmProvider::Ollama => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                LlmError::Config("llm.base_url is required for the ollama provider".to_string())
            })?;
            Arc::new(OllamaClient::new(http, base_url, &config.model, config.temperature))
        }
    };
    Ok(client)
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|error| LlmError::Config(format!("could not build HTTP client: {error}")))
}

/// Turns a non-success response into `LlmError::Status`, keeping the body
/// for diagnostics.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::Status { status: status.as_u16(), body })
}

pub(crate) fn require_key<'a>(
    provider: &str,
    api_key: &'a Option<String>,
) -> Result<&'a str, LlmError> {
    api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| LlmError::Config(format!("no API key configured for {provider}")))
}
