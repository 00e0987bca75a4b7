use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ensure_success, require_key, LlmClient, LlmError, Prompt};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        temperature: f32,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            temperature,
        }
    }

    pub fn request_body(&self, prompt: &Prompt) -> Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &prompt.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt.user }));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if !prompt.stop.is_empty() {
            body["stop"] = json!(prompt.stop);
        }
        body
    }

    pub fn parse_response(json: &Value) -> Result<String, LlmError> {
        json.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| LlmError::Parse("missing choices[0].message.content".to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let api_key = require_key("openai", &self.api_key)?;

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;
        let json: Value = ensure_success(response).await?.json().await?;
        Self::parse_response(&json)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
