use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ensure_success, LlmClient, LlmError, Prompt};

/// Local models served by Ollama's `/api/generate`.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(http: reqwest::Client, base_url: &str, model: &str, temperature: f32) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
        }
    }

    pub fn request_body(&self, prompt: &Prompt) -> Value {
        let mut options = json!({ "temperature": self.temperature });
        if !prompt.stop.is_empty() {
            options["stop"] = json!(prompt.stop);
        }

        let mut body = json!({
            "model": self.model,
            "prompt": prompt.user,
            "stream": false,
            "options": options,
        });
        if let Some(system) = &prompt.system {
            body["system"] = json!(system);
        }
        body
    }

    pub fn parse_response(json: &Value) -> Result<String, LlmError> {
        json.get("response")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| LlmError::Parse("missing 'response' field".to_string()))
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&self.request_body(prompt))
            .send()
            .await?;
        let json: Value = ensure_success(response).await?.json().await?;
        Self::parse_response(&json)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}
