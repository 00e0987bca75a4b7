use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ensure_success, require_key, LlmClient, LlmError, Prompt};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl GeminiClient {
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

    pub fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    pub fn request_body(&self, prompt: &Prompt) -> Value {
        let mut generation_config = json!({ "temperature": self.temperature });
        if !prompt.stop.is_empty() {
            generation_config["stopSequences"] = json!(prompt.stop);
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt.user }] }],
            "generationConfig": generation_config,
        });
        if let Some(system) = &prompt.system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }

    /// Concatenates every text part of the first candidate.
    pub fn parse_response(json: &Value) -> Result<String, LlmError> {
        let parts = json
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                let reason = json
                    .pointer("/candidates/0/finishReason")
                    .or_else(|| json.pointer("/promptFeedback/blockReason"))
                    .and_then(Value::as_str)
                    .unwrap_or("no candidates");
                LlmError::Parse(format!("missing candidates[0].content.parts ({reason})"))
            })?;

        Ok(parts.iter().filter_map(|part| part.get("text").and_then(Value::as_str)).collect())
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let api_key = require_key("gemini", &self.api_key)?;

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;
        let json: Value = ensure_success(response).await?.json().await?;
        Self::parse_response(&json)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
