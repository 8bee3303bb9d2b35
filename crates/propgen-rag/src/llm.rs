//! OpenAI-compatible chat-completions backend.
//!
//! One request per generation, no retries. Transport failures, non-2xx
//! statuses, and empty completions all surface as
//! [`Error::Generation`]; the pipeline never substitutes placeholder
//! text for a failed call.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use propgen_core::config::GenerationSettings;
use propgen_core::error::{Error, Result};
use propgen_core::traits::TextGenerator;

pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiGenerator {
    /// The API key is read once from the env var named in the settings;
    /// a missing key fails construction, not the first request.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
            Error::InvalidConfig(format!(
                "generation API key env var {} is not set",
                settings.api_key_env
            ))
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
            temperature: settings.temperature,
            timeout: Duration::from_secs(settings.timeout_secs),
        })
    }
}

#[async_trait::async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage { role: "user".to_string(), content: prompt.to_string() }],
            temperature: self.temperature,
        };
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("failed to reach generation backend: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("backend returned {status}: {body}")));
        }
        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| Error::Generation(format!("failed to parse completion: {e}")))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(Error::Generation("backend returned an empty completion".to_string()));
        }
        tracing::debug!(chars = text.len(), "completion received");
        Ok(text)
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}
