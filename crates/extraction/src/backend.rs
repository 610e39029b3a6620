//! The LLM provider boundary.
//!
//! Modeled as a trait rather than a concrete client so the Queue Engine
//! can hold one chosen variant without inheritance: an HTTP backend for
//! production, and a fixture backend for tests and local dev.

use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub response_mime_json: bool,
    pub deadline: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.95,
            max_output_tokens: 4096,
            response_mime_json: true,
            deadline: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    Unavailable,
    Timeout,
    Other(String),
}

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, BackendError>;
}

/// Generic HTTP JSON chat-completion backend (OpenAI/Anthropic-style).
pub struct HttpLlmBackend {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl HttpLlmBackend {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmBackend for HttpLlmBackend {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, BackendError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": config.temperature,
            "top_p": config.top_p,
            "max_tokens": config.max_output_tokens,
        });
        if config.response_mime_json {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(config.deadline)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout
                } else if e.is_connect() {
                    BackendError::Unavailable
                } else {
                    BackendError::Other(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(BackendError::Other(format!(
                "provider returned status {}",
                response.status()
            )));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?;

        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| BackendError::Other("response missing choices[0].message.content".to_string()))
    }
}

/// Test/dev fixture backend: returns a canned response, or an injected
/// error, without making any network call.
#[cfg(any(test, feature = "test-util"))]
pub struct FixtureLlmBackend {
    pub response: std::sync::Mutex<Result<String, BackendError>>,
}

#[cfg(any(test, feature = "test-util"))]
impl FixtureLlmBackend {
    pub fn ok(response: impl Into<String>) -> Self {
        Self {
            response: std::sync::Mutex::new(Ok(response.into())),
        }
    }

    pub fn err(error: BackendError) -> Self {
        Self {
            response: std::sync::Mutex::new(Err(error)),
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl LlmBackend for FixtureLlmBackend {
    async fn generate(
        &self,
        _prompt: &str,
        _config: &GenerationConfig,
    ) -> Result<String, BackendError> {
        self.response.lock().expect("lock poisoned").clone()
    }
}
