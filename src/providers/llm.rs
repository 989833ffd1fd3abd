//! Text generation provider client (question generator, summarizer).
//!
//! The generators are prompted for strict JSON and asked for the
//! provider's JSON response mode, so the returned content parses directly
//! into the typed shapes in `model` and `session::suggest`.

use crate::providers::keys::Keyring;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("no provider key configured for tenant {tenant_id}")]
    KeyMissing { tenant_id: String },

    #[error("generation request failed ({status:?}): {message}")]
    Http { status: Option<u16>, message: String },

    #[error("empty completion from provider")]
    EmptyCompletion,

    #[error("failed to parse completion as JSON: {0}")]
    Parse(String),
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn is_ready(&self, tenant_id: &str) -> bool;

    /// Run one completion and parse the content as a JSON object.
    async fn generate_json(
        &self,
        tenant_id: &str,
        system: &str,
        prompt: &str,
    ) -> Result<serde_json::Value, LlmError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    keyring: Arc<dyn Keyring>,
}

impl ChatCompletionsClient {
    pub fn new(base_url: &str, model: &str, keyring: Arc<dyn Keyring>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            keyring,
        }
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    fn is_ready(&self, tenant_id: &str) -> bool {
        self.keyring.api_key(tenant_id).is_some()
    }

    async fn generate_json(
        &self,
        tenant_id: &str,
        system: &str,
        prompt: &str,
    ) -> Result<serde_json::Value, LlmError> {
        let api_key = self
            .keyring
            .api_key(tenant_id)
            .ok_or_else(|| LlmError::KeyMissing {
                tenant_id: tenant_id.to_string(),
            })?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.2
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http {
                status: None,
                message: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(LlmError::Http {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or(LlmError::EmptyCompletion)?;

        serde_json::from_str(content).map_err(|e| LlmError::Parse(e.to_string()))
    }
}

// ============================================================================
// Mock implementation (tests, offline runs)
// ============================================================================

/// Scriptable in-process generator. Pops queued responses first, then
/// falls back to a fixed question-set payload.
pub struct MockTextGenerator {
    ready: bool,
    fail: bool,
    scripted: std::sync::Mutex<std::collections::VecDeque<serde_json::Value>>,
    default_response: serde_json::Value,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self {
            ready: true,
            fail: false,
            scripted: std::sync::Mutex::new(std::collections::VecDeque::new()),
            default_response: serde_json::json!({
                "questions": [
                    "What is your current monthly recurring revenue?",
                    "How large is the addressable market you are targeting?",
                    "What differentiates the product from incumbents?"
                ],
                "context": "mock context",
                "topics": ["traction", "market", "product"]
            }),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_default_response(mut self, response: serde_json::Value) -> Self {
        self.default_response = response;
        self
    }

    pub fn push_response(&self, response: serde_json::Value) {
        self.scripted
            .lock()
            .expect("scripted lock")
            .push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().expect("prompts lock").len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    fn is_ready(&self, _tenant_id: &str) -> bool {
        self.ready
    }

    async fn generate_json(
        &self,
        _tenant_id: &str,
        _system: &str,
        prompt: &str,
    ) -> Result<serde_json::Value, LlmError> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());

        if self.fail {
            return Err(LlmError::Http {
                status: Some(500),
                message: "internal server error".to_string(),
            });
        }

        let scripted = self.scripted.lock().expect("scripted lock").pop_front();
        Ok(scripted.unwrap_or_else(|| self.default_response.clone()))
    }
}
