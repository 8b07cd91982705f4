use crate::types::{PolicyError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::debug;

/// Trait for text-completion model backends used by the extraction engine.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier used in logs.
    fn model_name(&self) -> String;

    /// Send a system + user prompt pair and return the raw completion text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiModel {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiModel {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn model_name(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.1,
            max_tokens: 2000,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PolicyError::Model(format!(
                "completion request returned HTTP {}",
                response.status()
            )));
        }

        let payload: ChatResponse = response.json().await?;
        let content = payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| PolicyError::Model("completion response had no choices".to_string()))?;

        debug!("Model returned {} bytes of completion text", content.len());
        Ok(content)
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
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

enum CannedReply {
    Text(String),
    Failure(String),
}

/// Mock language model for development and testing. Replies are matched
/// against the user prompt by substring; unmatched prompts get the
/// "not AI policy" sentinel so pipeline tests stay quiet by default.
pub struct MockLanguageModel {
    replies: Mutex<Vec<(String, CannedReply)>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `response` whenever the user prompt contains `needle`.
    pub fn with_response(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push((needle.into(), CannedReply::Text(response.into())));
        self
    }

    /// Fail the completion call whenever the user prompt contains `needle`.
    pub fn with_failure(self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push((needle.into(), CannedReply::Failure(message.into())));
        self
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn model_name(&self) -> String {
        "mock".to_string()
    }

    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        let replies = self.replies.lock().unwrap();
        for (needle, reply) in replies.iter() {
            if user.contains(needle.as_str()) {
                return match reply {
                    CannedReply::Text(text) => Ok(text.clone()),
                    CannedReply::Failure(message) => Err(PolicyError::Model(message.clone())),
                };
            }
        }
        Ok(r#"{"confidence_score": 0}"#.to_string())
    }
}
