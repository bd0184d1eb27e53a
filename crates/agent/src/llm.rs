use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use supportdesk_core::config::{LlmConfig, LlmProvider};
use supportdesk_core::errors::ApplicationError;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, ApplicationError>;
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApplicationError>;
}

/// Chat-completion and embedding client for an OpenAI-compatible HTTP API.
/// The request timeout doubles as the provider deadline: a timed-out call
/// surfaces as a `Provider` error and the pipeline degrades.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    embedding_model: String,
}

impl OpenAiClient {
    /// Returns `None` when the provider is disabled or no API key is
    /// configured; the pipeline then runs in permanent degraded mode.
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        if config.provider != LlmProvider::OpenAi {
            return None;
        }
        let api_key = config.api_key.clone()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;

        Some(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatCompletionMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatCompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionChoiceMessage,
}

#[derive(Deserialize)]
struct ChatCompletionChoiceMessage {
    content: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, ApplicationError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatCompletionMessage { role: "system", content: system_prompt },
                ChatCompletionMessage { role: "user", content: user_message },
            ],
            temperature: 0.3,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| ApplicationError::Provider(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApplicationError::Provider(format!(
                "chat completion returned status {status}"
            )));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|error| ApplicationError::Provider(error.to_string()))?;

        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ApplicationError::Provider("chat completion had no choices".to_string()))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApplicationError> {
        let request = EmbeddingRequest { model: &self.embedding_model, input: text };

        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| ApplicationError::Provider(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApplicationError::Provider(format!(
                "embedding request returned status {status}"
            )));
        }

        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|error| ApplicationError::Provider(error.to_string()))?;

        payload
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .ok_or_else(|| ApplicationError::Provider("embedding response was empty".to_string()))
    }
}
