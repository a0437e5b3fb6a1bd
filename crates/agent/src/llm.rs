use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kopi_core::config::LlmConfig;
use kopi_core::domain::message::Message;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion service is not configured")]
    Disabled,
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response had no choices")]
    EmptyChoices,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError>;

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.chat(&[Message::user(prompt)]).await
    }
}

/// Client for any endpoint speaking the `/v1/chat/completions` protocol
/// (OpenAI itself, or a local Ollama).
pub struct OpenAiCompatibleClient {
    http: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            temperature,
            timeout,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        let endpoint = config.endpoint()?;
        Some(Self::new(
            endpoint,
            config.api_key.clone(),
            config.model.clone(),
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        ))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: messages
                .iter()
                .map(|message| WireMessage { role: message.role.as_str(), content: &message.content })
                .collect(),
        };

        let mut request = self
            .http
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .timeout(self.timeout)
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let parsed = response.json::<ChatResponse>().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or(LlmError::EmptyChoices)
    }
}

/// Builds the configured completion client, or `None` when the provider is disabled.
pub fn client_from_config(config: &LlmConfig) -> Option<Arc<dyn LlmClient>> {
    OpenAiCompatibleClient::from_config(config).map(|client| Arc::new(client) as Arc<dyn LlmClient>)
}
