mod client;
mod types;

pub use types::{Message, MessageRole};

use std::time::Duration;

use client::OpenRouterClient;
use types::ChatRequest;

use crate::error::{AiError, Result};

// =============================================================================
// OpenRouter
// =============================================================================

/// Chat-completion handle bound to one model.
///
/// Cloning is cheap: the underlying `reqwest::Client` is shared, so one
/// connection pool serves every model in a consensus panel.
#[derive(Clone)]
pub struct OpenRouter {
    api_key: String,
    model: String,
    http: reqwest::Client,
    app_name: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl OpenRouter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            http,
            app_name: None,
            temperature: 0.2,
            max_tokens: 1024,
        })
    }

    /// Same credentials and connection pool, different model.
    pub fn for_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> OpenRouterClient {
        let mut client = OpenRouterClient::new(&self.api_key, self.http.clone());
        if let Some(ref name) = self.app_name {
            client = client.with_app_name(name);
        }
        client
    }

    /// System + user turn, returns the first non-blank completion.
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        self.send(vec![Message::system(system), Message::user(user)])
            .await
    }

    /// Send an arbitrary conversation.
    pub async fn send(&self, messages: Vec<Message>) -> Result<String> {
        let request = messages
            .into_iter()
            .fold(ChatRequest::new(&self.model), ChatRequest::message)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens);

        self.client()
            .chat(&request)
            .await?
            .into_text()
            .ok_or_else(|| AiError::EmptyResponse(self.model.clone()))
    }
}
