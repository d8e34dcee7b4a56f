//! `OpenAI`-compatible chat-completions client.
//!
//! Groq exposes the same API under `/openai/v1`, so one client serves both.

use super::{GenerationParams, LlmProvider};
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Chat-completions client for `OpenAI` and Groq.
pub struct OpenAiClient {
    /// Provider label for logs and metrics.
    provider: &'static str,
    /// API key.
    api_key: Option<SecretString>,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    /// `OpenAI` API endpoint.
    pub const OPENAI_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default `OpenAI` model.
    pub const OPENAI_MODEL: &'static str = "gpt-4o-mini";

    /// Groq `OpenAI`-compatible endpoint.
    pub const GROQ_ENDPOINT: &'static str = "https://api.groq.com/openai/v1";

    /// Default Groq model.
    pub const GROQ_MODEL: &'static str = "llama-3.3-70b-versatile";

    /// Creates a Groq client.
    #[must_use]
    pub fn groq() -> Self {
        Self::with_defaults("groq", Self::GROQ_ENDPOINT, Self::GROQ_MODEL)
    }

    /// Creates an `OpenAI` client.
    #[must_use]
    pub fn openai() -> Self {
        Self::with_defaults("openai", Self::OPENAI_ENDPOINT, Self::OPENAI_MODEL)
    }

    fn with_defaults(provider: &'static str, endpoint: &str, model: &str) -> Self {
        Self {
            provider,
            api_key: None,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the HTTP client (see [`super::build_http_client`]).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::blocking::Client) -> Self {
        self.client = client;
        self
    }

    /// Returns the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_error(&self, cause: impl Into<String>) -> Error {
        Error::OperationFailed {
            operation: format!("{}_request", self.provider),
            cause: cause.into(),
        }
    }

    /// Makes a chat-completions request and returns the trimmed reply.
    #[instrument(skip(self, messages), fields(provider = self.provider, model = %self.model))]
    fn request(&self, messages: Vec<ChatMessage<'_>>, params: &GenerationParams) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| self.request_error("API key not configured"))?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .map_err(|e| self.request_error(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(self.request_error(format!("API returned status: {status} - {body}")));
        }

        let response: ChatCompletionResponse = response.json().map_err(|e| Error::OperationFailed {
            operation: format!("{}_response", self.provider),
            cause: e.to_string(),
        })?;

        extract_text(response).map_err(|cause| Error::OperationFailed {
            operation: format!("{}_response", self.provider),
            cause: cause.to_string(),
        })
    }
}

impl LlmProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        self.provider
    }

    fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.request(
            vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            params,
        )
    }

    fn complete_with_system(
        &self,
        system: &str,
        user: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        self.request(
            vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            params,
        )
    }
}

/// Pulls the trimmed text of the first choice; blank text is an error.
fn extract_text(response: ChatCompletionResponse) -> std::result::Result<String, &'static str> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or("No choices in response")?;
    let text = choice.message.content.unwrap_or_default();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("Empty completion");
    }
    Ok(trimmed.to_string())
}

/// Request to the Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    stream: bool,
}

/// An outgoing chat message.
#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Response from the Chat Completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

/// A choice in the response.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
