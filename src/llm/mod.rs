//! Generative backend abstraction.
//!
//! [`LlmProvider`] is the seam between the summary generator and whatever
//! produces text. The shipped provider is [`OpenAiClient`], which speaks the
//! `OpenAI` chat-completions protocol to either Groq or `OpenAI`, wrapped in
//! [`ResilientLlmProvider`] for circuit breaking.

mod openai;
mod resilience;

pub use openai::OpenAiClient;
pub use resilience::{LlmResilienceConfig, ResilientLlmProvider};

use crate::Result;
use crate::config::{LlmBackend, LlmConfig};
use std::sync::Arc;
use std::time::Duration;

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling mass.
    pub top_p: f32,
    /// Completion length cap.
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            max_tokens: 1024,
        }
    }
}

/// Trait for generative backends.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for a single user prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, times out, or the response
    /// carries no text.
    fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Generates a completion with a system prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    ///
    /// Default implementation concatenates system and user prompts.
    /// Providers should override this to use native system prompt support.
    fn complete_with_system(
        &self,
        system: &str,
        user: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        let combined = format!("{system}\n\n---\n\nUser message:\n{user}");
        self.complete(&combined, params)
    }
}

impl<P: LlmProvider + ?Sized> LlmProvider for Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        (**self).complete(prompt, params)
    }

    fn complete_with_system(
        &self,
        system: &str,
        user: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        (**self).complete_with_system(system, user, params)
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from config settings.
    ///
    /// A zero timeout is replaced by the default so every request stays bounded.
    #[must_use]
    pub const fn from_config(config: &LlmConfig) -> Self {
        let defaults = Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        };
        Self {
            timeout_ms: if config.timeout_ms == 0 {
                defaults.timeout_ms
            } else {
                config.timeout_ms
            },
            connect_timeout_ms: if config.connect_timeout_ms == 0 {
                defaults.connect_timeout_ms
            } else {
                config.connect_timeout_ms
            },
        }
    }
}

/// Builds a blocking HTTP client for LLM requests with configured timeouts.
///
/// The client must be created and dropped outside an async runtime.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!("Failed to build LLM HTTP client: {err}");
            reqwest::blocking::Client::new()
        })
}

/// Builds the configured provider, or `None` when no API key is set.
#[must_use]
pub fn build_provider(config: &LlmConfig) -> Option<Arc<dyn LlmProvider>> {
    let Some(api_key) = config.api_key.clone() else {
        tracing::warn!(
            env = config.provider.api_key_env(),
            "No LLM API key configured; AI summaries will use the fallback text"
        );
        return None;
    };

    let mut client = match config.provider {
        LlmBackend::Groq => OpenAiClient::groq(),
        LlmBackend::OpenAi => OpenAiClient::openai(),
    }
    .with_api_key(api_key)
    .with_http_client(build_http_client(LlmHttpConfig::from_config(config)));
    if let Some(model) = &config.model {
        client = client.with_model(model.clone());
    }
    if let Some(base_url) = &config.base_url {
        client = client.with_endpoint(base_url.clone());
    }

    tracing::info!(
        provider = client.name(),
        model = client.model(),
        "LLM provider configured"
    );
    let resilient = ResilientLlmProvider::new(client, LlmResilienceConfig::from_config(config));
    Some(Arc::new(resilient))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_no_key_means_no_provider() {
        assert!(build_provider(&LlmConfig::default()).is_none());
    }

    #[test]
    fn test_provider_built_with_key() {
        let config = LlmConfig {
            api_key: Some(SecretString::from("gsk_test".to_string())),
            ..LlmConfig::default()
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "groq");

        let config = LlmConfig {
            provider: LlmBackend::OpenAi,
            api_key: Some(SecretString::from("sk_test".to_string())),
            ..LlmConfig::default()
        };
        assert_eq!(build_provider(&config).unwrap().name(), "openai");
    }

    #[test]
    fn test_zero_timeouts_fall_back_to_defaults() {
        let config = LlmConfig {
            timeout_ms: 0,
            connect_timeout_ms: 0,
            ..LlmConfig::default()
        };
        let http = LlmHttpConfig::from_config(&config);
        assert_eq!(http.timeout_ms, 30_000);
        assert_eq!(http.connect_timeout_ms, 3_000);

        let config = LlmConfig {
            timeout_ms: 1_500,
            connect_timeout_ms: 250,
            ..LlmConfig::default()
        };
        let http = LlmHttpConfig::from_config(&config);
        assert_eq!(http.timeout_ms, 1_500);
        assert_eq!(http.connect_timeout_ms, 250);
    }

    struct Echo;

    impl LlmProvider for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn complete(&self, prompt: &str, _: &GenerationParams) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    #[test]
    fn test_default_system_prompt_concatenation() {
        let out = Echo
            .complete_with_system("sys", "user", &GenerationParams::default())
            .unwrap();
        assert_eq!(out, "sys\n\n---\n\nUser message:\nuser");
    }
}
