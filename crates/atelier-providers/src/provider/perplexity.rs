//! Perplexity provider: search-augmented text, no images

use async_trait::async_trait;
use atelier_config::ProviderConfig;
use atelier_core::{KeyValidation, ProviderError, ProviderKind, RawFailure, RetryPolicy};
use reqwest::Client;
use secrecy::SecretString;
use serde_json::Value;

use super::chat::{ChatClient, JsonMode};
use super::{Endpoint, Provider};

/// Default Perplexity API base URL
const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";
const DEFAULT_TEXT_MODEL: &str = "sonar";

/// Perplexity provider
pub struct PerplexityProvider {
    chat: ChatClient,
    text_model: String,
}

impl PerplexityProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or timeout is invalid
    pub fn new(client: Client, config: &ProviderConfig, retry: RetryPolicy) -> anyhow::Result<Self> {
        let endpoint = Endpoint::new(client, config, DEFAULT_BASE_URL, retry)?;

        Ok(Self {
            chat: ChatClient::new(ProviderKind::Perplexity, endpoint),
            text_model: super::model_or(config.text_model.as_ref(), DEFAULT_TEXT_MODEL),
        })
    }
}

/// Remove reasoning blocks and markdown fences the models wrap JSON in
fn strip_wrapping(text: &str) -> &str {
    let mut text = text.trim();

    if let Some(rest) = text.strip_prefix("<think>")
        && let Some((_, after)) = rest.split_once("</think>")
    {
        text = after.trim();
    }

    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.strip_suffix("```").unwrap_or(rest).trim();
    }

    text
}

/// Stripped completion, rejecting one that held only reasoning or an empty fence
fn unwrapped_text(text: &str) -> Result<String, ProviderError> {
    let text = strip_wrapping(text);
    if text.is_empty() {
        return Err(atelier_core::classify(RawFailure::Response(
            "response contained no text".to_owned(),
        )));
    }

    Ok(text.to_owned())
}

#[async_trait]
impl Provider for PerplexityProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Perplexity
    }

    async fn generate_text(
        &self,
        api_key: &SecretString,
        prompt: &str,
        _schema: Option<&Value>,
    ) -> Result<String, ProviderError> {
        // No schema enforcement here, the system instruction asks for JSON
        let text = self
            .chat
            .generate_json(api_key, &self.text_model, prompt, None, JsonMode::InstructionOnly)
            .await?;

        unwrapped_text(&text)
    }

    async fn validate_api_key(&self, api_key: &str) -> KeyValidation {
        if let Some(invalid) = super::blank_key(api_key) {
            return invalid;
        }

        let key = SecretString::from(api_key.trim());
        let outcome = self.chat.probe(&key, &self.text_model).await;

        super::validation_outcome(ProviderKind::Perplexity, outcome)
    }
}
