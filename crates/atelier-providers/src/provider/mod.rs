//! Provider traits and the vendor adapters behind them

mod chat;
pub mod gemini;
pub mod openai;
pub mod openrouter;
pub mod perplexity;

use std::time::Duration;

use async_trait::async_trait;
use atelier_config::ProviderConfig;
use atelier_core::{
    AspectRatio, GeneratedImage, GenerationRequest, KeyValidation, ProviderError, ProviderKind, RawFailure,
    RetryPolicy, classify,
};
use reqwest::{Client, RequestBuilder};
use secrecy::SecretString;
use serde_json::Value;
use url::Url;

/// System instruction for every text call
pub(crate) const JSON_INSTRUCTION: &str = "You are a helpful assistant that always responds with valid JSON. \
     Respond with a single JSON value and nothing else: no prose, no markdown, no code fences.";

/// What a provider can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    pub text: bool,
    pub image: bool,
}

/// A generation backend
///
/// Adapters hold no key; the caller passes the key resolved for the call
/// so a source switch never leaks into a request already in flight.
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Image generation, for providers that have it
    fn image(&self) -> Option<&dyn ImageGeneration> {
        None
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            text: true,
            image: self.image().is_some(),
        }
    }

    /// Generate JSON text, optionally constrained by `schema`
    async fn generate_text(
        &self,
        api_key: &SecretString,
        prompt: &str,
        schema: Option<&Value>,
    ) -> Result<String, ProviderError>;

    /// Check a key with the cheapest authenticated call the vendor offers
    ///
    /// Never fails: problems are reported in the returned value.
    async fn validate_api_key(&self, api_key: &str) -> KeyValidation;
}

/// Image generation and editing
#[async_trait]
pub trait ImageGeneration: Send + Sync {
    /// Generate or edit an image
    ///
    /// `Ok(None)` means the vendor answered without an image.
    async fn generate_image(
        &self,
        api_key: &SecretString,
        request: &GenerationRequest,
    ) -> Result<Option<GeneratedImage>, ProviderError>;

    /// Generate an image from text alone
    async fn generate_image_from_text(
        &self,
        api_key: &SecretString,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<Option<GeneratedImage>, ProviderError> {
        let request = GenerationRequest::new(prompt).with_aspect_ratio(aspect_ratio);
        self.generate_image(api_key, &request).await
    }
}

/// Connection settings shared by one adapter's calls
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    client: Client,
    base_url: Url,
    timeout: Option<Duration>,
    retry: RetryPolicy,
}

impl Endpoint {
    /// Build from config, falling back to the vendor's default base URL
    pub(crate) fn new(
        client: Client,
        config: &ProviderConfig,
        default_base_url: &str,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let base_url = match &config.base_url {
            Some(url) => url.clone(),
            None => Url::parse(default_base_url).map_err(|e| anyhow::anyhow!("invalid base URL: {e}"))?,
        };

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout()?,
            retry,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(self.url(path));
        match self.timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    pub(crate) const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

/// Model from config or the adapter default
pub(crate) fn model_or(configured: Option<&String>, default: &str) -> String {
    configured.map_or_else(|| default.to_owned(), Clone::clone)
}

/// Reject blank keys before any network call
pub(crate) fn blank_key(api_key: &str) -> Option<KeyValidation> {
    api_key
        .trim()
        .is_empty()
        .then(|| KeyValidation::invalid("Enter an API key to validate."))
}

/// Turn the outcome of a validation probe into a [`KeyValidation`]
///
/// A rate-limited key is reported valid: the vendor authenticated it before
/// throttling.
pub(crate) fn validation_outcome(kind: ProviderKind, outcome: Result<(), RawFailure>) -> KeyValidation {
    match outcome.map_err(classify) {
        Ok(()) => KeyValidation::valid(),
        Err(ProviderError::RateLimited(_)) => {
            tracing::debug!(provider = %kind, "key validated while rate limited");
            KeyValidation::valid_with_advisory(format!(
                "The key is valid, but {} is rate limiting it right now. Generation may be slow.",
                kind.display_name()
            ))
        }
        Err(ProviderError::InvalidKey(_)) => KeyValidation::invalid(format!(
            "{} rejected this API key. Check that it was copied correctly.",
            kind.display_name()
        )),
        Err(e) => KeyValidation::invalid(e.to_string()),
    }
}
