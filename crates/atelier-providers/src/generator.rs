//! Facade that dispatches generation calls to the provider of the resolved key

use std::collections::HashMap;

use atelier_config::Config;
use atelier_core::{
    AspectRatio, GeneratedImage, GenerationRequest, GenerationResult, KeyValidation, ProviderError, ProviderKind,
};
use atelier_keys::{ApiKeySource, ResolvedKey};
use reqwest::Client;
use serde_json::Value;

use crate::provider::gemini::GeminiProvider;
use crate::provider::openai::OpenAiProvider;
use crate::provider::openrouter::OpenRouterProvider;
use crate::provider::perplexity::PerplexityProvider;
use crate::provider::{ImageGeneration, Provider};

/// Result of [`Generator::generate`] with the key context it ran under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub result: GenerationResult,
    pub provider: ProviderKind,
    pub source: ApiKeySource,
}

impl Generation {
    /// Whether output made this way must carry the usage marker
    pub const fn requires_usage_marker(&self) -> bool {
        matches!(self.source, ApiKeySource::Default)
    }
}

/// Entry point for generation calls
///
/// Holds one adapter per configured provider and routes each call to the
/// provider named by the key it was resolved with.
pub struct Generator {
    providers: HashMap<ProviderKind, Box<dyn Provider>>,
    usage_marker: String,
}

impl Generator {
    pub fn new(providers: Vec<Box<dyn Provider>>, usage_marker: impl Into<String>) -> Self {
        Self {
            providers: providers.into_iter().map(|p| (p.kind(), p)).collect(),
            usage_marker: usage_marker.into(),
        }
    }

    /// Build adapters for every provider in the configuration
    ///
    /// All adapters share one connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or a provider
    /// section is invalid
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("atelier/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let retry = config.retry.policy()?;

        let mut providers: Vec<Box<dyn Provider>> = Vec::new();

        for (kind, provider_config) in config.providers.iter() {
            let provider: Box<dyn Provider> = match kind {
                ProviderKind::Gemini => Box::new(GeminiProvider::new(client.clone(), provider_config, retry)?),
                ProviderKind::OpenAi => Box::new(OpenAiProvider::new(client.clone(), provider_config, retry)?),
                ProviderKind::OpenRouter => {
                    Box::new(OpenRouterProvider::new(client.clone(), provider_config, retry)?)
                }
                ProviderKind::Perplexity => {
                    Box::new(PerplexityProvider::new(client.clone(), provider_config, retry)?)
                }
            };

            tracing::debug!(provider = %kind, image = provider.capabilities().image, "provider configured");
            providers.push(provider);
        }

        Ok(Self::new(providers, config.generation.usage_marker.clone()))
    }

    /// Text attached to output made with the bundled key
    pub fn usage_marker(&self) -> &str {
        &self.usage_marker
    }

    /// Configured providers in a stable order
    fn providers(&self) -> impl Iterator<Item = ProviderKind> + '_ {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.providers.contains_key(kind))
    }

    /// Adapter for `kind`
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Generic` if the provider is not configured
    pub fn provider(&self, kind: ProviderKind) -> Result<&dyn Provider, ProviderError> {
        self.providers.get(&kind).map(Box::as_ref).ok_or_else(|| {
            let configured = self.providers().map(|kind| kind.to_string()).collect::<Vec<_>>();
            ProviderError::Generic(format!(
                "{} is not configured. Add a [providers.{kind}] section to the configuration (configured: {}).",
                kind.display_name(),
                configured.join(", ")
            ))
        })
    }

    fn image_provider(&self, kind: ProviderKind) -> Result<&dyn ImageGeneration, ProviderError> {
        self.provider(kind)?.image().ok_or_else(|| {
            ProviderError::Generic(format!(
                "{} cannot generate images. Switch to a provider with image support, such as Gemini, in settings.",
                kind.display_name()
            ))
        })
    }

    /// Generate JSON text with the key's provider
    ///
    /// # Errors
    ///
    /// Returns the classified provider error
    pub async fn generate_text(
        &self,
        key: &ResolvedKey,
        prompt: &str,
        schema: Option<&Value>,
    ) -> Result<String, ProviderError> {
        self.provider(key.provider)?
            .generate_text(&key.api_key, prompt, schema)
            .await
    }

    /// Generate or edit an image with the key's provider
    ///
    /// # Errors
    ///
    /// Returns the classified provider error, or `Generic` if the provider
    /// has no image capability
    pub async fn generate_image(
        &self,
        key: &ResolvedKey,
        request: &GenerationRequest,
    ) -> Result<Option<GeneratedImage>, ProviderError> {
        self.image_provider(key.provider)?
            .generate_image(&key.api_key, request)
            .await
    }

    /// Generate an image from text alone with the key's provider
    ///
    /// # Errors
    ///
    /// Returns the classified provider error, or `Generic` if the provider
    /// has no image capability
    pub async fn generate_image_from_text(
        &self,
        key: &ResolvedKey,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<Option<GeneratedImage>, ProviderError> {
        self.image_provider(key.provider)?
            .generate_image_from_text(&key.api_key, prompt, aspect_ratio)
            .await
    }

    /// Check a key against `kind` without retrying
    pub async fn validate_api_key(&self, kind: ProviderKind, api_key: &str) -> KeyValidation {
        match self.provider(kind) {
            Ok(provider) => provider.validate_api_key(api_key).await,
            Err(e) => KeyValidation::invalid(e.to_string()),
        }
    }

    /// Run a request: text when it carries a schema, image edit when it
    /// carries images, image from text otherwise
    ///
    /// # Errors
    ///
    /// Returns the classified provider error
    pub async fn generate(&self, key: &ResolvedKey, request: &GenerationRequest) -> Result<Generation, ProviderError> {
        tracing::info!(
            provider = %key.provider,
            source = ?key.source,
            images = request.images().len(),
            structured = request.schema().is_some(),
            "generation started"
        );

        let result = if let Some(schema) = request.schema() {
            GenerationResult::Text(self.generate_text(key, request.prompt(), Some(schema)).await?)
        } else if request.images().is_empty() {
            let aspect_ratio = request.aspect_ratio().unwrap_or(AspectRatio::SQUARE);
            self.generate_image_from_text(key, request.prompt(), aspect_ratio)
                .await?
                .into()
        } else {
            self.generate_image(key, request).await?.into()
        };

        if result.is_empty() {
            tracing::info!(provider = %key.provider, "generation finished without output");
        }

        Ok(Generation {
            result,
            provider: key.provider,
            source: key.source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use secrecy::{ExposeSecret, SecretString};

    use super::*;

    /// Records calls and answers with canned values
    #[derive(Default)]
    struct Recording {
        text_calls: AtomicUsize,
        image_calls: AtomicUsize,
        with_image: bool,
    }

    struct FakeProvider {
        kind: ProviderKind,
        state: Arc<Recording>,
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn image(&self) -> Option<&dyn ImageGeneration> {
            self.state.with_image.then_some(self as &dyn ImageGeneration)
        }

        async fn generate_text(
            &self,
            api_key: &SecretString,
            _prompt: &str,
            _schema: Option<&Value>,
        ) -> Result<String, ProviderError> {
            self.state.text_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{{\"key\":\"{}\"}}", api_key.expose_secret()))
        }

        async fn validate_api_key(&self, api_key: &str) -> KeyValidation {
            if api_key == "good" {
                KeyValidation::valid()
            } else {
                KeyValidation::invalid("bad key")
            }
        }
    }

    #[async_trait]
    impl ImageGeneration for FakeProvider {
        async fn generate_image(
            &self,
            _api_key: &SecretString,
            request: &GenerationRequest,
        ) -> Result<Option<GeneratedImage>, ProviderError> {
            self.state.image_calls.fetch_add(1, Ordering::SeqCst);
            if request.prompt().contains("nothing") {
                return Ok(None);
            }
            Ok(Some(GeneratedImage::new("Zm9v", "image/png")))
        }
    }

    fn generator(kind: ProviderKind, with_image: bool) -> (Generator, Arc<Recording>) {
        let state = Arc::new(Recording {
            with_image,
            ..Recording::default()
        });
        let provider = FakeProvider {
            kind,
            state: Arc::clone(&state),
        };
        (Generator::new(vec![Box::new(provider)], "Made with Atelier"), state)
    }

    fn key(provider: ProviderKind, source: ApiKeySource) -> ResolvedKey {
        ResolvedKey {
            provider,
            api_key: SecretString::from("k-123"),
            source,
        }
    }

    #[tokio::test]
    async fn schema_requests_go_to_text() {
        let (generator, state) = generator(ProviderKind::Gemini, true);
        let request = GenerationRequest::new("describe").with_schema(serde_json::json!({"type": "object"}));

        let generation = generator
            .generate(&key(ProviderKind::Gemini, ApiKeySource::Custom), &request)
            .await
            .unwrap();

        assert_eq!(generation.result, GenerationResult::Text("{\"key\":\"k-123\"}".to_owned()));
        assert!(!generation.requires_usage_marker());
        assert_eq!(state.text_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn default_source_requires_marker() {
        let (generator, _) = generator(ProviderKind::Gemini, true);

        let generation = generator
            .generate(&key(ProviderKind::Gemini, ApiKeySource::Default), &GenerationRequest::new("a cat"))
            .await
            .unwrap();

        assert!(matches!(generation.result, GenerationResult::Image(_)));
        assert!(generation.requires_usage_marker());
        assert_eq!(generator.usage_marker(), "Made with Atelier");
    }

    #[tokio::test]
    async fn no_image_is_empty_not_error() {
        let (generator, _) = generator(ProviderKind::OpenAi, true);

        let generation = generator
            .generate(&key(ProviderKind::OpenAi, ApiKeySource::Custom), &GenerationRequest::new("draw nothing"))
            .await
            .unwrap();

        assert!(generation.result.is_empty());
    }

    #[tokio::test]
    async fn image_request_to_text_only_provider_fails() {
        let (generator, state) = generator(ProviderKind::Perplexity, false);

        let err = generator
            .generate(&key(ProviderKind::Perplexity, ApiKeySource::Custom), &GenerationRequest::new("a cat"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Generic(_)));
        assert!(err.to_string().contains("Perplexity cannot generate images"));
        assert_eq!(state.image_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unconfigured_provider_is_reported() {
        let (generator, _) = generator(ProviderKind::Gemini, true);

        let err = generator
            .generate_text(&key(ProviderKind::OpenRouter, ApiKeySource::Custom), "p", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("OpenRouter is not configured"));
        assert!(err.to_string().contains("(configured: gemini)"));

        let validation = generator.validate_api_key(ProviderKind::OpenRouter, "good").await;
        assert!(!validation.is_valid);
    }

    #[tokio::test]
    async fn validation_is_routed_by_kind() {
        let (generator, _) = generator(ProviderKind::Gemini, true);

        assert!(generator.validate_api_key(ProviderKind::Gemini, "good").await.is_valid);
        assert!(!generator.validate_api_key(ProviderKind::Gemini, "bad").await.is_valid);
    }
}
