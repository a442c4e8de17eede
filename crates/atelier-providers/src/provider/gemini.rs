//! Gemini provider: multimodal text and image generation

use async_trait::async_trait;
use atelier_config::ProviderConfig;
use atelier_core::{
    GeneratedImage, GenerationRequest, KeyValidation, ProviderError, ProviderKind, RawFailure, RetryPolicy,
    with_retries,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::{Endpoint, ImageGeneration, JSON_INSTRUCTION, Provider};
use crate::aspect;
use crate::http;
use crate::protocol::gemini::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};

/// Default Generative Language API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Gemini provider
pub struct GeminiProvider {
    endpoint: Endpoint,
    text_model: String,
    image_model: String,
}

impl GeminiProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or timeout is invalid
    pub fn new(client: Client, config: &ProviderConfig, retry: RetryPolicy) -> anyhow::Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new(client, config, DEFAULT_BASE_URL, retry)?,
            text_model: super::model_or(config.text_model.as_ref(), DEFAULT_TEXT_MODEL),
            image_model: super::model_or(config.image_model.as_ref(), DEFAULT_IMAGE_MODEL),
        })
    }

    /// One `generateContent` call without retries
    async fn generate_content(
        &self,
        api_key: &SecretString,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, RawFailure> {
        let request = self
            .endpoint
            .post(&format!("models/{model}:generateContent"))
            .header("x-goog-api-key", api_key.expose_secret())
            .json(body);

        let response = http::send(ProviderKind::Gemini, request).await?;
        let response: GenerateContentResponse = http::read_json(response).await?;

        if let Some(reason) = response.block_reason() {
            return Err(RawFailure::Response(format!(
                "prompt was blocked by safety filters ({reason})"
            )));
        }

        Ok(response)
    }

    async fn generate_content_with_retries(
        &self,
        api_key: &SecretString,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError> {
        with_retries(self.endpoint.retry(), move || self.generate_content(api_key, model, body)).await
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn image(&self) -> Option<&dyn ImageGeneration> {
        Some(self)
    }

    async fn generate_text(
        &self,
        api_key: &SecretString,
        prompt: &str,
        schema: Option<&Value>,
    ) -> Result<String, ProviderError> {
        let body = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompt)])],
            system_instruction: Some(Content::system(JSON_INSTRUCTION)),
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_owned()),
                response_schema: schema.cloned(),
                ..GenerationConfig::default()
            }),
        };

        let response = self
            .generate_content_with_retries(api_key, &self.text_model, &body)
            .await?;

        let text = response.text();
        let text = text.trim();

        if text.is_empty() {
            let message = match response.finish_reason() {
                Some("SAFETY") => "response was blocked by safety filters".to_owned(),
                Some(reason) => format!("response contained no text (finish reason {reason})"),
                None => "response contained no text".to_owned(),
            };
            return Err(atelier_core::classify(RawFailure::Response(message)));
        }

        Ok(text.to_owned())
    }

    async fn validate_api_key(&self, api_key: &str) -> KeyValidation {
        if let Some(invalid) = super::blank_key(api_key) {
            return invalid;
        }

        let body = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text("hi")])],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                max_output_tokens: Some(1),
                ..GenerationConfig::default()
            }),
        };

        let key = SecretString::from(api_key.trim());
        let outcome = self
            .generate_content(&key, &self.text_model, &body)
            .await
            .map(|_| ());

        super::validation_outcome(ProviderKind::Gemini, outcome)
    }
}

#[async_trait]
impl ImageGeneration for GeminiProvider {
    async fn generate_image(
        &self,
        api_key: &SecretString,
        request: &GenerationRequest,
    ) -> Result<Option<GeneratedImage>, ProviderError> {
        let prompt = match request.aspect_ratio() {
            Some(aspect) => aspect::free_prompt(request.prompt(), aspect),
            None => request.prompt().to_owned(),
        };

        let mut parts: Vec<Part> = request
            .images()
            .iter()
            .map(|image| Part::inline(&image.mime_type, image.to_base64()))
            .collect();
        parts.push(Part::text(prompt));

        let body = GenerateContentRequest {
            contents: vec![Content::user(parts)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_owned(), "TEXT".to_owned()]),
                ..GenerationConfig::default()
            }),
        };

        let response = self
            .generate_content_with_retries(api_key, &self.image_model, &body)
            .await?;

        let image = response
            .first_image()
            .map(|data| GeneratedImage::new(&data.data, &data.mime_type));

        if image.is_none() {
            tracing::debug!(
                finish_reason = response.finish_reason().unwrap_or("unknown"),
                "gemini returned no image"
            );
        }

        Ok(image)
    }
}
