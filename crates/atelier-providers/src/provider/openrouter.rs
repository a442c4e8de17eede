//! `OpenRouter` provider
//!
//! Both text and images go through `chat/completions`. The account is
//! prepaid, so an empty balance shows up as HTTP 402.

use async_trait::async_trait;
use atelier_config::ProviderConfig;
use atelier_core::{
    GeneratedImage, GenerationRequest, KeyValidation, ProviderError, ProviderKind, RawFailure, RetryPolicy,
    with_retries,
};
use reqwest::Client;
use secrecy::SecretString;
use serde_json::Value;

use super::chat::{ChatClient, JsonMode};
use super::{Endpoint, ImageGeneration, Provider};
use crate::aspect;
use crate::protocol::openai::{ChatMessage, ChatRequest, ContentPart, ImageUrl, ResponseMessage};

/// Default `OpenRouter` API base URL
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_TEXT_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_IMAGE_MODEL: &str = "google/gemini-2.5-flash-image";

/// `OpenRouter` provider
pub struct OpenRouterProvider {
    chat: ChatClient,
    text_model: String,
    image_model: String,
}

impl OpenRouterProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or timeout is invalid
    pub fn new(client: Client, config: &ProviderConfig, retry: RetryPolicy) -> anyhow::Result<Self> {
        let endpoint = Endpoint::new(client, config, DEFAULT_BASE_URL, retry)?;

        let mut chat = ChatClient::new(ProviderKind::OpenRouter, endpoint).with_failure_rewrite(billing_failure);
        if let Some(url) = &config.app_url {
            chat = chat.with_header("HTTP-Referer", url);
        }
        if let Some(name) = &config.app_name {
            chat = chat.with_header("X-Title", name);
        }

        Ok(Self {
            chat,
            text_model: super::model_or(config.text_model.as_ref(), DEFAULT_TEXT_MODEL),
            image_model: super::model_or(config.image_model.as_ref(), DEFAULT_IMAGE_MODEL),
        })
    }

    async fn complete_image(
        &self,
        api_key: &SecretString,
        body: &ChatRequest,
    ) -> Result<Option<GeneratedImage>, RawFailure> {
        let response = self.chat.complete(api_key, body).await?;
        Ok(response.message().and_then(extract_image))
    }
}

/// Rewrite an out-of-credits response so the user knows to top up
fn billing_failure(failure: RawFailure) -> RawFailure {
    match failure {
        RawFailure::Http { status: 402, message } => RawFailure::Http {
            status: 402,
            message: format!(
                "Insufficient credits on the OpenRouter account. Add credits in your OpenRouter billing settings \
                 or switch to another provider. ({message})"
            ),
        },
        other => other,
    }
}

/// First image in an assistant message
///
/// Checked in order: the `images` array, a `content` array of parts, and a
/// `content` string that itself holds a JSON array of parts.
fn extract_image(message: &ResponseMessage) -> Option<GeneratedImage> {
    if let Some(image) = message.images.iter().find_map(image_from_part) {
        return Some(image);
    }

    match message.content.as_ref()? {
        Value::Array(parts) => parts.iter().find_map(image_from_part),
        Value::String(text) => match serde_json::from_str::<Value>(text.trim()).ok()? {
            Value::Array(parts) => parts.iter().find_map(image_from_part),
            _ => None,
        },
        _ => None,
    }
}

/// Image from a part shaped `{"type":"image_url","image_url":{"url":"data:..."}}`
///
/// `image_url` is also accepted as a bare string.
fn image_from_part(part: &Value) -> Option<GeneratedImage> {
    let image_url = part.get("image_url")?;
    let url = image_url.get("url").unwrap_or(image_url).as_str()?;
    GeneratedImage::from_data_url(url)
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
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
        self.chat
            .generate_json(api_key, &self.text_model, prompt, schema, JsonMode::SchemaOrObject)
            .await
    }

    async fn validate_api_key(&self, api_key: &str) -> KeyValidation {
        if let Some(invalid) = super::blank_key(api_key) {
            return invalid;
        }

        let key = SecretString::from(api_key.trim());
        let outcome = self.chat.probe(&key, &self.text_model).await;

        super::validation_outcome(ProviderKind::OpenRouter, outcome)
    }
}

#[async_trait]
impl ImageGeneration for OpenRouterProvider {
    async fn generate_image(
        &self,
        api_key: &SecretString,
        request: &GenerationRequest,
    ) -> Result<Option<GeneratedImage>, ProviderError> {
        let prompt = match request.aspect_ratio() {
            Some(aspect) => aspect::sized_prompt(request.prompt(), aspect).0,
            None => request.prompt().to_owned(),
        };

        let mut parts = vec![ContentPart::Text { text: prompt }];
        parts.extend(request.images().iter().map(|image| ContentPart::ImageUrl {
            image_url: ImageUrl { url: image.data_url() },
        }));

        let mut body = ChatRequest::new(&self.image_model, vec![ChatMessage::user_parts(parts)]);
        body.modalities = Some(vec!["image".to_owned(), "text".to_owned()]);
        let body = &body;

        let image = with_retries(self.chat.endpoint().retry(), move || self.complete_image(api_key, body)).await?;

        if image.is_none() {
            tracing::debug!(model = %self.image_model, "openrouter returned no image");
        }

        Ok(image)
    }
}
