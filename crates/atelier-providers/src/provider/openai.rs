//! `OpenAI` provider: chat completions for text, image endpoints for images

use async_trait::async_trait;
use atelier_config::ProviderConfig;
use atelier_core::{
    GeneratedImage, GenerationRequest, InputImage, KeyValidation, ProviderError, ProviderKind, RawFailure,
    RetryPolicy, with_retries,
};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::chat::{ChatClient, JsonMode};
use super::{Endpoint, ImageGeneration, Provider};
use crate::aspect::{self, ImageSize};
use crate::http;
use crate::protocol::openai::{ImageGenerationRequest, ImagesResponse};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TEXT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1";

/// `OpenAI` provider
pub struct OpenAiProvider {
    chat: ChatClient,
    text_model: String,
    image_model: String,
}

impl OpenAiProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or timeout is invalid
    pub fn new(client: Client, config: &ProviderConfig, retry: RetryPolicy) -> anyhow::Result<Self> {
        let endpoint = Endpoint::new(client, config, DEFAULT_BASE_URL, retry)?;

        Ok(Self {
            chat: ChatClient::new(ProviderKind::OpenAi, endpoint),
            text_model: super::model_or(config.text_model.as_ref(), DEFAULT_TEXT_MODEL),
            image_model: super::model_or(config.image_model.as_ref(), DEFAULT_IMAGE_MODEL),
        })
    }

    /// `images/generations` call without retries
    async fn create_image(
        &self,
        api_key: &SecretString,
        prompt: &str,
        size: ImageSize,
    ) -> Result<Option<GeneratedImage>, RawFailure> {
        let body = ImageGenerationRequest {
            model: self.image_model.clone(),
            prompt: prompt.to_owned(),
            n: 1,
            size: size.as_str(),
        };

        let request = self
            .chat
            .endpoint()
            .post("images/generations")
            .bearer_auth(api_key.expose_secret())
            .json(&body);

        let response = http::send(ProviderKind::OpenAi, request).await?;
        Ok(first_image(http::read_json(response).await?))
    }

    /// `images/edits` call without retries
    ///
    /// The multipart form is rebuilt on every attempt since it is consumed
    /// by sending.
    async fn edit_image(
        &self,
        api_key: &SecretString,
        prompt: &str,
        size: ImageSize,
        images: &[InputImage],
    ) -> Result<Option<GeneratedImage>, RawFailure> {
        let mut form = Form::new()
            .text("model", self.image_model.clone())
            .text("prompt", prompt.to_owned())
            .text("n", "1")
            .text("size", size.as_str());

        for image in images {
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.name.clone())
                .mime_str(&image.mime_type)
                .map_err(|e| RawFailure::Response(format!("invalid image MIME type '{}': {e}", image.mime_type)))?;
            form = form.part("image[]", part);
        }

        let request = self
            .chat
            .endpoint()
            .post("images/edits")
            .bearer_auth(api_key.expose_secret())
            .multipart(form);

        let response = http::send(ProviderKind::OpenAi, request).await?;
        Ok(first_image(http::read_json(response).await?))
    }
}

fn first_image(response: ImagesResponse) -> Option<GeneratedImage> {
    let mime_type = response.mime_type();
    response.first_b64().map(|data| GeneratedImage::new(data, mime_type))
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
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

        super::validation_outcome(ProviderKind::OpenAi, outcome)
    }
}

#[async_trait]
impl ImageGeneration for OpenAiProvider {
    async fn generate_image(
        &self,
        api_key: &SecretString,
        request: &GenerationRequest,
    ) -> Result<Option<GeneratedImage>, ProviderError> {
        let (prompt, size) = match request.aspect_ratio() {
            Some(aspect) => aspect::sized_prompt(request.prompt(), aspect),
            None => (request.prompt().to_owned(), ImageSize::Square),
        };
        let prompt = prompt.as_str();
        let images = request.images();

        let image = if images.is_empty() {
            with_retries(self.chat.endpoint().retry(), move || {
                self.create_image(api_key, prompt, size)
            })
            .await?
        } else {
            with_retries(self.chat.endpoint().retry(), move || {
                self.edit_image(api_key, prompt, size, images)
            })
            .await?
        };

        if image.is_none() {
            tracing::debug!("openai returned no image data");
        }

        Ok(image)
    }
}
