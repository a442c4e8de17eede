//! `OpenAI`-compatible chat completion and image wire format types
//!
//! Shared by `OpenAI`, `OpenRouter`, and Perplexity.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// -- Chat completions --

/// `chat/completions` request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Output modalities (`OpenRouter` image generation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            response_format: None,
            max_tokens: None,
            modalities: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text.into()),
        }
    }

    pub const fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Parts(parts),
        }
    }
}

/// Plain string content or multimodal parts
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Structured output mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonObject,
    JsonSchema { json_schema: JsonSchemaFormat },
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub schema: Value,
}

/// `chat/completions` response, reduced to what is read
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

/// Assistant message
///
/// `content` is kept loose: vendors answer with a string, an array of
/// parts, or null.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<Value>,
    /// Generated images (`OpenRouter`)
    #[serde(default)]
    pub images: Vec<Value>,
}

impl ChatResponse {
    pub fn message(&self) -> Option<&ResponseMessage> {
        self.choices.first()?.message.as_ref()
    }
}

// -- Images --

/// `images/generations` request
#[derive(Debug, Clone, Serialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub n: u32,
    pub size: &'static str,
}

/// Response shared by `images/generations` and `images/edits`
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub data: Vec<ImageDatum>,
    /// Encoding of the returned images, e.g. "png" or "webp"
    #[serde(default)]
    pub output_format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageDatum {
    #[serde(default)]
    pub b64_json: Option<String>,
}

impl ImagesResponse {
    pub fn first_b64(&self) -> Option<&str> {
        self.data
            .iter()
            .filter_map(|datum| datum.b64_json.as_deref())
            .find(|data| !data.is_empty())
    }

    pub fn mime_type(&self) -> String {
        format!("image/{}", self.output_format.as_deref().unwrap_or("png"))
    }
}
