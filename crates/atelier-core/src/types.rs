use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generative AI vendors the core can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini, the primary multimodal provider
    Gemini,
    /// `OpenAI`
    OpenAi,
    /// `OpenRouter`, OpenAI-compatible and credit based
    OpenRouter,
    /// Perplexity, search-augmented text only
    Perplexity,
}

impl ProviderKind {
    pub const ALL: [Self; 4] = [Self::Gemini, Self::OpenAi, Self::OpenRouter, Self::Perplexity];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::Perplexity => "perplexity",
        }
    }

    /// Human-facing vendor name
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::OpenAi => "OpenAI",
            Self::OpenRouter => "OpenRouter",
            Self::Perplexity => "Perplexity",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider '{0}', expected one of: gemini, openai, openrouter, perplexity")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownProvider(s.to_owned()))
    }
}

/// Output aspect ratio, `width:height`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AspectRatioError {
    #[error("aspect ratio must look like 16:9, got '{0}'")]
    Malformed(String),
    #[error("aspect ratio sides must be positive, got '{0}'")]
    Zero(String),
}

impl AspectRatio {
    pub const SQUARE: Self = Self { width: 1, height: 1 };

    /// # Errors
    ///
    /// Returns an error if either side is zero
    pub fn new(width: u32, height: u32) -> Result<Self, AspectRatioError> {
        if width == 0 || height == 0 {
            return Err(AspectRatioError::Zero(format!("{width}:{height}")));
        }
        Ok(Self { width, height })
    }

    pub const fn width(self) -> u32 {
        self.width
    }

    pub const fn height(self) -> u32 {
        self.height
    }

    pub fn ratio(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| AspectRatioError::Malformed(s.to_owned()))?;

        let width = w.trim().parse().map_err(|_| AspectRatioError::Malformed(s.to_owned()))?;
        let height = h.trim().parse().map_err(|_| AspectRatioError::Malformed(s.to_owned()))?;

        Self::new(width, height)
    }
}

/// Image supplied as generation input
#[derive(Clone, PartialEq, Eq)]
pub struct InputImage {
    /// Raw encoded bytes (PNG, JPEG, ...)
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `image/png`
    pub mime_type: String,
    /// Display name, used as the upload file name where one is needed
    pub name: String,
}

impl InputImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            name: name.into(),
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:` URL form used by chat-completion image parts
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

impl fmt::Debug for InputImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputImage")
            .field("mime_type", &self.mime_type)
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything a generation call needs; immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    prompt: String,
    images: Vec<InputImage>,
    aspect_ratio: Option<AspectRatio>,
    schema: Option<serde_json::Value>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
            aspect_ratio: None,
            schema: None,
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: InputImage) -> Self {
        self.images.push(image);
        self
    }

    #[must_use]
    pub fn with_images(mut self, images: impl IntoIterator<Item = InputImage>) -> Self {
        self.images.extend(images);
        self
    }

    #[must_use]
    pub const fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }

    /// Request structured text output matching this JSON schema
    #[must_use]
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn images(&self) -> &[InputImage] {
        &self.images
    }

    pub const fn aspect_ratio(&self) -> Option<AspectRatio> {
        self.aspect_ratio
    }

    pub const fn schema(&self) -> Option<&serde_json::Value> {
        self.schema.as_ref()
    }
}

/// Image returned by a provider, still base64 encoded
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Base64 payload
    pub data: String,
    /// MIME type reported by the provider
    pub mime_type: String,
}

impl GeneratedImage {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URL
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        let mime_type = meta.strip_suffix(";base64")?;

        if payload.is_empty() {
            return None;
        }

        let mime_type = if mime_type.is_empty() { "image/png" } else { mime_type };
        Some(Self::new(payload, mime_type))
    }

    /// Decode the payload into raw image bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid base64
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.data.trim())
    }
}

impl fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Outcome of a successful generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Image(GeneratedImage),
    /// JSON text satisfying the requested schema
    Text(String),
    /// Provider succeeded but produced nothing usable
    Empty,
}

impl GenerationResult {
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<Option<GeneratedImage>> for GenerationResult {
    fn from(image: Option<GeneratedImage>) -> Self {
        image.map_or(Self::Empty, Self::Image)
    }
}

/// Result of checking an API key against a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KeyValidation {
    pub const fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    /// Valid, with a note the user should see
    pub fn valid_with_advisory(message: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            error: Some(message.into()),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(message.into()),
        }
    }
}
