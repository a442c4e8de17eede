//! Client for `OpenAI`-compatible `chat/completions` endpoints

use atelier_core::{ProviderError, ProviderKind, RawFailure, with_retries};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::{Endpoint, JSON_INSTRUCTION};
use crate::http;
use crate::protocol::openai::{ChatMessage, ChatRequest, ChatResponse, JsonSchemaFormat, ResponseFormat};

/// How a vendor accepts JSON-mode requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JsonMode {
    /// `json_schema` with a schema, `json_object` without
    SchemaOrObject,
    /// System instruction only; `response_format` is never sent
    InstructionOnly,
}

pub(crate) struct ChatClient {
    kind: ProviderKind,
    endpoint: Endpoint,
    headers: Vec<(&'static str, String)>,
    rewrite_failure: fn(RawFailure) -> RawFailure,
}

impl ChatClient {
    pub(crate) fn new(kind: ProviderKind, endpoint: Endpoint) -> Self {
        Self {
            kind,
            endpoint,
            headers: Vec::new(),
            rewrite_failure: std::convert::identity,
        }
    }

    /// Adjust vendor failures before they are classified
    pub(crate) fn with_failure_rewrite(mut self, rewrite: fn(RawFailure) -> RawFailure) -> Self {
        self.rewrite_failure = rewrite;
        self
    }

    /// Send `name: value` on every request
    pub(crate) fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub(crate) const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// One `chat/completions` call without retries
    pub(crate) async fn complete(&self, api_key: &SecretString, body: &ChatRequest) -> Result<ChatResponse, RawFailure> {
        let mut request = self
            .endpoint
            .post("chat/completions")
            .bearer_auth(api_key.expose_secret())
            .json(body);

        for (name, value) in &self.headers {
            request = request.header(*name, value);
        }

        let response = http::send(self.kind, request).await.map_err(self.rewrite_failure)?;
        http::read_json(response).await
    }

    /// Generate JSON text under the endpoint's retry policy
    pub(crate) async fn generate_json(
        &self,
        api_key: &SecretString,
        model: &str,
        prompt: &str,
        schema: Option<&Value>,
        mode: JsonMode,
    ) -> Result<String, ProviderError> {
        let body = json_request(model, prompt, schema, mode);
        let body = &body;

        let response = with_retries(self.endpoint.retry(), move || self.complete(api_key, body)).await?;

        message_text(&response).map_err(atelier_core::classify)
    }

    /// Smallest possible authenticated completion
    pub(crate) async fn probe(&self, api_key: &SecretString, model: &str) -> Result<(), RawFailure> {
        let mut body = ChatRequest::new(model, vec![ChatMessage::user("hi")]);
        body.max_tokens = Some(1);

        self.complete(api_key, &body).await.map(|_| ())
    }
}

fn json_request(model: &str, prompt: &str, schema: Option<&Value>, mode: JsonMode) -> ChatRequest {
    let mut request = ChatRequest::new(
        model,
        vec![ChatMessage::system(JSON_INSTRUCTION), ChatMessage::user(prompt)],
    );

    request.response_format = match (schema, mode) {
        (_, JsonMode::InstructionOnly) => None,
        (Some(schema), JsonMode::SchemaOrObject) => Some(ResponseFormat::JsonSchema {
            json_schema: JsonSchemaFormat {
                name: "response".to_owned(),
                schema: schema.clone(),
            },
        }),
        (None, JsonMode::SchemaOrObject) => Some(ResponseFormat::JsonObject),
    };

    request
}

/// Text of the first choice
///
/// Content may be a string or an array of `{type: "text"}` parts.
pub(crate) fn message_text(response: &ChatResponse) -> Result<String, RawFailure> {
    let content = response
        .message()
        .and_then(|message| message.content.as_ref())
        .ok_or_else(|| RawFailure::Response("response contained no message content".to_owned()))?;

    let text = match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect(),
        _ => String::new(),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(RawFailure::Response("response contained no text".to_owned()));
    }

    Ok(text.to_owned())
}
