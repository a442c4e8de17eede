//! Request plumbing shared by the fetch-based providers

use atelier_core::{ProviderKind, RawFailure};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Send a request, turning transport failures and non-success statuses
/// into [`RawFailure`]s
pub(crate) async fn send(kind: ProviderKind, request: RequestBuilder) -> Result<Response, RawFailure> {
    let response = request.send().await.map_err(|e| {
        tracing::warn!(provider = %kind, error = %e, "provider request failed");
        RawFailure::Transport(e.to_string())
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);

    tracing::warn!(provider = %kind, status = %status, message, "provider returned error");

    Err(RawFailure::Http {
        status: status.as_u16(),
        message,
    })
}

/// Read a success body as JSON
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RawFailure> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| RawFailure::Transport(format!("failed to read response body: {e}")))?;

    serde_json::from_slice(&bytes).map_err(|e| RawFailure::Response(format!("failed to parse response: {e}")))
}

/// Message for a failed response: the JSON error envelope when present,
/// otherwise the status line
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    envelope_message(body).unwrap_or_else(|| status_line(status))
}

/// Extract the message from `{"error": {...}}` or `{"error": "..."}`
///
/// Gemini puts a machine status (e.g. `RESOURCE_EXHAUSTED`) next to the
/// message and `OpenAI`-style APIs put a `code`; either is appended in
/// brackets so the classifier can see it.
fn envelope_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;

    match json.get("error")? {
        Value::String(message) if !message.trim().is_empty() => Some(message.clone()),
        Value::Object(error) => {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.trim().is_empty())?;

            let tag = error
                .get("status")
                .and_then(Value::as_str)
                .or_else(|| error.get("code").and_then(Value::as_str));

            Some(match tag {
                Some("insufficient_quota") => format!("Quota exceeded: {message}"),
                Some(tag) => format!("{message} [{tag}]"),
                None => message.to_owned(),
            })
        }
        _ => None,
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {reason}", status.as_u16()),
        None => format!("HTTP {}", status.as_u16()),
    }
}
