use std::fmt;

use thiserror::Error;

/// Failure observed while talking to a provider, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFailure {
    /// Provider answered with a non-success HTTP status
    Http {
        /// HTTP status code
        status: u16,
        /// Message from the error envelope, or the status line
        message: String,
    },
    /// Request never produced an HTTP status (connect, timeout, body read)
    Transport(String),
    /// Provider answered successfully but the payload was unusable
    Response(String),
}

impl RawFailure {
    /// HTTP status, if the provider answered at all
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(_) | Self::Response(_) => None,
        }
    }

    /// Vendor-supplied message
    pub fn message(&self) -> &str {
        match self {
            Self::Http { message, .. } | Self::Transport(message) | Self::Response(message) => message,
        }
    }
}

impl fmt::Display for RawFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Transport(message) => write!(f, "transport error: {message}"),
            Self::Response(message) => write!(f, "unusable response: {message}"),
        }
    }
}

/// Classified provider error
///
/// The display text is meant for end users and names the action that
/// resolves the problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Too many requests for the key or the shared default key
    #[error(
        "The AI service is receiving too many requests. Wait a moment and try again, or add your own API key in settings. ({0})"
    )]
    RateLimited(String),

    /// Key has no quota left for the current period
    #[error("The API key has used up its quota. Add your own API key in settings or check the billing for your key. ({0})")]
    QuotaExceeded(String),

    /// Provider did not recognize the key
    #[error("The API key was rejected. Check that it is entered correctly in settings. ({0})")]
    InvalidKey(String),

    /// Prompt or output was blocked by provider safety filters
    #[error("The request was blocked by the provider's safety filters. Try rephrasing the prompt or using different images. ({0})")]
    SafetyBlocked(String),

    /// Network-level failure, worth retrying
    #[error("Could not reach the AI service. Check your connection and try again. ({0})")]
    Retriable(String),

    /// Anything else
    #[error("{0}")]
    Generic(String),
}

/// Discriminant of [`ProviderError`], for logging and matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimited,
    QuotaExceeded,
    InvalidKey,
    SafetyBlocked,
    Retriable,
    Generic,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::QuotaExceeded => "quota_exceeded",
            Self::InvalidKey => "invalid_key",
            Self::SafetyBlocked => "safety_blocked",
            Self::Retriable => "retriable",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProviderError {
    /// Whether the retry policy may run the call again
    ///
    /// Only rate limits and network failures are transient; every other
    /// kind will fail the same way on a second attempt.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Retriable(_))
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::SafetyBlocked(_) => ErrorKind::SafetyBlocked,
            Self::Retriable(_) => ErrorKind::Retriable,
            Self::Generic(_) => ErrorKind::Generic,
        }
    }

    /// Underlying vendor detail without the user-facing framing
    pub fn detail(&self) -> &str {
        match self {
            Self::RateLimited(detail)
            | Self::QuotaExceeded(detail)
            | Self::InvalidKey(detail)
            | Self::SafetyBlocked(detail)
            | Self::Retriable(detail)
            | Self::Generic(detail) => detail,
        }
    }
}

/// Map a raw provider failure onto the error taxonomy
///
/// Rules are checked in order and the first match wins. Message matching
/// is case-insensitive.
pub fn classify(failure: RawFailure) -> ProviderError {
    let status = failure.status();
    let lower = failure.message().to_lowercase();
    let is_transport = matches!(failure, RawFailure::Transport(_));
    let message = match failure {
        RawFailure::Http { message, .. } | RawFailure::Transport(message) | RawFailure::Response(message) => message,
    };

    if lower.contains("quota exceeded") || lower.contains("daily limit") {
        return ProviderError::QuotaExceeded(message);
    }

    if lower.contains("api key not valid") || status == Some(401) {
        return ProviderError::InvalidKey(message);
    }

    if status == Some(429) || lower.contains("resource_exhausted") {
        return ProviderError::RateLimited(message);
    }

    if lower.contains("safety") {
        return ProviderError::SafetyBlocked(message);
    }

    if lower.contains("fetch failed") || lower.contains("networkerror") || is_transport {
        return ProviderError::Retriable(message);
    }

    if let Some(status) = status
        && status >= 500
    {
        return ProviderError::Generic(format!(
            "The AI service is temporarily unavailable (HTTP {status}). Try again in a few minutes. ({message})"
        ));
    }

    ProviderError::Generic(message)
}
