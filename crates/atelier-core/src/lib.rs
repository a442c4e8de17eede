//! Shared building blocks for the Atelier generation core
//!
//! Holds the request/result model, the provider error taxonomy with its
//! classifier, and the retry policy every provider adapter runs under.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod error;
pub mod retry;
pub mod types;

pub use error::{ErrorKind, ProviderError, RawFailure, classify};
pub use retry::{RetryAttempt, RetryPolicy, retry_with, with_retries};
pub use types::{
    AspectRatio, AspectRatioError, GeneratedImage, GenerationRequest, GenerationResult, InputImage, KeyValidation,
    ProviderKind, UnknownProvider,
};
