//! Vendor adapters for the Atelier generation core
//!
//! Each supported vendor implements [`Provider`] for JSON text and, where
//! the vendor can, [`ImageGeneration`]. [`Generator`] picks the adapter
//! matching a resolved key and runs the call under the shared retry policy.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod aspect;
mod generator;
mod http;
pub mod protocol;
pub mod provider;

pub use aspect::{ImageSize, SizeMatch};
pub use generator::{Generation, Generator};
pub use provider::gemini::GeminiProvider;
pub use provider::openai::OpenAiProvider;
pub use provider::openrouter::OpenRouterProvider;
pub use provider::perplexity::PerplexityProvider;
pub use provider::{ImageGeneration, Provider, ProviderCapabilities};
