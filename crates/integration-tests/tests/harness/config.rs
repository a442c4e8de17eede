//! Programmatic configuration builder for integration tests

use atelier_config::{Config, KeyStoreConfig, ProviderConfig, RetryConfig};
use atelier_core::ProviderKind;
use secrecy::SecretString;

/// Bundled key every test provider is configured with
pub const BUNDLED_KEY: &str = "bundled-test-key";

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal defaults with retries fast enough for tests
    pub fn new() -> Self {
        Self {
            config: Config {
                retry: RetryConfig {
                    max_retries: 2,
                    initial_delay: "10ms".to_owned(),
                },
                ..Config::default()
            },
        }
    }

    /// Point a provider at a mock vendor
    pub fn with_provider(mut self, kind: ProviderKind, base_url: &str) -> Self {
        let provider = ProviderConfig {
            api_key: Some(SecretString::from(BUNDLED_KEY)),
            base_url: Some(base_url.parse().expect("valid URL")),
            ..ProviderConfig::default()
        };

        let slot = match kind {
            ProviderKind::Gemini => &mut self.config.providers.gemini,
            ProviderKind::OpenAi => &mut self.config.providers.openai,
            ProviderKind::OpenRouter => &mut self.config.providers.openrouter,
            ProviderKind::Perplexity => &mut self.config.providers.perplexity,
        };
        *slot = Some(provider);
        self
    }

    /// Edit the settings of an already added provider
    pub fn configure(mut self, kind: ProviderKind, edit: impl FnOnce(&mut ProviderConfig)) -> Self {
        let slot = match kind {
            ProviderKind::Gemini => self.config.providers.gemini.as_mut(),
            ProviderKind::OpenAi => self.config.providers.openai.as_mut(),
            ProviderKind::OpenRouter => self.config.providers.openrouter.as_mut(),
            ProviderKind::Perplexity => self.config.providers.perplexity.as_mut(),
        };
        edit(slot.expect("provider added before configure"));
        self
    }

    pub fn with_default_provider(mut self, kind: ProviderKind) -> Self {
        self.config.generation.default_provider = kind;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    /// Point the key store at a mock backend
    pub fn with_key_store(mut self, base_url: &str) -> Self {
        self.config.key_store = Some(KeyStoreConfig {
            url: base_url.parse().expect("valid URL"),
            api_key: SecretString::from("project-anon-key"),
        });
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
