use std::path::Path;

use atelier_core::ProviderKind;
use secrecy::ExposeSecret;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, expansion fails,
    /// TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if the default provider is missing or keyless,
    /// a duration does not parse, or a provider is given a capability
    /// it does not have
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("no providers configured, add at least one [providers.<name>] section");
        }

        self.validate_default_provider()?;
        self.validate_providers()?;
        self.retry.policy()?;
        Ok(())
    }

    /// The Default key source needs a provider with a bundled key
    fn validate_default_provider(&self) -> anyhow::Result<()> {
        let kind = self.generation.default_provider;

        let Some(provider) = self.providers.get(kind) else {
            anyhow::bail!("default provider '{kind}' has no [providers.{kind}] section");
        };

        let has_key = provider
            .api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().trim().is_empty());

        if !has_key {
            anyhow::bail!("providers.{kind}.api_key must be set, it is the bundled default key");
        }

        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        for (kind, provider) in self.providers.iter() {
            provider
                .timeout()
                .map_err(|e| anyhow::anyhow!("providers.{kind}: {e}"))?;

            if kind == ProviderKind::Perplexity && provider.image_model.is_some() {
                anyhow::bail!("providers.perplexity.image_model is not supported, Perplexity cannot generate images");
            }
        }

        Ok(())
    }
}
