use std::time::Duration;

use atelier_core::ProviderKind;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Per-vendor settings, one optional table per supported provider
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: Option<ProviderConfig>,
    #[serde(default)]
    pub openai: Option<ProviderConfig>,
    #[serde(default)]
    pub openrouter: Option<ProviderConfig>,
    #[serde(default)]
    pub perplexity: Option<ProviderConfig>,
}

impl ProvidersConfig {
    pub const fn get(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        match kind {
            ProviderKind::Gemini => self.gemini.as_ref(),
            ProviderKind::OpenAi => self.openai.as_ref(),
            ProviderKind::OpenRouter => self.openrouter.as_ref(),
            ProviderKind::Perplexity => self.perplexity.as_ref(),
        }
    }

    /// Configured providers in a stable order
    pub fn iter(&self) -> impl Iterator<Item = (ProviderKind, &ProviderConfig)> {
        ProviderKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|config| (kind, config)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Settings for a single provider
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Bundled default key, shared by every user on the Default source
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Model for text generation and key validation
    #[serde(default)]
    pub text_model: Option<String>,
    /// Model for image generation
    #[serde(default)]
    pub image_model: Option<String>,
    /// Site URL sent as attribution (`OpenRouter` only)
    #[serde(default)]
    pub app_url: Option<String>,
    /// App name sent as attribution (`OpenRouter` only)
    #[serde(default)]
    pub app_name: Option<String>,
    /// Per-request timeout (e.g. "90s", "2m")
    #[serde(default)]
    pub timeout: Option<String>,
}

impl ProviderConfig {
    /// Parsed request timeout, if one is set
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is not a valid duration string
    pub fn timeout(&self) -> anyhow::Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|raw| duration_str::parse(raw).map_err(|e| anyhow::anyhow!("invalid timeout '{raw}': {e}")))
            .transpose()
    }
}
