//! Per-session key source selection

use atelier_config::Config;
use atelier_core::ProviderKind;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::KeyError;
use crate::store::{KeyStore, StoredKey};

/// Where the key for a call comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeySource {
    /// Bundled key shared by everyone; output carries a usage marker
    Default,
    /// Key supplied by the signed-in user
    Custom,
}

/// Key, provider, and source captured at the start of a call
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    pub provider: ProviderKind,
    pub api_key: SecretString,
    pub source: ApiKeySource,
}

impl ResolvedKey {
    pub const fn requires_usage_marker(&self) -> bool {
        matches!(self.source, ApiKeySource::Default)
    }
}

struct CustomKey {
    user_id: String,
    key: StoredKey,
}

/// Session-scoped key selection
///
/// Holds the bundled default and at most one user key. Calls read it once
/// through [`KeySession::resolve`]; switching sources only affects calls
/// that resolve afterwards.
pub struct KeySession {
    default: ResolvedKey,
    custom: Option<CustomKey>,
}

impl KeySession {
    pub const fn new(provider: ProviderKind, api_key: SecretString) -> Self {
        Self {
            default: ResolvedKey {
                provider,
                api_key,
                source: ApiKeySource::Default,
            },
            custom: None,
        }
    }

    /// Start on the Default source using the configured bundled key
    ///
    /// # Errors
    ///
    /// Returns an error if the default provider has no bundled key
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = config.generation.default_provider;
        let api_key = config
            .providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .ok_or_else(|| anyhow::anyhow!("no bundled key configured for default provider '{provider}'"))?;

        Ok(Self::new(provider, api_key))
    }

    pub const fn source(&self) -> ApiKeySource {
        match self.custom {
            Some(_) => ApiKeySource::Custom,
            None => ApiKeySource::Default,
        }
    }

    /// User whose key is active, if any
    pub fn active_user(&self) -> Option<&str> {
        self.custom.as_ref().map(|custom| custom.user_id.as_str())
    }

    /// Snapshot of the active key for one call
    pub fn resolve(&self) -> ResolvedKey {
        match &self.custom {
            Some(custom) => ResolvedKey {
                provider: custom.key.provider,
                api_key: custom.key.api_key.clone(),
                source: ApiKeySource::Custom,
            },
            None => self.default.clone(),
        }
    }

    /// Switch to the bundled key, dropping any user key from memory
    pub fn use_default(&mut self) {
        if let Some(custom) = self.custom.take() {
            tracing::info!(user_id = %custom.user_id, "switched to default key source");
        }
    }

    /// Switch to the user's saved key
    ///
    /// The session is left unchanged if the user has no saved key.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::NotFound` if nothing is saved, or the store error
    pub async fn use_custom(&mut self, store: &dyn KeyStore, user_id: &str) -> Result<(), KeyError> {
        let key = store.get_key(user_id).await?.ok_or(KeyError::NotFound)?;

        tracing::info!(user_id, provider = %key.provider, "switched to custom key source");

        self.custom = Some(CustomKey {
            user_id: user_id.to_owned(),
            key,
        });
        Ok(())
    }

    /// Persist a user key and make it active
    ///
    /// # Errors
    ///
    /// Returns `KeyError::EmptyKey` for a blank key, or the store error
    pub async fn save_custom(
        &mut self,
        store: &dyn KeyStore,
        user_id: &str,
        provider: ProviderKind,
        api_key: SecretString,
    ) -> Result<(), KeyError> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(KeyError::EmptyKey);
        }

        let key = StoredKey::new(provider, api_key);
        store.set_key(user_id, Some(key.clone())).await?;

        self.custom = Some(CustomKey {
            user_id: user_id.to_owned(),
            key,
        });
        Ok(())
    }

    /// Delete the user's saved key and fall back to the bundled one
    ///
    /// # Errors
    ///
    /// Returns the store error; the session is unchanged in that case
    pub async fn clear_custom(&mut self, store: &dyn KeyStore, user_id: &str) -> Result<(), KeyError> {
        store.set_key(user_id, None).await?;

        if self.active_user() == Some(user_id) {
            self.use_default();
        }
        Ok(())
    }
}
