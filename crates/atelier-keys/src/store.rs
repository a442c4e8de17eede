//! Storage of user-supplied API keys

use async_trait::async_trait;
use atelier_core::ProviderKind;
use dashmap::DashMap;
use secrecy::SecretString;
use serde::Deserialize;

use crate::KeyError;

/// A user-supplied key as persisted by the store
#[derive(Debug, Clone, Deserialize)]
pub struct StoredKey {
    /// Provider the key belongs to
    pub provider: ProviderKind,
    /// Decrypted key
    pub api_key: SecretString,
}

impl StoredKey {
    pub const fn new(provider: ProviderKind, api_key: SecretString) -> Self {
        Self { provider, api_key }
    }
}

/// Persistence for per-user API keys
///
/// Encryption at rest is the backend's concern; implementations only see
/// decrypted values.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Fetch the saved key for a user
    async fn get_key(&self, user_id: &str) -> Result<Option<StoredKey>, KeyError>;

    /// Save a key for a user, or delete it with `None`
    async fn set_key(&self, user_id: &str, key: Option<StoredKey>) -> Result<(), KeyError>;
}

/// In-process key store for tests and local runs
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: DashMap<String, StoredKey>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get_key(&self, user_id: &str) -> Result<Option<StoredKey>, KeyError> {
        Ok(self.keys.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn set_key(&self, user_id: &str, key: Option<StoredKey>) -> Result<(), KeyError> {
        match key {
            Some(key) => {
                self.keys.insert(user_id.to_owned(), key);
            }
            None => {
                self.keys.remove(user_id);
            }
        }
        Ok(())
    }
}
