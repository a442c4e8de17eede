//! Key store backed by remote procedures on the relational backend

use std::time::Duration;

use async_trait::async_trait;
use atelier_config::KeyStoreConfig;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use url::Url;

use crate::KeyError;
use crate::store::{KeyStore, StoredKey};

/// Procedure returning the caller's saved key
const GET_PROCEDURE: &str = "rpc/get_user_api_key";
/// Procedure saving or clearing the caller's key
const SET_PROCEDURE: &str = "rpc/set_user_api_key";

/// Key store backed by two remote procedures on the relational backend
#[derive(Clone)]
pub struct RpcKeyStore {
    http: reqwest::Client,
    base_url: Url,
    project_key: SecretString,
    access_token: Option<SecretString>,
}

impl RpcKeyStore {
    /// Create a store client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: Url, project_key: SecretString) -> Result<Self, KeyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            project_key,
            access_token: None,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(config: &KeyStoreConfig) -> Result<Self, KeyError> {
        Self::new(config.url.clone(), config.api_key.clone())
    }

    /// Call procedures as an authenticated user instead of the project
    #[must_use]
    pub fn with_access_token(mut self, token: SecretString) -> Self {
        self.access_token = Some(token);
        self
    }

    async fn call(&self, procedure: &str, body: &Value) -> Result<Value, KeyError> {
        let url = self.base_url.join(procedure).map_err(|e| KeyError::Api {
            status: 0,
            message: format!("invalid URL: {e}"),
        })?;

        let bearer = self.access_token.as_ref().unwrap_or(&self.project_key);

        let response = self
            .http
            .post(url)
            .header("apikey", self.project_key.expose_secret())
            .bearer_auth(bearer.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(procedure, status = %status, "key store call failed");
            return Err(KeyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| KeyError::InvalidRecord(e.to_string()))
    }
}

#[async_trait]
impl KeyStore for RpcKeyStore {
    async fn get_key(&self, user_id: &str) -> Result<Option<StoredKey>, KeyError> {
        let value = self.call(GET_PROCEDURE, &json!({ "p_user_id": user_id })).await?;
        parse_record(value)
    }

    async fn set_key(&self, user_id: &str, key: Option<StoredKey>) -> Result<(), KeyError> {
        let body = match &key {
            Some(key) => json!({
                "p_user_id": user_id,
                "p_provider": key.provider,
                "p_api_key": key.api_key.expose_secret(),
            }),
            None => json!({
                "p_user_id": user_id,
                "p_provider": null,
                "p_api_key": null,
            }),
        };

        self.call(SET_PROCEDURE, &body).await?;

        tracing::debug!(user_id, cleared = key.is_none(), "saved user key");
        Ok(())
    }
}

/// Set-returning procedures answer with an array of rows, scalar ones with
/// a single object; no row or a null key means nothing is saved.
fn parse_record(value: Value) -> Result<Option<StoredKey>, KeyError> {
    let row = match value {
        Value::Null => return Ok(None),
        Value::Array(rows) => match rows.into_iter().next() {
            Some(row) => row,
            None => return Ok(None),
        },
        other => other,
    };

    if row.get("api_key").is_none_or(Value::is_null) {
        return Ok(None);
    }

    serde_json::from_value(row)
        .map(Some)
        .map_err(|e| KeyError::InvalidRecord(e.to_string()))
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
