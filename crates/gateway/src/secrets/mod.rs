//! Secret retrieval: the field encryption key and the database credentials.
//!
//! Secrets are JSON documents stored as `SecretString` values. In production
//! they come from AWS Secrets Manager; for local development and tests a
//! [`SecretSource::Static`] map supplies the same documents from configuration.
//!
//! # Invariants
//!
//! - Secret values are never logged. Only secret ids appear in log fields and
//!   error messages.

pub mod model;

pub use model::{DbCredentials, EncryptionKeySecret};

use std::{collections::HashMap, sync::Arc};

use aws_sdk_secretsmanager::error::DisplayErrorContext;
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::aws::AwsClients;

/// Errors produced while fetching or decoding a secret.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The secret store call itself failed.
    #[error("failed to fetch secret {id}: {message}")]
    Fetch { id: String, message: String },

    /// The secret exists but has no `SecretString` (binary secrets are not supported).
    #[error("secret {0} has no string value")]
    NotString(String),

    /// The static source has no entry for this id.
    #[error("secret {0} is not configured")]
    Missing(String),

    /// The secret string is not the expected JSON document.
    #[error("secret {id} is not valid JSON for the expected shape: {source}")]
    Parse {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Which backend [`SecretSource::connect`] should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretSourceKind {
    #[default]
    SecretsManager,
    Static,
}

/// Everything needed to locate the two secrets, shared by both binaries.
#[derive(Debug, Clone)]
pub struct SecretSettings {
    pub kind: SecretSourceKind,
    pub encryption_key_secret_id: String,
    pub db_secret_id: String,
    /// Raw JSON for the key secret; used only with [`SecretSourceKind::Static`].
    pub encryption_key_secret_json: Option<String>,
    /// Raw JSON for the DB secret; used only with [`SecretSourceKind::Static`].
    pub db_credentials_secret_json: Option<String>,
    pub secrets_manager_endpoint_url: Option<String>,
}

/// Where secrets are read from.
#[derive(Clone, Debug)]
pub enum SecretSource {
    /// AWS Secrets Manager.
    SecretsManager(aws_sdk_secretsmanager::Client),
    /// Fixed secret-id → JSON string map.
    Static(Arc<HashMap<String, String>>),
}

impl SecretSource {
    /// Build the source described by `settings`.
    pub async fn connect(settings: &SecretSettings) -> Self {
        match settings.kind {
            SecretSourceKind::SecretsManager => {
                let aws = AwsClients::init(settings.secrets_manager_endpoint_url.as_deref()).await;
                SecretSource::SecretsManager(aws.secretsmanager)
            }
            SecretSourceKind::Static => {
                let mut values = HashMap::new();
                if let Some(json) = &settings.encryption_key_secret_json {
                    values.insert(settings.encryption_key_secret_id.clone(), json.clone());
                }
                if let Some(json) = &settings.db_credentials_secret_json {
                    values.insert(settings.db_secret_id.clone(), json.clone());
                }
                SecretSource::Static(Arc::new(values))
            }
        }
    }

    /// A static source with no secrets; every fetch fails with [`SecretError::Missing`].
    pub fn empty() -> Self {
        SecretSource::Static(Arc::new(HashMap::new()))
    }

    /// A static source holding the given id → JSON pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        SecretSource::Static(Arc::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Fetch the raw secret string for `id`.
    ///
    /// # Errors
    ///
    /// See [`SecretError`].
    pub async fn fetch_string(&self, id: &str) -> Result<String, SecretError> {
        match self {
            SecretSource::SecretsManager(client) => {
                let resp = client
                    .get_secret_value()
                    .secret_id(id)
                    .send()
                    .await
                    .map_err(|e| SecretError::Fetch {
                        id: id.to_owned(),
                        message: DisplayErrorContext(&e).to_string(),
                    })?;
                debug!(secret_id = %id, "fetched secret from Secrets Manager");
                resp.secret_string()
                    .map(str::to_owned)
                    .ok_or_else(|| SecretError::NotString(id.to_owned()))
            }
            SecretSource::Static(values) => values
                .get(id)
                .cloned()
                .ok_or_else(|| SecretError::Missing(id.to_owned())),
        }
    }

    /// Fetch the secret for `id` and deserialise its JSON document.
    ///
    /// # Errors
    ///
    /// See [`SecretError`].
    pub async fn fetch_json<T: DeserializeOwned>(&self, id: &str) -> Result<T, SecretError> {
        let raw = self.fetch_string(id).await?;
        serde_json::from_str(&raw).map_err(|source| SecretError::Parse {
            id: id.to_owned(),
            source,
        })
    }
}
