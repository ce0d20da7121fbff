//! Field encryption key: fetch, decode, and process-lifetime caching.
//!
//! # Lifecycle
//!
//! 1. The first request that touches an encrypted table calls [`KeyStore::get`].
//! 2. The key secret (`{"key": "<64 hex chars>"}`) is fetched from the
//!    [`SecretSource`] and hex-decoded into a [`KeyBytes`].
//! 3. The key is cached for the rest of the process; later calls never hit the
//!    secret store. Concurrent first callers share one fetch.
//!
//! # Security invariants
//!
//! - The plaintext key is **never** written to disk, logged, or included in traces.
//! - A failed fetch is not cached; the next request tries again.

pub mod store;

pub use store::{KeyBytes, KeyStore};

use thiserror::Error;

use crate::crypto::KEY_LEN;
use crate::secrets::{EncryptionKeySecret, SecretError, SecretSource};

/// Errors produced by the key layer.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key secret could not be fetched or parsed.
    #[error(transparent)]
    Secret(#[from] SecretError),

    /// The `key` field is not valid hex.
    #[error("encryption key is not valid hex")]
    InvalidHex,

    /// The decoded key material has an unexpected length.
    #[error("encryption key has invalid length: expected {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Decode a hex-encoded key into [`KeyBytes`].
///
/// # Errors
///
/// Returns [`KeyError::InvalidHex`] or [`KeyError::InvalidLength`].
pub fn parse_hex_key(hex_key: &str) -> Result<KeyBytes, KeyError> {
    let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidHex)?;
    KeyBytes::from_slice(&bytes)
}

/// Fetch the key secret named `secret_id` from `source` and decode it.
///
/// # Errors
///
/// Returns an error if the secret cannot be fetched, is not the expected JSON
/// shape, or does not decode to exactly [`KEY_LEN`] bytes.
pub async fn fetch_key(source: &SecretSource, secret_id: &str) -> Result<KeyBytes, KeyError> {
    let secret: EncryptionKeySecret = source.fetch_json(secret_id).await?;
    parse_hex_key(&secret.key)
}
