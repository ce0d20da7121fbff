//! [`KeyStore`]: lazily initialised, process-lifetime cache for the field key.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use super::{fetch_key, KeyError};
use crate::crypto::KEY_LEN;
use crate::secrets::SecretSource;

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// Cloned into handler call stacks when needed. When this type is dropped, the
/// memory is overwritten with zeroes to minimise the window during which
/// plaintext key material lives in RAM.
#[derive(Clone)]
pub struct KeyBytes(Box<[u8; KEY_LEN]>);

impl KeyBytes {
    /// Copy `bytes` into a new key buffer.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] if the slice has the wrong length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != KEY_LEN {
            return Err(KeyError::InvalidLength(bytes.len()));
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for KeyBytes {
    fn drop(&mut self) {
        // Zero the key material on drop.
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for KeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("KeyBytes([REDACTED])")
    }
}

/// Process-lifetime store for the field encryption key.
///
/// The key is fetched on first use and never refreshed: rotating the key
/// means re-encrypting stored data, which is an offline operation.
#[derive(Clone, Debug)]
pub struct KeyStore {
    cell: Arc<OnceCell<KeyBytes>>,
    source: SecretSource,
    secret_id: Arc<str>,
}

impl KeyStore {
    /// Create an empty store that will fetch `secret_id` from `source` on first use.
    pub fn new(source: SecretSource, secret_id: impl Into<Arc<str>>) -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
            source,
            secret_id: secret_id.into(),
        }
    }

    /// Create a store that already holds `key`.
    pub fn preloaded(key: KeyBytes) -> Self {
        Self {
            cell: Arc::new(OnceCell::new_with(Some(key))),
            source: SecretSource::empty(),
            secret_id: Arc::from(""),
        }
    }

    /// Returns `true` once the key has been fetched.
    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    /// Borrow a clone of the key, fetching it first if this is the first call.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] if the fetch fails. Failures are not cached.
    pub async fn get(&self) -> Result<KeyBytes, KeyError> {
        let key = self
            .cell
            .get_or_try_init(|| async {
                let key = fetch_key(&self.source, &self.secret_id).await?;
                info!(secret_id = %self.secret_id, "encryption key fetched and cached");
                Ok::<_, KeyError>(key)
            })
            .await?;
        Ok(key.clone())
    }
}
