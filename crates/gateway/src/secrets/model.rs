//! JSON shapes of the two secrets.

use std::fmt;

use serde::Deserialize;

/// `{"key": "<hex>"}`: the 256-bit field encryption key, hex-encoded.
#[derive(Clone, Deserialize)]
pub struct EncryptionKeySecret {
    pub key: String,
}

impl fmt::Debug for EncryptionKeySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKeySecret([REDACTED])")
    }
}

/// Database connection credentials.
#[derive(Clone, Deserialize)]
pub struct DbCredentials {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

fn default_port() -> u16 {
    5432
}

impl fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
