//! AES-256-GCM field encryption for PII columns.
//!
//! This module is intentionally free of AWS, database and HTTP dependencies.
//! It provides the envelope primitives ([`envelope`]) and the row-level
//! helpers that apply them to the fixed PII column list ([`row`]).
//!
//! # Envelope format
//!
//! ```text
//! base64(iv):base64(tag):base64(ciphertext)
//! ```
//!
//! Standard (padded) base64, a 12-byte IV and a 16-byte GCM tag. Values that do
//! not have exactly this shape are legacy plaintext and are read back as-is.

pub mod envelope;
pub mod row;

pub use envelope::{decrypt_or_passthrough, encrypt_value, is_envelope, CipherError, KEY_LEN};
pub use row::{decrypt_row, encrypt_row, ENCRYPTED_TABLE, PII_COLUMNS};
