//! AES-256-GCM encryption and decryption of individual string fields.
//!
//! Every call to [`seal`] draws a fresh random IV, so encrypting the same
//! plaintext twice yields two different envelopes. GCM nonce reuse under one
//! key breaks both confidentiality and authentication; never pass a caller
//! supplied IV in here.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Nonce, Tag,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tracing::debug;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of the GCM IV (12 bytes = 96 bits).
pub const IV_LEN: usize = 12;

/// Byte length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

const SEPARATOR: char = ':';

/// A parsed, encrypted field value.
///
/// The string representation is `base64(iv):base64(tag):base64(ciphertext)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Raw IV bytes.
    pub iv: [u8; IV_LEN],
    /// Detached authentication tag.
    pub tag: [u8; TAG_LEN],
    /// Raw ciphertext bytes, same length as the plaintext.
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encode this value to its stored string representation.
    pub fn to_string_repr(&self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            STANDARD.encode(self.iv),
            STANDARD.encode(self.tag),
            STANDARD.encode(&self.ciphertext),
        )
    }

    /// Parse a stored string back into an [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`DecryptError::NotEnvelope`] unless the string has exactly three
    /// `:`-separated base64 segments with a 12-byte IV and a 16-byte tag.
    pub fn parse(s: &str) -> Result<Self, DecryptError> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(DecryptError::NotEnvelope);
        }
        let iv = decode_fixed::<IV_LEN>(parts[0])?;
        let tag = decode_fixed::<TAG_LEN>(parts[1])?;
        let ciphertext = STANDARD
            .decode(parts[2])
            .map_err(|_| DecryptError::NotEnvelope)?;
        Ok(Self {
            iv,
            tag,
            ciphertext,
        })
    }
}

fn decode_fixed<const N: usize>(segment: &str) -> Result<[u8; N], DecryptError> {
    let bytes = STANDARD
        .decode(segment)
        .map_err(|_| DecryptError::NotEnvelope)?;
    bytes.try_into().map_err(|_| DecryptError::NotEnvelope)
}

/// Errors produced by the cipher layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid encryption key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    /// AES-GCM encryption or decryption failed.
    #[error("aead operation failed")]
    AeadFailure,
}

/// Why a stored value could not be opened.
///
/// Never reaches an HTTP caller: [`decrypt_or_passthrough`] maps every variant
/// to "return the stored value unchanged".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptError {
    /// The value is not envelope-shaped; it is legacy plaintext.
    #[error("value is not an encrypted envelope")]
    NotEnvelope,

    /// The envelope is well-formed but failed authentication.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// Authentication passed but the plaintext is not UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8,
}

/// Encrypt raw bytes under `key` with a fresh random IV.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CipherError::AeadFailure`] on an internal AEAD error.
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<Envelope, CipherError> {
    let cipher = build_cipher(key)?;

    use aes_gcm::aead::rand_core::RngCore;
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| CipherError::AeadFailure)?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(Envelope {
        iv,
        tag: tag_bytes,
        ciphertext: buffer,
    })
}

/// Decrypt an [`Envelope`] back to plaintext bytes.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CipherError::AeadFailure`] if authentication fails (wrong key or tampered data).
pub fn open(envelope: &Envelope, key: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    let mut buffer = envelope.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&envelope.iv),
            b"",
            &mut buffer,
            Tag::from_slice(&envelope.tag),
        )
        .map_err(|_| CipherError::AeadFailure)?;
    Ok(buffer)
}

/// Encrypt a string field into its stored envelope form.
///
/// The empty string is returned unchanged; only non-empty values are encrypted.
pub fn encrypt_value(plaintext: &str, key: &[u8]) -> Result<String, CipherError> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }
    Ok(seal(plaintext.as_bytes(), key)?.to_string_repr())
}

/// Decrypt a stored field value.
///
/// The empty string decrypts to itself.
///
/// # Errors
///
/// See [`DecryptError`]; each variant means the caller should fall back to
/// the stored value.
pub fn decrypt_value(stored: &str, key: &[u8]) -> Result<String, DecryptError> {
    if stored.is_empty() {
        return Ok(String::new());
    }
    let envelope = Envelope::parse(stored)?;
    let plaintext = open(&envelope, key)?;
    String::from_utf8(plaintext).map_err(|_| DecryptError::InvalidUtf8)
}

/// Decrypt a stored field value, returning it unchanged if it cannot be opened.
///
/// A single corrupt or legacy value must never fail a whole read.
pub fn decrypt_or_passthrough(stored: &str, key: &[u8]) -> String {
    match decrypt_value(stored, key) {
        Ok(plaintext) => plaintext,
        Err(DecryptError::NotEnvelope) => stored.to_owned(),
        Err(e) => {
            debug!(error = %e, "stored envelope could not be opened; returning it unchanged");
            stored.to_owned()
        }
    }
}

/// Returns `true` if `value` parses as an envelope (it may still fail to open).
pub fn is_envelope(value: &str) -> bool {
    Envelope::parse(value).is_ok()
}

fn build_cipher(key: &[u8]) -> Result<Aes256Gcm, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength);
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> Vec<u8> {
        use aes_gcm::aead::rand_core::RngCore;
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = random_key();
        let stored = encrypt_value("peanut allergy", &key).unwrap();
        assert_eq!(decrypt_value(&stored, &key).unwrap(), "peanut allergy");
    }

    #[test]
    fn envelope_has_three_segments_with_fixed_lengths() {
        let key = random_key();
        let stored = encrypt_value("555-0100", &key).unwrap();
        let parts: Vec<&str> = stored.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(STANDARD.decode(parts[0]).unwrap().len(), IV_LEN);
        assert_eq!(STANDARD.decode(parts[1]).unwrap().len(), TAG_LEN);
        assert_eq!(STANDARD.decode(parts[2]).unwrap().len(), "555-0100".len());
    }

    #[test]
    fn same_plaintext_gives_different_envelopes() {
        let key = random_key();
        let a = encrypt_value("jane@example.com", &key).unwrap();
        let b = encrypt_value("jane@example.com", &key).unwrap();
        assert_ne!(a, b);
        assert_eq!(decrypt_value(&a, &key).unwrap(), "jane@example.com");
        assert_eq!(decrypt_value(&b, &key).unwrap(), "jane@example.com");
    }

    #[test]
    fn multibyte_utf8_round_trips() {
        let key = random_key();
        let text = "Zoë – allergie aux arachides 🥜";
        let stored = encrypt_value(text, &key).unwrap();
        assert_eq!(decrypt_or_passthrough(&stored, &key), text);
    }

    #[test]
    fn empty_string_is_not_encrypted() {
        let key = random_key();
        assert_eq!(encrypt_value("", &key).unwrap(), "");
        assert_eq!(decrypt_value("", &key).unwrap(), "");
    }

    #[test]
    fn wrong_key_returns_envelope_unchanged() {
        let right = random_key();
        let wrong = random_key();
        let stored = encrypt_value("peanut allergy", &right).unwrap();
        assert_eq!(
            decrypt_value(&stored, &wrong),
            Err(DecryptError::Cipher(CipherError::AeadFailure))
        );
        assert_eq!(decrypt_or_passthrough(&stored, &wrong), stored);
    }

    #[test]
    fn plaintext_without_separators_passes_through() {
        let key = random_key();
        assert_eq!(decrypt_or_passthrough("peanut allergy", &key), "peanut allergy");
    }

    #[test]
    fn wrong_segment_count_passes_through() {
        let key = random_key();
        for legacy in ["a:b", "10:30:00:00", "Mom: 555-0100"] {
            assert_eq!(decrypt_value(legacy, &key), Err(DecryptError::NotEnvelope));
            assert_eq!(decrypt_or_passthrough(legacy, &key), legacy);
        }
    }

    #[test]
    fn time_like_value_passes_through() {
        // Three segments but not base64 of the right lengths.
        let key = random_key();
        assert_eq!(decrypt_or_passthrough("07:30:00", &key), "07:30:00");
    }

    #[test]
    fn wrong_iv_length_passes_through() {
        let key = random_key();
        let short_iv = format!(
            "{}:{}:{}",
            STANDARD.encode([0u8; 8]),
            STANDARD.encode([0u8; TAG_LEN]),
            STANDARD.encode(b"abc"),
        );
        assert_eq!(decrypt_value(&short_iv, &key), Err(DecryptError::NotEnvelope));
        assert_eq!(decrypt_or_passthrough(&short_iv, &key), short_iv);
    }

    #[test]
    fn wrong_tag_length_passes_through() {
        let key = random_key();
        let short_tag = format!(
            "{}:{}:{}",
            STANDARD.encode([0u8; IV_LEN]),
            STANDARD.encode([0u8; 12]),
            STANDARD.encode(b"abc"),
        );
        assert!(!is_envelope(&short_tag));
        assert_eq!(decrypt_or_passthrough(&short_tag, &key), short_tag);
    }

    #[test]
    fn tampered_ciphertext_passes_through() {
        let key = random_key();
        let mut envelope = seal(b"medical notes", &key).unwrap();
        envelope.ciphertext[0] ^= 0xFF;
        let stored = envelope.to_string_repr();
        assert!(is_envelope(&stored));
        assert_eq!(decrypt_or_passthrough(&stored, &key), stored);
    }

    #[test]
    fn parse_round_trips_repr() {
        let key = random_key();
        let envelope = seal(b"hello", &key).unwrap();
        let parsed = Envelope::parse(&envelope.to_string_repr()).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert_eq!(
            encrypt_value("x", &[0u8; 16]),
            Err(CipherError::InvalidKeyLength)
        );
    }
}
