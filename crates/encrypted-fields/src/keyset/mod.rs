//! Keyset loading and the encrypt/decrypt capability interface.
//!
//! # Lifecycle
//!
//! 1. At field-definition time the resolver asks a [`KeysetSource`] to load
//!    key material from a location (by default a `keyset.json` file on disk).
//! 2. The loaded keyset is immutable and shared as `Arc<dyn Keyset>` by every
//!    field bound to that location.
//! 3. Encrypt/decrypt calls are pure CPU work over the loaded key material and
//!    are safe to run concurrently from any number of threads.
//!
//! # Security invariants
//!
//! - Key bytes are **never** logged, printed by `Debug`, or included in errors.
//! - Only the non-secret [`Keyset::fingerprint`] may appear in logs.

pub mod aead;
pub mod cache;
pub mod file;

pub use aead::{AeadKeyset, KeyMaterial};
pub use cache::KeysetCache;
pub use file::{FileKeysetSource, KeyLoadError, KeysetFile, KeysetSource, KEYSET_FILE_NAME};

use common::FieldError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::CipherError;

/// What a loaded keyset is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Encrypt and decrypt.
    EncryptDecrypt,
    /// Decrypt only; encryption requests are refused.
    DecryptOnly,
}

impl Capability {
    pub fn can_encrypt(&self) -> bool {
        matches!(self, Capability::EncryptDecrypt)
    }
}

/// Errors from [`Keyset::encrypt`].
#[derive(Debug, Error)]
pub enum KeysetError {
    /// The keyset was loaded with [`Capability::DecryptOnly`].
    #[error("keyset {fingerprint} is decrypt-only")]
    EncryptNotPermitted { fingerprint: String },

    /// The underlying cipher rejected the key material.
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Errors from [`Keyset::decrypt`].
///
/// Every variant is a classified, tolerated outcome: the read path treats any
/// of them as "this value is not ciphertext for this key".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptError {
    /// The input is not in sealed-value format (e.g. legacy plaintext).
    #[error("value is not in sealed format")]
    Malformed,

    /// Authentication failed: wrong key or tampered data.
    #[error("authentication failed")]
    Authentication,
}

impl From<KeysetError> for FieldError {
    fn from(e: KeysetError) -> Self {
        FieldError::Encrypt(e.to_string())
    }
}

impl From<DecryptError> for FieldError {
    fn from(e: DecryptError) -> Self {
        FieldError::Decrypt(e.to_string())
    }
}

/// Symmetric encrypt/decrypt capability over loaded key material.
///
/// Implementations must be reentrant: a single instance is shared across all
/// fields and threads that resolve to the same location.
#[cfg_attr(test, mockall::automock)]
pub trait Keyset: Send + Sync {
    /// What this keyset may do.
    fn capability(&self) -> Capability;

    /// Short non-secret identifier, safe to log.
    fn fingerprint(&self) -> String;

    /// Encrypt arbitrary bytes to a text-safe ciphertext.
    fn encrypt(&self, plaintext: &[u8]) -> Result<String, KeysetError>;

    /// Decrypt a ciphertext produced by [`Keyset::encrypt`].
    fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, DecryptError>;

    /// Length of the ciphertext produced for `plaintext_len` input bytes.
    fn ciphertext_len(&self, plaintext_len: usize) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_serde_names() {
        assert_eq!(
            serde_json::to_string(&Capability::EncryptDecrypt).unwrap(),
            "\"encrypt_decrypt\""
        );
        assert_eq!(
            serde_json::from_str::<Capability>("\"decrypt_only\"").unwrap(),
            Capability::DecryptOnly
        );
    }

    #[test]
    fn decrypt_error_maps_to_recoverable_field_error() {
        let e: FieldError = DecryptError::Authentication.into();
        assert!(e.is_recoverable());
    }

    #[test]
    fn keyset_error_maps_to_encrypt() {
        let e: FieldError = KeysetError::EncryptNotPermitted {
            fingerprint: "abcd".into(),
        }
        .into();
        assert_eq!(e.code(), "encrypt");
    }
}
