//! Sealing of canonical field strings into column-safe text.
//!
//! A keyset hands the codec's canonical bytes to [`seal`] and stores
//! [`SealedValue::to_string_repr`] in the column. On read, the stored text is
//! parsed with [`str::parse`]; a parse failure is how legacy plaintext is told
//! apart from ciphertext, and an [`open`] failure means the wrong key.
//!
//! Nonces are random per call, so equal plaintexts store differently. The
//! cipher is AES-256-GCM-SIV, which degrades to revealing equality rather than
//! the key stream if a nonce ever repeats.
//!
//! [`sealed_len`] gives the exact stored length for column sizing.

use std::str::FromStr;

use aes_gcm_siv::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the AES-GCM-SIV authentication tag.
pub const TAG_LEN: usize = 16;

/// Marker at the start of every sealed value. It is constant text, so a
/// plaintext such as `1` always appears in its own stored form.
pub const VERSION_PREFIX: &str = "v1";

/// Nonce and authenticated ciphertext of one stored field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedValue {
    /// Raw nonce bytes.
    pub nonce: [u8; NONCE_LEN],
    /// Raw ciphertext + authentication tag bytes.
    pub ciphertext: Vec<u8>,
}

impl SealedValue {
    /// Stored text form: `v1.<nonce>.<ciphertext+tag>`, base64url without padding.
    pub fn to_string_repr(&self) -> String {
        format!(
            "{}.{}.{}",
            VERSION_PREFIX,
            URL_SAFE_NO_PAD.encode(self.nonce),
            URL_SAFE_NO_PAD.encode(&self.ciphertext),
        )
    }
}

impl FromStr for SealedValue {
    type Err = CipherError;

    /// # Errors
    ///
    /// Returns [`CipherError::InvalidFormat`] for anything that is not a
    /// well-formed `v1` value, including every legacy plaintext.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(VERSION_PREFIX)
            .and_then(|r| r.strip_prefix('.'))
            .ok_or(CipherError::InvalidFormat)?;
        let (nonce_b64, ciphertext_b64) =
            rest.split_once('.').ok_or(CipherError::InvalidFormat)?;

        let nonce: [u8; NONCE_LEN] = URL_SAFE_NO_PAD
            .decode(nonce_b64)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(CipherError::InvalidFormat)?;
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext_b64)
            .map_err(|_| CipherError::InvalidFormat)?;
        if ciphertext.len() < TAG_LEN {
            return Err(CipherError::InvalidFormat);
        }

        Ok(Self { nonce, ciphertext })
    }
}

/// Errors from sealing or opening.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    /// AES-GCM-SIV encryption or decryption failed.
    #[error("aead operation failed")]
    AeadFailure,

    /// The sealed value string does not match the expected format.
    #[error("invalid sealed value format")]
    InvalidFormat,
}

/// Seal `plaintext` under `key` with a fresh random nonce.
///
/// # Errors
///
/// [`CipherError::InvalidKeyLength`] for a key that is not [`KEY_LEN`] bytes.
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<SealedValue, CipherError> {
    let cipher = build_cipher(key)?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CipherError::AeadFailure)?;

    Ok(SealedValue {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Recover the canonical bytes of a stored value.
///
/// # Errors
///
/// [`CipherError::AeadFailure`] when the value was sealed under another key or
/// altered since.
pub fn open(sealed: &SealedValue, key: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    let nonce = Nonce::from_slice(&sealed.nonce);
    cipher
        .decrypt(nonce, sealed.ciphertext.as_ref())
        .map_err(|_| CipherError::AeadFailure)
}

/// Exact length of the string representation produced for `plaintext_len`
/// plaintext bytes.
pub fn sealed_len(plaintext_len: usize) -> usize {
    VERSION_PREFIX.len() + 1 + b64_len(NONCE_LEN) + 1 + b64_len(plaintext_len + TAG_LEN)
}

/// Length of unpadded base64 for `n` bytes.
fn b64_len(n: usize) -> usize {
    (n * 4 + 2) / 3
}

fn build_cipher(key: &[u8]) -> Result<Aes256GcmSiv, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength);
    }
    Aes256GcmSiv::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)
}
