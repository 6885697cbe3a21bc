//! [`AeadKeyset`]: the built-in keyset backed by a single AES-256-GCM-SIV key.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{Capability, DecryptError, KeyLoadError, Keyset, KeysetError};
use crate::crypto::{cipher, sealed_len, CipherError, SealedValue, KEY_LEN};

/// Label MAC'd under the key to derive the public fingerprint.
const FINGERPRINT_LABEL: &[u8] = b"encrypted-fields/key-fingerprint";

/// Number of MAC bytes kept in the fingerprint.
const FINGERPRINT_BYTES: usize = 6;

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// Zeroed on drop with volatile writes.
pub struct KeyMaterial(Box<[u8; KEY_LEN]>);

impl KeyMaterial {
    /// Copy `bytes` into a new key buffer.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError::InvalidKeyLength`] if the slice has the wrong length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyLoadError> {
        if bytes.len() != KEY_LEN {
            return Err(KeyLoadError::InvalidKeyLength(bytes.len()));
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl Zeroize for KeyMaterial {
    fn zeroize(&mut self) {
        self.0.as_mut_slice().zeroize();
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for KeyMaterial {}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// A loaded, immutable keyset.
#[derive(Debug)]
pub struct AeadKeyset {
    name: String,
    capability: Capability,
    fingerprint: String,
    key: KeyMaterial,
}

impl AeadKeyset {
    /// Build a keyset from validated key material.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError::InvalidKeyLength`] if the fingerprint MAC
    /// cannot be keyed (unreachable for a [`KEY_LEN`] key).
    pub fn new(
        name: impl Into<String>,
        capability: Capability,
        key: KeyMaterial,
    ) -> Result<Self, KeyLoadError> {
        let fingerprint = fingerprint(key.as_bytes())?;
        Ok(Self {
            name: name.into(),
            capability,
            fingerprint,
            key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Keyset for AeadKeyset {
    fn capability(&self) -> Capability {
        self.capability
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<String, KeysetError> {
        if !self.capability.can_encrypt() {
            return Err(KeysetError::EncryptNotPermitted {
                fingerprint: self.fingerprint.clone(),
            });
        }
        let sealed = cipher::seal(plaintext, self.key.as_bytes())?;
        Ok(sealed.to_string_repr())
    }

    fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, DecryptError> {
        let sealed: SealedValue = ciphertext.parse().map_err(|_| DecryptError::Malformed)?;
        cipher::open(&sealed, self.key.as_bytes()).map_err(|e| match e {
            CipherError::InvalidFormat => DecryptError::Malformed,
            CipherError::AeadFailure | CipherError::InvalidKeyLength => {
                DecryptError::Authentication
            }
        })
    }

    fn ciphertext_len(&self, plaintext_len: usize) -> usize {
        sealed_len(plaintext_len)
    }
}

fn fingerprint(key: &[u8]) -> Result<String, KeyLoadError> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
        .map_err(|_| KeyLoadError::InvalidKeyLength(key.len()))?;
    mac.update(FINGERPRINT_LABEL);
    let tag = mac.finalize().into_bytes();
    Ok(tag[..FINGERPRINT_BYTES]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}
