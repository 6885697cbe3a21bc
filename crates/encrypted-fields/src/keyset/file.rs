//! On-disk keyset files and the pluggable [`KeysetSource`] interface.
//!
//! A keyset location is either a directory containing [`KEYSET_FILE_NAME`] or
//! the path of such a file:
//!
//! ```json
//! {"name": "users", "capability": "encrypt_decrypt", "key": "<base64url-no-pad, 32 bytes>"}
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use aes_gcm_siv::aead::{rand_core::RngCore, OsRng};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use common::FieldError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use super::{AeadKeyset, Capability, KeyMaterial, Keyset};
use crate::crypto::KEY_LEN;

/// File name looked up when a keyset location is a directory.
pub const KEYSET_FILE_NAME: &str = "keyset.json";

/// Errors produced while loading key material.
#[derive(Debug, Error)]
pub enum KeyLoadError {
    /// Nothing exists at the location.
    #[error("no keyset found at {0}")]
    NotFound(PathBuf),

    /// The location exists but could not be read or written.
    #[error("cannot access keyset at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The keyset file is not valid JSON of the expected shape.
    #[error("malformed keyset file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The key field is not valid unpadded base64url.
    #[error("key material is not valid base64url")]
    InvalidKeyEncoding,

    /// The decoded key has an unexpected length.
    #[error("key material has invalid length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    /// A custom key source failed.
    #[error("key source {source_name} failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },
}

impl From<KeyLoadError> for FieldError {
    fn from(e: KeyLoadError) -> Self {
        FieldError::KeyLoad(e.to_string())
    }
}

/// Serialised form of a keyset.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeysetFile {
    /// Human-readable keyset name.
    pub name: String,
    /// What the keyset may be used for.
    pub capability: Capability,
    /// Key bytes, base64url without padding. Wiped on drop.
    pub key: String,
}

impl Zeroize for KeysetFile {
    fn zeroize(&mut self) {
        self.key.zeroize();
    }
}

impl Drop for KeysetFile {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl std::fmt::Debug for KeysetFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeysetFile")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl KeysetFile {
    /// Generate a fresh encrypt/decrypt keyset from the OS CSPRNG.
    pub fn generate(name: impl Into<String>) -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(key.as_mut_slice());
        let encoded = URL_SAFE_NO_PAD.encode(key.as_slice());
        Self {
            name: name.into(),
            capability: Capability::EncryptDecrypt,
            key: encoded,
        }
    }

    /// The same key restricted to decryption.
    pub fn decrypt_only(mut self) -> Self {
        self.capability = Capability::DecryptOnly;
        self
    }

    /// Read and parse the keyset file at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError::NotFound`] if nothing exists at the location,
    /// [`KeyLoadError::Io`] if it cannot be read, or
    /// [`KeyLoadError::Malformed`] if it does not parse.
    pub fn read_from(location: &Path) -> Result<Self, KeyLoadError> {
        let path = keyset_path(location);
        let bytes = fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => KeyLoadError::NotFound(path.clone()),
            _ => KeyLoadError::Io {
                path: path.clone(),
                source,
            },
        })?;
        serde_json::from_slice(&bytes).map_err(|source| KeyLoadError::Malformed { path, source })
    }

    /// Write this keyset as `<dir>/keyset.json`, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError::Io`] on any filesystem failure.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, KeyLoadError> {
        let io_err = |source| KeyLoadError::Io {
            path: dir.to_path_buf(),
            source,
        };
        fs::create_dir_all(dir).map_err(io_err)?;
        let path = dir.join(KEYSET_FILE_NAME);
        let body = serde_json::to_vec_pretty(self).map_err(|source| KeyLoadError::Malformed {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, body).map_err(io_err)?;
        Ok(path)
    }

    /// Decode the key and build a usable keyset.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLoadError::InvalidKeyEncoding`] or
    /// [`KeyLoadError::InvalidKeyLength`] for bad key material.
    pub fn into_keyset(mut self) -> Result<AeadKeyset, KeyLoadError> {
        let raw = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(self.key.trim())
                .map_err(|_| KeyLoadError::InvalidKeyEncoding)?,
        );
        let material = KeyMaterial::from_slice(&raw)?;
        AeadKeyset::new(std::mem::take(&mut self.name), self.capability, material)
    }
}

/// Resolve a location to the keyset file path it designates.
fn keyset_path(location: &Path) -> PathBuf {
    if location.is_dir() {
        location.join(KEYSET_FILE_NAME)
    } else {
        location.to_path_buf()
    }
}

/// A pluggable source of keysets.
///
/// The default is [`FileKeysetSource`]; alternative sources (a secrets
/// manager, an HSM wrapper, a test fixture) are registered on the resolver by
/// name and selected per field.
pub trait KeysetSource: Send + Sync {
    /// Load the keyset designated by `location`.
    ///
    /// Either returns a fully usable keyset or an error; never partial state.
    fn load(&self, location: &Path) -> Result<Arc<dyn Keyset>, KeyLoadError>;
}

/// Loads [`KeysetFile`]s from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileKeysetSource;

impl KeysetSource for FileKeysetSource {
    fn load(&self, location: &Path) -> Result<Arc<dyn Keyset>, KeyLoadError> {
        let keyset = KeysetFile::read_from(location)?.into_keyset()?;
        Ok(Arc::new(keyset))
    }
}
