//! Common error types shared across crates.

use thiserror::Error;

/// Result alias used throughout the field pipeline.
pub type Result<T> = std::result::Result<T, FieldError>;

/// Top-level error type for every field operation.
///
/// Variants follow the propagation policy of the pipeline:
/// - [`FieldError::Decrypt`] is the only recoverable class; the read path turns
///   it into the legacy-plaintext fallback.
/// - Everything else surfaces to the caller.
///
/// Messages never carry plaintext values or key material.
#[derive(Debug, Error)]
pub enum FieldError {
    /// Key material could not be loaded from its location.
    #[error("key load failed: {0}")]
    KeyLoad(String),

    /// Misconfiguration detected at field-definition time.
    #[error("configuration error: {0}")]
    Config(String),

    /// The stored value is not valid ciphertext for the field's keyset.
    #[error("decryption failed: {0}")]
    Decrypt(String),

    /// The stored representation would exceed the column width.
    #[error("stored value is {length} bytes, exceeding max_length {max_length}")]
    LengthExceeded { length: usize, max_length: usize },

    /// A canonical or legacy value could not be converted to the field's type.
    #[error("codec error: {0}")]
    Codec(String),

    /// The keyset refused or failed to encrypt.
    #[error("encryption failure: {0}")]
    Encrypt(String),
}

impl FieldError {
    /// Returns `true` for errors the pipeline recovers from locally.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FieldError::Decrypt(_))
    }

    /// Short machine-readable code for this error class.
    pub fn code(&self) -> &'static str {
        match self {
            FieldError::KeyLoad(_) => "key_load",
            FieldError::Config(_) => "config",
            FieldError::Decrypt(_) => "decrypt",
            FieldError::LengthExceeded { .. } => "length_exceeded",
            FieldError::Codec(_) => "codec",
            FieldError::Encrypt(_) => "encrypt",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_decrypt_is_recoverable() {
        assert!(FieldError::Decrypt("x".into()).is_recoverable());
        assert!(!FieldError::KeyLoad("x".into()).is_recoverable());
        assert!(!FieldError::Config("x".into()).is_recoverable());
        assert!(!FieldError::Codec("x".into()).is_recoverable());
        assert!(!FieldError::Encrypt("x".into()).is_recoverable());
        assert!(!FieldError::LengthExceeded {
            length: 60,
            max_length: 50
        }
        .is_recoverable());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(FieldError::KeyLoad("x".into()).code(), "key_load");
        assert_eq!(
            FieldError::LengthExceeded {
                length: 1,
                max_length: 0
            }
            .code(),
            "length_exceeded"
        );
    }

    #[test]
    fn display_includes_lengths() {
        let e = FieldError::LengthExceeded {
            length: 64,
            max_length: 50,
        };
        let msg = e.to_string();
        assert!(msg.contains("64"));
        assert!(msg.contains("50"));
        assert!(msg.contains("bytes"));
    }
}
