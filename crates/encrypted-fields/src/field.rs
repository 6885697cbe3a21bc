//! The field transform engine: encrypt-on-write and decrypt-on-read.
//!
//! # Write path ([`EncryptedField::to_stored`])
//!
//! 1. Null and the empty-string sentinel pass through untouched.
//! 2. Decrypt-only fields store the plain form and never encrypt.
//! 3. Canonicalise, encrypt, prepend the prefix.
//! 4. Reject results longer than `max_length` when enforcement is on.
//!
//! # Read path ([`EncryptedField::from_stored`])
//!
//! 1. Null passes through; an empty string reads as the codec's empty value.
//! 2. Strip the prefix if present and try to decrypt.
//! 3. On success decode the canonical string. A decode failure here is fatal:
//!    the key matched, so the payload itself is corrupt.
//! 4. On decrypt failure the ORIGINAL stored string is treated as legacy
//!    plaintext and handed to the codec's own parser. Corrupted ciphertext
//!    therefore reads as plaintext rather than failing.

use std::{fmt, marker::PhantomData, sync::Arc};

use common::{FieldError, FieldSpec, Result, SemanticType};
use serde_json::Value;
use tracing::{debug, warn};

use crate::codec::{Codec, CodecError};
use crate::keyset::Keyset;

/// Per-field policy flags, resolved once at definition time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPolicy {
    /// Static tag prepended to stored ciphertext.
    pub prefix: Option<String>,
    /// Never encrypt on write.
    pub decrypt_only: bool,
    /// Fail writes whose stored form exceeds `max_length`.
    pub enforce_max_length: bool,
    /// Column width in bytes.
    pub max_length: Option<usize>,
}

impl FieldPolicy {
    /// Derive the policy for `spec`. `enforce_globally` is OR-ed with the
    /// field's own `enforce_max_length`.
    pub fn from_spec(spec: &FieldSpec, enforce_globally: bool) -> Self {
        Self {
            prefix: spec.effective_prefix().map(str::to_owned),
            decrypt_only: spec.decrypt_only,
            enforce_max_length: enforce_globally || spec.enforce_max_length,
            max_length: spec.max_length,
        }
    }

    fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref().filter(|p| !p.is_empty())
    }

    /// The active width limit, if enforcement applies.
    pub fn length_limit(&self) -> Option<usize> {
        if self.enforce_max_length {
            self.max_length
        } else {
            None
        }
    }
}

/// A field whose values of type `C::Value` are stored encrypted.
pub struct EncryptedField<C: Codec> {
    name: String,
    kind: SemanticType,
    keyset: Arc<dyn Keyset>,
    policy: FieldPolicy,
    _codec: PhantomData<fn() -> C>,
}

impl<C: Codec> EncryptedField<C> {
    /// Bind a codec, keyset and policy into a field.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Config`] if the codec cannot serve `kind`, or if
    /// a field that may encrypt is bound to a decrypt-only keyset.
    pub fn new(
        name: impl Into<String>,
        kind: SemanticType,
        keyset: Arc<dyn Keyset>,
        policy: FieldPolicy,
    ) -> Result<Self> {
        let name = name.into();
        if !C::supports(kind) {
            return Err(FieldError::Config(format!(
                "field {name}: codec does not support type {kind}"
            )));
        }
        if !policy.decrypt_only && !keyset.capability().can_encrypt() {
            return Err(FieldError::Config(format!(
                "field {name}: keyset {} is decrypt-only but the field encrypts on write",
                keyset.fingerprint()
            )));
        }
        Ok(Self {
            name,
            kind,
            keyset,
            policy,
            _codec: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SemanticType {
        self.kind
    }

    pub fn policy(&self) -> &FieldPolicy {
        &self.policy
    }

    /// Transform a plaintext value into its stored representation.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Encrypt`] if the keyset fails and
    /// [`FieldError::LengthExceeded`] if the result is wider than an enforced
    /// `max_length`. The value is never truncated.
    pub fn to_stored(&self, value: Option<&C::Value>) -> Result<Option<String>> {
        let Some(value) = value else {
            return Ok(None);
        };
        if C::is_empty(value) {
            return Ok(Some(String::new()));
        }
        if self.policy.decrypt_only {
            return Ok(Some(C::to_plain(value)));
        }

        let canonical = C::encode(value);
        let ciphertext = self.keyset.encrypt(canonical.as_bytes())?;
        let stored = match self.policy.prefix() {
            Some(prefix) => format!("{prefix}{ciphertext}"),
            None => ciphertext,
        };

        if let Some(max_length) = self.policy.length_limit() {
            let length = stored.len();
            if length > max_length {
                warn!(
                    field = %self.name,
                    length,
                    max_length,
                    "encrypted value exceeds column width"
                );
                return Err(FieldError::LengthExceeded { length, max_length });
            }
        }
        Ok(Some(stored))
    }

    /// Transform a stored text value back into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Codec`] if a successfully decrypted payload does
    /// not decode, or if legacy plaintext does not parse as the field's type.
    /// Decryption failures are never returned.
    pub fn from_stored(&self, stored: Option<&str>) -> Result<Option<C::Value>> {
        let Some(stored) = stored else {
            return Ok(None);
        };
        if stored.is_empty() {
            return Ok(C::empty());
        }

        let candidate = self
            .policy
            .prefix()
            .and_then(|prefix| stored.strip_prefix(prefix))
            .unwrap_or(stored);

        match self.keyset.decrypt(candidate) {
            Ok(bytes) => {
                let canonical = String::from_utf8(bytes).map_err(|_| CodecError::NotUtf8)?;
                Ok(Some(C::decode(&canonical)?))
            }
            Err(reason) => {
                debug!(
                    field = %self.name,
                    reason = %reason,
                    "value is not ciphertext for this keyset; reading as legacy plaintext"
                );
                Ok(Some(C::parse(stored)?))
            }
        }
    }

    /// Read a stored JSON value. Text goes through [`Self::from_stored`];
    /// other scalars are coerced by the codec without decryption.
    ///
    /// # Errors
    ///
    /// As [`Self::from_stored`], plus [`FieldError::Codec`] for JSON values the
    /// codec cannot coerce.
    pub fn from_native(&self, stored: &Value) -> Result<Option<C::Value>> {
        match stored {
            Value::Null => Ok(None),
            Value::String(s) => self.from_stored(Some(s)),
            other => Ok(Some(C::from_native(other)?)),
        }
    }

    /// Column width in bytes needed to store a value whose canonical form is
    /// `plaintext_len` bytes long.
    pub fn required_width(&self, plaintext_len: usize) -> usize {
        let prefix_len = self.policy.prefix().map_or(0, str::len);
        prefix_len + self.keyset.ciphertext_len(plaintext_len)
    }

    /// Column width needed to store `value`.
    pub fn required_width_for(&self, value: &C::Value) -> usize {
        self.required_width(C::encode(value).len())
    }
}

impl<C: Codec> fmt::Debug for EncryptedField<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedField")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("keyset", &self.keyset.fingerprint())
            .field("policy", &self.policy)
            .finish()
    }
}
