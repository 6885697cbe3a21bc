//! Per-semantic-type conversion between typed values and canonical strings.
//!
//! Every codec produces an ASCII-only canonical string, so the encryption step
//! only ever sees ASCII bytes and the canonical form survives any text column.
//!
//! | Semantic type        | Codec             | Canonical form                      |
//! |----------------------|-------------------|-------------------------------------|
//! | `char`, `text`       | [`TextCodec`]     | backslash-escaped text              |
//! | `email`              | [`EmailCodec`]    | backslash-escaped address           |
//! | `integer`            | [`IntegerCodec`]  | decimal `i64`                       |
//! | `float`              | [`FloatCodec`]    | shortest round-trip decimal         |
//! | `date`               | [`DateCodec`]     | `YYYY-MM-DD`                        |
//! | `datetime`           | [`DateTimeCodec`] | ISO-8601, offset kept when present  |
//! | `boolean`            | [`BooleanCodec`]  | `bool:1` / `bool:0`                 |
//!
//! # Module invariants
//!
//! - `decode(encode(v)) == v` for every value in the type's domain.
//! - Error messages never contain the value being converted.

pub mod boolean;
pub mod escape;
pub mod numeric;
pub mod temporal;
pub mod text;

pub use boolean::BooleanCodec;
pub use numeric::{FloatCodec, IntegerCodec};
pub use temporal::{DateCodec, DateTimeCodec, DateTimeValue};
pub use text::{EmailAddress, EmailCodec, TextCodec};

use common::{FieldError, SemanticType};
use thiserror::Error;

/// Errors from canonical decoding or legacy parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The input is not a valid value of the semantic type.
    #[error("invalid {kind} value")]
    Invalid { kind: &'static str },

    /// A backslash escape or raw character at `position` is malformed.
    #[error("malformed escape sequence at byte {position}")]
    Escape { position: usize },

    /// Decrypted canonical bytes are not UTF-8.
    #[error("canonical bytes are not valid UTF-8")]
    NotUtf8,

    /// A stored JSON value of this shape cannot become the field's type.
    #[error("cannot read stored {found} as {kind}")]
    UnsupportedNative {
        kind: &'static str,
        found: &'static str,
    },
}

impl CodecError {
    pub(crate) fn invalid(kind: &'static str) -> Self {
        CodecError::Invalid { kind }
    }

    pub(crate) fn unsupported(kind: &'static str, value: &serde_json::Value) -> Self {
        CodecError::UnsupportedNative {
            kind,
            found: json_kind(value),
        }
    }
}

impl From<CodecError> for FieldError {
    fn from(e: CodecError) -> Self {
        FieldError::Codec(e.to_string())
    }
}

/// Conversion rules for one family of semantic types.
///
/// Codecs are stateless marker types; all operations are associated
/// functions so [`crate::field::EncryptedField`] can be generic over them.
pub trait Codec: 'static {
    /// The application-facing typed value.
    type Value: Clone + PartialEq + std::fmt::Debug + Send + Sync;

    /// Whether this codec can serve fields declared with `kind`.
    fn supports(kind: SemanticType) -> bool;

    /// Canonical ASCII-safe string for `value`. Total over the type's domain.
    fn encode(value: &Self::Value) -> String;

    /// Inverse of [`Codec::encode`], including the type's own validation.
    fn decode(canonical: &str) -> Result<Self::Value, CodecError>;

    /// The semantic type's own lenient parsing of an unencrypted stored value.
    fn parse(raw: &str) -> Result<Self::Value, CodecError>;

    /// Unencrypted storage form, as written by decrypt-only fields.
    ///
    /// `parse(to_plain(v)) == v` for every value.
    fn to_plain(value: &Self::Value) -> String {
        Self::encode(value)
    }

    /// Coerce a JSON scalar (as handed over by a storage layer) into the type.
    fn from_native(value: &serde_json::Value) -> Result<Self::Value, CodecError>;

    /// Present a typed value as JSON.
    fn to_native(value: &Self::Value) -> serde_json::Value;

    /// Whether `value` is the empty-string sentinel that is never encrypted.
    fn is_empty(_value: &Self::Value) -> bool {
        false
    }

    /// The typed value read back from an empty stored string.
    fn empty() -> Option<Self::Value> {
        None
    }
}

/// Short name of a JSON value's shape, for error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
