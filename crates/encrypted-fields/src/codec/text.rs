//! Text, char and email codecs.

use std::fmt;

use common::SemanticType;
use serde_json::Value;

use super::{
    escape::{escape, unescape},
    Codec, CodecError,
};

/// Codec for `char` and `text` fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    type Value = String;

    fn supports(kind: SemanticType) -> bool {
        matches!(kind, SemanticType::Char | SemanticType::Text)
    }

    fn encode(value: &String) -> String {
        escape(value)
    }

    fn decode(canonical: &str) -> Result<String, CodecError> {
        unescape(canonical)
    }

    fn parse(raw: &str) -> Result<String, CodecError> {
        Ok(raw.to_owned())
    }

    fn to_plain(value: &String) -> String {
        value.clone()
    }

    fn from_native(value: &Value) -> Result<String, CodecError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(CodecError::unsupported("text", other)),
        }
    }

    fn to_native(value: &String) -> Value {
        Value::String(value.clone())
    }

    fn is_empty(value: &String) -> bool {
        value.is_empty()
    }

    fn empty() -> Option<String> {
        Some(String::new())
    }
}

/// A syntactically plausible email address.
///
/// Validation is shallow: exactly one `@` separating a non-empty
/// local part from a non-empty domain, and no whitespace or control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate and wrap an address. Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Invalid`] if the address is malformed.
    pub fn parse(raw: &str) -> Result<Self, CodecError> {
        let addr = raw.trim();
        let (local, domain) = addr
            .split_once('@')
            .ok_or_else(|| CodecError::invalid("email"))?;
        let well_formed = !local.is_empty()
            && !domain.is_empty()
            && !domain.contains('@')
            && !addr.chars().any(|c| c.is_whitespace() || c.is_control());
        if !well_formed {
            return Err(CodecError::invalid("email"));
        }
        Ok(Self(addr.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn domain(&self) -> &str {
        self.0.split_once('@').map(|(_, d)| d).unwrap_or_default()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for EmailAddress {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Codec for `email` fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailCodec;

impl Codec for EmailCodec {
    type Value = EmailAddress;

    fn supports(kind: SemanticType) -> bool {
        kind == SemanticType::Email
    }

    fn encode(value: &EmailAddress) -> String {
        escape(value.as_str())
    }

    fn decode(canonical: &str) -> Result<EmailAddress, CodecError> {
        EmailAddress::parse(&unescape(canonical)?)
    }

    fn parse(raw: &str) -> Result<EmailAddress, CodecError> {
        EmailAddress::parse(raw)
    }

    fn to_plain(value: &EmailAddress) -> String {
        value.as_str().to_owned()
    }

    fn from_native(value: &Value) -> Result<EmailAddress, CodecError> {
        match value {
            Value::String(s) => EmailAddress::parse(s),
            other => Err(CodecError::unsupported("email", other)),
        }
    }

    fn to_native(value: &EmailAddress) -> Value {
        Value::String(value.as_str().to_owned())
    }
}
