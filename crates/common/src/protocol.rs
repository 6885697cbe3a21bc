//! Field declaration types.
//!
//! These types describe how a record's field is encrypted. They are plain
//! serde types so declarations can live in JSON documents, configuration files,
//! or be built in code.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Semantic type
// ---------------------------------------------------------------------------

/// The semantic type of an encrypted field's plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    /// Bounded text (typically backed by a `VARCHAR(n)` column).
    Char,
    /// Unbounded text.
    Text,
    /// Date and time, with or without a UTC offset.
    DateTime,
    /// Signed 64-bit integer.
    Integer,
    /// Calendar date.
    Date,
    /// 64-bit float.
    Float,
    /// Email address.
    Email,
    /// Boolean.
    Boolean,
}

impl SemanticType {
    /// Lowercase name as used in declarations.
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Char => "char",
            SemanticType::Text => "text",
            SemanticType::DateTime => "datetime",
            SemanticType::Integer => "integer",
            SemanticType::Date => "date",
            SemanticType::Float => "float",
            SemanticType::Email => "email",
            SemanticType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Field declaration
// ---------------------------------------------------------------------------

/// Per-field encryption declaration.
///
/// `name` is a dot-notation path inside a record (`"ssn"`,
/// `"user.address.zip"`, `"orders[].card_number"`). Every other attribute is
/// optional and defaults to "off".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field path within a record.
    pub name: String,

    /// Semantic type of the plaintext.
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,

    /// Named key under the configured key root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,

    /// Static tag prepended to stored ciphertext.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Never encrypt on write; only decrypt (or pass through) on read.
    #[serde(default)]
    pub decrypt_only: bool,

    /// Fail writes whose stored form exceeds `max_length`.
    #[serde(default)]
    pub enforce_max_length: bool,

    /// Column width in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Name of a custom key source registered with the resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyset_source: Option<String>,
}

impl FieldSpec {
    /// Construct a declaration with every optional attribute off.
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            key_name: None,
            prefix: None,
            decrypt_only: false,
            enforce_max_length: false,
            max_length: None,
            keyset_source: None,
        }
    }

    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn enforcing_max_length(mut self) -> Self {
        self.enforce_max_length = true;
        self
    }

    pub fn decrypt_only(mut self) -> Self {
        self.decrypt_only = true;
        self
    }

    pub fn with_keyset_source(mut self, source: impl Into<String>) -> Self {
        self.keyset_source = Some(source.into());
        self
    }

    /// The configured prefix, treating an empty string as absent.
    pub fn effective_prefix(&self) -> Option<&str> {
        self.prefix.as_deref().filter(|p| !p.is_empty())
    }
}
