//! Boolean codec.
//!
//! The canonical form is tagged (`bool:1` / `bool:0`) so it can never be
//! mistaken for a plaintext truthy token such as `True`, `true` or `1`.

use common::SemanticType;
use serde_json::Value;

use super::{Codec, CodecError};

const CANONICAL_TRUE: &str = "bool:1";
const CANONICAL_FALSE: &str = "bool:0";

const TRUTHY: &[&str] = &["t", "true", "1", "yes", "y", "on"];
const FALSY: &[&str] = &["f", "false", "0", "no", "n", "off"];

/// Codec for `boolean` fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanCodec;

impl Codec for BooleanCodec {
    type Value = bool;

    fn supports(kind: SemanticType) -> bool {
        kind == SemanticType::Boolean
    }

    fn encode(value: &bool) -> String {
        let canonical = if *value { CANONICAL_TRUE } else { CANONICAL_FALSE };
        canonical.to_owned()
    }

    fn decode(canonical: &str) -> Result<bool, CodecError> {
        match canonical {
            CANONICAL_TRUE => Ok(true),
            CANONICAL_FALSE => Ok(false),
            _ => Err(CodecError::invalid("boolean")),
        }
    }

    fn parse(raw: &str) -> Result<bool, CodecError> {
        let token = raw.trim().to_ascii_lowercase();
        if TRUTHY.contains(&token.as_str()) {
            Ok(true)
        } else if FALSY.contains(&token.as_str()) {
            Ok(false)
        } else {
            Err(CodecError::invalid("boolean"))
        }
    }

    fn to_plain(value: &bool) -> String {
        value.to_string()
    }

    fn from_native(value: &Value) -> Result<bool, CodecError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Ok(true),
                Some(0) => Ok(false),
                _ => Err(CodecError::invalid("boolean")),
            },
            Value::String(s) => Self::parse(s),
            other => Err(CodecError::unsupported("boolean", other)),
        }
    }

    fn to_native(value: &bool) -> Value {
        Value::Bool(*value)
    }
}
