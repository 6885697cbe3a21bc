//! Integer and float codecs.
//!
//! Both use Rust's own formatting, which is locale-independent. Float output
//! is the shortest string that parses back to the identical `f64`.

use common::SemanticType;
use serde_json::Value;

use super::{Codec, CodecError};

/// Codec for `integer` fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCodec;

impl Codec for IntegerCodec {
    type Value = i64;

    fn supports(kind: SemanticType) -> bool {
        kind == SemanticType::Integer
    }

    fn encode(value: &i64) -> String {
        value.to_string()
    }

    fn decode(canonical: &str) -> Result<i64, CodecError> {
        canonical
            .parse()
            .map_err(|_| CodecError::invalid("integer"))
    }

    fn parse(raw: &str) -> Result<i64, CodecError> {
        Self::decode(raw.trim())
    }

    fn from_native(value: &Value) -> Result<i64, CodecError> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .ok_or_else(|| CodecError::invalid("integer")),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::String(s) => Self::parse(s),
            other => Err(CodecError::unsupported("integer", other)),
        }
    }

    fn to_native(value: &i64) -> Value {
        Value::from(*value)
    }
}

/// Codec for `float` fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatCodec;

/// Magnitudes outside this range switch to exponent notation to keep the
/// canonical form short.
const PLAIN_MIN: f64 = 1e-5;
const PLAIN_MAX: f64 = 1e16;

impl Codec for FloatCodec {
    type Value = f64;

    fn supports(kind: SemanticType) -> bool {
        kind == SemanticType::Float
    }

    fn encode(value: &f64) -> String {
        let magnitude = value.abs();
        if !value.is_finite() || *value == 0.0 || (PLAIN_MIN..PLAIN_MAX).contains(&magnitude) {
            value.to_string()
        } else {
            format!("{value:e}")
        }
    }

    fn decode(canonical: &str) -> Result<f64, CodecError> {
        canonical.parse().map_err(|_| CodecError::invalid("float"))
    }

    fn parse(raw: &str) -> Result<f64, CodecError> {
        Self::decode(raw.trim())
    }

    fn from_native(value: &Value) -> Result<f64, CodecError> {
        match value {
            Value::Number(n) => n.as_f64().ok_or_else(|| CodecError::invalid("float")),
            Value::String(s) => Self::parse(s),
            other => Err(CodecError::unsupported("float", other)),
        }
    }

    fn to_native(value: &f64) -> Value {
        serde_json::Number::from_f64(*value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(Self::encode(value)))
    }
}
