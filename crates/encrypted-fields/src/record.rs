//! Apply field transforms across JSON records.
//!
//! A [`RecordSchema`] is built once from a list of [`FieldSpec`]s and then
//! seals records before they are stored and opens them after they are read.
//! Field names are dot-notation paths with `[]` marking arrays:
//!
//! | Path                   | Addresses                                   |
//! |------------------------|---------------------------------------------|
//! | `ssn`                  | top-level `ssn`                             |
//! | `user.address.zip`     | nested object member                        |
//! | `orders[].card_number` | `card_number` of every element of `orders`  |
//!
//! Paths that do not exist in a given record are skipped.

use std::collections::HashSet;

use common::{FieldError, FieldSpec, Result, SemanticType};
use serde_json::Value;

use crate::codec::{
    BooleanCodec, Codec, DateCodec, DateTimeCodec, EmailCodec, FloatCodec, IntegerCodec,
    TextCodec,
};
use crate::field::EncryptedField;
use crate::resolver::Resolver;

/// One step of a parsed field path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    /// Navigate into an object property by name.
    Key(String),
    /// Expand into every element of a JSON array.
    ArrayItem,
}

fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if let Some(key) = part.strip_suffix("[]") {
            segments.push(PathSegment::Key(key.to_owned()));
            segments.push(PathSegment::ArrayItem);
        } else {
            segments.push(PathSegment::Key(part.to_owned()));
        }
    }
    segments
}

/// Follow `segments` through `value` and call `leaf` on every value found at
/// the end of the path.
fn visit_path(
    value: &mut Value,
    segments: &[PathSegment],
    leaf: &mut dyn FnMut(&mut Value) -> Result<()>,
) -> Result<()> {
    let Some((head, rest)) = segments.split_first() else {
        return leaf(value);
    };
    match head {
        PathSegment::Key(key) => {
            if let Value::Object(map) = value {
                if let Some(child) = map.get_mut(key) {
                    visit_path(child, rest, leaf)?;
                }
            }
        }
        PathSegment::ArrayItem => {
            if let Value::Array(items) = value {
                for item in items.iter_mut() {
                    visit_path(item, rest, leaf)?;
                }
            }
        }
    }
    Ok(())
}

/// An [`EncryptedField`] with its codec erased, chosen by semantic type.
#[derive(Debug)]
pub enum AnyField {
    Text(EncryptedField<TextCodec>),
    Email(EncryptedField<EmailCodec>),
    Integer(EncryptedField<IntegerCodec>),
    Float(EncryptedField<FloatCodec>),
    Date(EncryptedField<DateCodec>),
    DateTime(EncryptedField<DateTimeCodec>),
    Boolean(EncryptedField<BooleanCodec>),
}

impl AnyField {
    /// Resolve `spec` with the codec its semantic type calls for.
    ///
    /// # Errors
    ///
    /// Propagates resolution errors from [`Resolver::field`].
    pub fn resolve(resolver: &Resolver, spec: &FieldSpec) -> Result<Self> {
        Ok(match spec.semantic_type {
            SemanticType::Char | SemanticType::Text => AnyField::Text(resolver.field(spec)?),
            SemanticType::Email => AnyField::Email(resolver.field(spec)?),
            SemanticType::Integer => AnyField::Integer(resolver.field(spec)?),
            SemanticType::Float => AnyField::Float(resolver.field(spec)?),
            SemanticType::Date => AnyField::Date(resolver.field(spec)?),
            SemanticType::DateTime => AnyField::DateTime(resolver.field(spec)?),
            SemanticType::Boolean => AnyField::Boolean(resolver.field(spec)?),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            AnyField::Text(f) => f.name(),
            AnyField::Email(f) => f.name(),
            AnyField::Integer(f) => f.name(),
            AnyField::Float(f) => f.name(),
            AnyField::Date(f) => f.name(),
            AnyField::DateTime(f) => f.name(),
            AnyField::Boolean(f) => f.name(),
        }
    }

    /// Stored JSON form of an application JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Codec`] if the value is not of the field's type,
    /// plus any error from [`EncryptedField::to_stored`].
    pub fn seal_value(&self, value: &Value) -> Result<Value> {
        match self {
            AnyField::Text(f) => seal_with(f, value),
            AnyField::Email(f) => seal_with(f, value),
            AnyField::Integer(f) => seal_with(f, value),
            AnyField::Float(f) => seal_with(f, value),
            AnyField::Date(f) => seal_with(f, value),
            AnyField::DateTime(f) => seal_with(f, value),
            AnyField::Boolean(f) => seal_with(f, value),
        }
    }

    /// Application JSON form of a stored JSON value.
    ///
    /// # Errors
    ///
    /// As [`EncryptedField::from_native`].
    pub fn open_value(&self, stored: &Value) -> Result<Value> {
        match self {
            AnyField::Text(f) => open_with(f, stored),
            AnyField::Email(f) => open_with(f, stored),
            AnyField::Integer(f) => open_with(f, stored),
            AnyField::Float(f) => open_with(f, stored),
            AnyField::Date(f) => open_with(f, stored),
            AnyField::DateTime(f) => open_with(f, stored),
            AnyField::Boolean(f) => open_with(f, stored),
        }
    }
}

fn seal_with<C: Codec>(field: &EncryptedField<C>, value: &Value) -> Result<Value> {
    let typed = match value {
        Value::Null => return Ok(Value::Null),
        Value::String(s) if s.is_empty() => return Ok(Value::String(String::new())),
        Value::String(s) => C::parse(s)?,
        other => C::from_native(other)?,
    };
    Ok(field
        .to_stored(Some(&typed))?
        .map_or(Value::Null, Value::String))
}

fn open_with<C: Codec>(field: &EncryptedField<C>, stored: &Value) -> Result<Value> {
    Ok(field
        .from_native(stored)?
        .map_or(Value::Null, |v| C::to_native(&v)))
}

/// A set of resolved fields addressed by path.
#[derive(Debug)]
pub struct RecordSchema {
    fields: Vec<(Vec<PathSegment>, AnyField)>,
}

impl RecordSchema {
    /// Resolve every spec up front.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Config`] for duplicate field names and propagates
    /// the first resolution error.
    pub fn from_specs(resolver: &Resolver, specs: &[FieldSpec]) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(FieldError::Config(format!(
                    "field {} is declared more than once",
                    spec.name
                )));
            }
            fields.push((parse_path(&spec.name), AnyField::resolve(resolver, spec)?));
        }
        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The field declared under `name`, if any.
    pub fn field(&self, name: &str) -> Option<&AnyField> {
        self.fields
            .iter()
            .map(|(_, f)| f)
            .find(|f| f.name() == name)
    }

    /// Replace every declared field in `record` with its stored form.
    ///
    /// # Errors
    ///
    /// Stops at the first failing field; `record` may be partially sealed.
    pub fn seal_record(&self, record: &mut Value) -> Result<()> {
        for (path, field) in &self.fields {
            visit_path(record, path, &mut |leaf: &mut Value| {
                *leaf = field.seal_value(leaf)?;
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Replace every declared field in `record` with its application form.
    ///
    /// # Errors
    ///
    /// Stops at the first failing field; `record` may be partially opened.
    pub fn open_record(&self, record: &mut Value) -> Result<()> {
        for (path, field) in &self.fields {
            visit_path(record, path, &mut |leaf: &mut Value| {
                *leaf = field.open_value(leaf)?;
                Ok(())
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::Settings;
    use crate::keyset::KeysetFile;

    fn resolver() -> (tempfile::TempDir, Resolver) {
        let dir = tempfile::tempdir().unwrap();
        KeysetFile::generate("records").write_to(dir.path()).unwrap();
        let r = Resolver::new(Settings::default().with_keydir(dir.path()));
        (dir, r)
    }

    #[test]
    fn parse_path_flat() {
        assert_eq!(parse_path("ssn"), vec![PathSegment::Key("ssn".into())]);
    }

    #[test]
    fn parse_path_nested() {
        assert_eq!(parse_path("user.address.zip").len(), 3);
    }

    #[test]
    fn parse_path_array() {
        let segs = parse_path("orders[].card_number");
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[1], PathSegment::ArrayItem);
    }

    #[test]
    fn seal_and_open_flat_record() {
        let (_dir, r) = resolver();
        let schema = RecordSchema::from_specs(
            &r,
            &[
                FieldSpec::new("ssn", SemanticType::Char),
                FieldSpec::new("age", SemanticType::Integer),
                FieldSpec::new("active", SemanticType::Boolean),
            ],
        )
        .unwrap();
        let original = json!({"ssn": "123-45-6789", "age": 42, "active": true, "name": "Alice"});
        let mut record = original.clone();
        schema.seal_record(&mut record).unwrap();

        assert!(record["ssn"].as_str().unwrap().starts_with("v1."));
        assert!(record["age"].as_str().unwrap().starts_with("v1."));
        assert!(record["active"].as_str().unwrap().starts_with("v1."));
        assert_eq!(record["name"], "Alice");

        schema.open_record(&mut record).unwrap();
        assert_eq!(record, original);
    }

    #[test]
    fn nested_and_array_paths() {
        let (_dir, r) = resolver();
        let schema = RecordSchema::from_specs(
            &r,
            &[
                FieldSpec::new("user.address.zip", SemanticType::Char),
                FieldSpec::new("orders[].card_number", SemanticType::Char),
            ],
        )
        .unwrap();
        let original = json!({
            "user": {"address": {"zip": "90210"}},
            "orders": [{"card_number": "4111111111111111"}, {"card_number": "5500000000000004"}]
        });
        let mut record = original.clone();
        schema.seal_record(&mut record).unwrap();
        assert!(record["user"]["address"]["zip"].as_str().unwrap().starts_with("v1."));
        for order in record["orders"].as_array().unwrap() {
            assert!(order["card_number"].as_str().unwrap().starts_with("v1."));
        }
        schema.open_record(&mut record).unwrap();
        assert_eq!(record, original);
    }

    #[test]
    fn missing_field_is_noop() {
        let (_dir, r) = resolver();
        let schema =
            RecordSchema::from_specs(&r, &[FieldSpec::new("ssn", SemanticType::Char)]).unwrap();
        let mut record = json!({"name": "Alice"});
        schema.seal_record(&mut record).unwrap();
        assert_eq!(record, json!({"name": "Alice"}));
    }

    #[test]
    fn null_and_empty_pass_through() {
        let (_dir, r) = resolver();
        let schema = RecordSchema::from_specs(
            &r,
            &[
                FieldSpec::new("a", SemanticType::Text),
                FieldSpec::new("b", SemanticType::Integer),
            ],
        )
        .unwrap();
        let mut record = json!({"a": "", "b": null});
        schema.seal_record(&mut record).unwrap();
        assert_eq!(record, json!({"a": "", "b": null}));
        schema.open_record(&mut record).unwrap();
        assert_eq!(record, json!({"a": "", "b": null}));
    }

    #[test]
    fn legacy_plaintext_record_opens() {
        let (_dir, r) = resolver();
        let schema = RecordSchema::from_specs(
            &r,
            &[
                FieldSpec::new("born", SemanticType::Date),
                FieldSpec::new("score", SemanticType::Float),
            ],
        )
        .unwrap();
        let mut record = json!({"born": "1990-05-17", "score": 2.5});
        schema.open_record(&mut record).unwrap();
        assert_eq!(record, json!({"born": "1990-05-17", "score": 2.5}));
    }

    #[test]
    fn wrong_type_on_write_is_codec_error() {
        let (_dir, r) = resolver();
        let schema =
            RecordSchema::from_specs(&r, &[FieldSpec::new("age", SemanticType::Integer)]).unwrap();
        let mut record = json!({"age": "forty"});
        assert!(matches!(
            schema.seal_record(&mut record),
            Err(FieldError::Codec(_))
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (_dir, r) = resolver();
        let res = RecordSchema::from_specs(
            &r,
            &[
                FieldSpec::new("ssn", SemanticType::Char),
                FieldSpec::new("ssn", SemanticType::Text),
            ],
        );
        assert!(matches!(res, Err(FieldError::Config(_))));
    }

    #[test]
    fn specs_deserialise_from_json() {
        let (_dir, r) = resolver();
        let specs: Vec<FieldSpec> = serde_json::from_value(json!([
            {"name": "email", "type": "email", "prefix": "enc:"},
            {"name": "seen", "type": "datetime"}
        ]))
        .unwrap();
        let schema = RecordSchema::from_specs(&r, &specs).unwrap();
        assert_eq!(schema.len(), 2);
        assert!(matches!(schema.field("email"), Some(AnyField::Email(_))));

        let mut record = json!({"email": "a@example.com", "seen": "2021-06-01T12:00:00+02:00"});
        schema.seal_record(&mut record).unwrap();
        assert!(record["email"].as_str().unwrap().starts_with("enc:v1."));
        schema.open_record(&mut record).unwrap();
        assert_eq!(record["email"], "a@example.com");
        assert_eq!(record["seen"], "2021-06-01T12:00:00+02:00");
    }
}
