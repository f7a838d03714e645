//! Schema resolution for structured output.
//!
//! Callers describe the shape of a structured answer in one of two ways:
//!
//! - a **rich** schema: a Rust type deriving `schemars::JsonSchema`, or a
//!   raw JSON Schema document;
//! - a **flat** map of field name to description. Every field is a string;
//!   a name ending in `?` marks the field optional.
//!
//! Both resolve to a [`ResolvedSchema<T>`]: the JSON Schema sent to the
//! provider plus a `parse` function that validates a JSON value and turns
//! it into `T`. The loop only ever sees the resolved form.
//!
//! ```rust
//! use llm_converse::schema::ResolvedSchema;
//! use serde_json::json;
//!
//! let schema = ResolvedSchema::<serde_json::Value>::flat([
//!     ("name", "The person's name"),
//!     ("nickname?", "Optional nickname"),
//! ]);
//! assert_eq!(schema.json_schema()["required"], json!(["name"]));
//!
//! let value = schema.parse(&json!({"name": "Ada"})).unwrap();
//! assert_eq!(value, json!({"name": "Ada"}));
//!
//! let err = schema.parse(&json!({"nickname": "A"})).unwrap_err();
//! assert!(err.to_string().contains("missing required field \"name\""));
//! ```

use std::fmt;
use std::marker::PhantomData;
#[cfg(feature = "schema")]
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::error::LlmError;

/// Marks a flat-schema field as optional when it ends the field name.
pub const OPTIONAL_MARKER: char = '?';

#[derive(Debug, Clone)]
struct FlatField {
    name: String,
    required: bool,
}

#[derive(Clone)]
enum Check {
    Flat(Vec<FlatField>),
    #[cfg(feature = "schema")]
    Rich(Arc<jsonschema::Validator>),
    /// Rich schema without the `schema` feature: serde is the only check.
    #[cfg_attr(feature = "schema", allow(dead_code))]
    Deserialize,
}

/// A JSON Schema paired with the parser that enforces it.
pub struct ResolvedSchema<T = Value> {
    json_schema: Value,
    check: Check,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ResolvedSchema<T> {
    fn clone(&self) -> Self {
        Self {
            json_schema: self.json_schema.clone(),
            check: self.check.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ResolvedSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match self.check {
            Check::Flat(_) => "flat",
            _ => "rich",
        };
        f.debug_struct("ResolvedSchema")
            .field("origin", &origin)
            .field("json_schema", &self.json_schema)
            .finish()
    }
}

impl<T: DeserializeOwned> ResolvedSchema<T> {
    /// Resolves a raw JSON Schema document.
    ///
    /// With the `schema` feature the document is compiled once here; a
    /// malformed schema is an [`LlmError::InvalidRequest`].
    pub fn from_json_schema(schema: Value) -> Result<Self, LlmError> {
        #[cfg(feature = "schema")]
        let check = {
            let validator = jsonschema::validator_for(&schema)
                .map_err(|e| LlmError::InvalidRequest(format!("invalid JSON schema: {e}")))?;
            Check::Rich(Arc::new(validator))
        };
        #[cfg(not(feature = "schema"))]
        let check = Check::Deserialize;

        Ok(Self {
            json_schema: schema,
            check,
            _marker: PhantomData,
        })
    }

    /// Derives the schema from `T`'s [`schemars::JsonSchema`] impl.
    ///
    /// Requires the `schema` feature (enabled by default).
    #[cfg(feature = "schema")]
    pub fn from_type() -> Result<Self, LlmError>
    where
        T: schemars::JsonSchema,
    {
        let schema = schemars::schema_for!(T);
        let value = serde_json::to_value(schema)
            .map_err(|e| LlmError::InvalidRequest(format!("failed to derive JSON schema: {e}")))?;
        Self::from_json_schema(value)
    }

    /// Resolves a flat map of field name to description.
    ///
    /// Field order is preserved in `properties`. A trailing
    /// [`OPTIONAL_MARKER`] is stripped from the name and keeps the field
    /// out of `required`.
    pub fn flat<I, K, D>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, D)>,
        K: AsRef<str>,
        D: Into<String>,
    {
        let mut properties = Map::new();
        let mut required = Vec::new();
        let mut flat = Vec::new();

        for (key, description) in fields {
            let key = key.as_ref();
            let (name, is_required) = match key.strip_suffix(OPTIONAL_MARKER) {
                Some(stripped) => (stripped, false),
                None => (key, true),
            };
            properties.insert(
                name.to_owned(),
                json!({"type": "string", "description": description.into()}),
            );
            if is_required {
                required.push(Value::String(name.to_owned()));
            }
            flat.push(FlatField {
                name: name.to_owned(),
                required: is_required,
            });
        }

        Self {
            json_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
            check: Check::Flat(flat),
            _marker: PhantomData,
        }
    }

    /// The JSON Schema sent to the provider.
    pub fn json_schema(&self) -> &Value {
        &self.json_schema
    }

    /// Validates `value` and converts it into `T`.
    ///
    /// Every failure is an [`LlmError::SchemaValidation`] carrying the
    /// rejected value.
    pub fn parse(&self, value: &Value) -> Result<T, LlmError> {
        let normalized = self.validate(value)?;
        serde_json::from_value(normalized).map_err(|e| LlmError::SchemaValidation {
            message: e.to_string(),
            actual: value.clone(),
        })
    }

    /// Checks `value` against the schema and returns its normalized form.
    ///
    /// For flat schemas the normalized form keeps only declared fields and
    /// drops absent optional ones.
    pub fn validate(&self, value: &Value) -> Result<Value, LlmError> {
        match &self.check {
            Check::Flat(fields) => validate_flat(fields, value),
            #[cfg(feature = "schema")]
            Check::Rich(validator) => {
                let errors: Vec<String> =
                    validator.iter_errors(value).map(|e| e.to_string()).collect();
                if errors.is_empty() {
                    Ok(value.clone())
                } else {
                    Err(LlmError::SchemaValidation {
                        message: errors.join("; "),
                        actual: value.clone(),
                    })
                }
            }
            Check::Deserialize => Ok(value.clone()),
        }
    }
}

fn validate_flat(fields: &[FlatField], value: &Value) -> Result<Value, LlmError> {
    let reject = |message: String| LlmError::SchemaValidation {
        message,
        actual: value.clone(),
    };

    let Value::Object(object) = value else {
        return Err(reject(format!("expected an object, got {}", type_name(value))));
    };

    let mut out = Map::new();
    for field in fields {
        match object.get(&field.name) {
            Some(Value::String(s)) => {
                out.insert(field.name.clone(), Value::String(s.clone()));
            }
            None if !field.required => {}
            None => {
                return Err(reject(format!("missing required field \"{}\"", field.name)));
            }
            Some(other) => {
                return Err(reject(format!(
                    "field \"{}\" must be a string, got {}",
                    field.name,
                    type_name(other)
                )));
            }
        }
    }
    Ok(Value::Object(out))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn person() -> ResolvedSchema {
        ResolvedSchema::flat([("name", "Full name"), ("nickname?", "Nickname")])
    }

    #[test]
    fn test_flat_schema_shape() {
        let schema = person();
        let js = schema.json_schema();
        assert_eq!(js["type"], "object");
        assert_eq!(js["properties"]["name"]["type"], "string");
        assert_eq!(js["properties"]["nickname"]["description"], "Nickname");
        assert_eq!(js["required"], json!(["name"]));

        let keys: Vec<_> = js["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["name", "nickname"]);
    }

    #[test]
    fn test_flat_accepts_required_only() {
        let value = person().parse(&json!({"name": "Ada"})).unwrap();
        assert_eq!(value, json!({"name": "Ada"}));
    }

    #[test]
    fn test_flat_rejects_missing_required() {
        let err = person().parse(&json!({"nickname": "A"})).unwrap_err();
        match err {
            LlmError::SchemaValidation { message, actual } => {
                assert_eq!(message, "missing required field \"name\"");
                assert_eq!(actual, json!({"nickname": "A"}));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_flat_rejects_non_string_and_non_object() {
        let err = person().parse(&json!({"name": 5})).unwrap_err();
        assert!(err.to_string().contains("must be a string"));

        let err = person().parse(&Value::Null).unwrap_err();
        assert!(err.to_string().contains("expected an object, got null"));

        let err = person().parse(&json!(["name"])).unwrap_err();
        assert!(err.to_string().contains("got array"));
    }

    #[test]
    fn test_flat_drops_undeclared_fields() {
        let value = person()
            .parse(&json!({"name": "Ada", "extra": true}))
            .unwrap();
        assert_eq!(value, json!({"name": "Ada"}));
    }

    #[test]
    fn test_flat_into_typed_map() {
        let schema: ResolvedSchema<HashMap<String, String>> =
            ResolvedSchema::flat([("city", "City name")]);
        let map = schema.parse(&json!({"city": "Paris"})).unwrap();
        assert_eq!(map["city"], "Paris");
    }

    #[cfg(feature = "schema")]
    #[test]
    fn test_rich_schema_validates() {
        let schema = ResolvedSchema::<Value>::from_json_schema(json!({
            "type": "object",
            "properties": {"age": {"type": "integer"}},
            "required": ["age"]
        }))
        .unwrap();
        assert!(schema.parse(&json!({"age": 3})).is_ok());
        let err = schema.parse(&json!({"age": "three"})).unwrap_err();
        assert!(matches!(err, LlmError::SchemaValidation { .. }));
    }

    #[cfg(feature = "schema")]
    #[test]
    fn test_rich_schema_from_type() {
        #[derive(serde::Deserialize, schemars::JsonSchema, Debug, PartialEq)]
        struct Point {
            x: i64,
            y: i64,
        }

        let schema = ResolvedSchema::<Point>::from_type().unwrap();
        assert_eq!(schema.json_schema()["type"], "object");
        assert_eq!(
            schema.parse(&json!({"x": 1, "y": 2})).unwrap(),
            Point { x: 1, y: 2 }
        );
        assert!(schema.parse(&json!({"x": 1})).is_err());
    }

    #[cfg(feature = "schema")]
    #[test]
    fn test_malformed_rich_schema_rejected() {
        let err = ResolvedSchema::<Value>::from_json_schema(json!({"type": "frobnicate"})).unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }
}
