//! JSON Schema adapter for route input and output contracts.
//!
//! This module wraps the `jsonschema` crate behind three operations:
//!
//! - [`compile`]: turn a schema document into a reusable [`CompiledSchema`]
//! - [`validate`]: check a value against a compiled schema, collecting every
//!   violation instead of stopping at the first one ([`check`] does the same
//!   without coercion)
//! - [`describe`]: produce a serializable [`SchemaDescription`] for route
//!   introspection
//!
//! # Coercion
//!
//! Query parameters always arrive as strings. Before validating, string values
//! of the schema's top-level `properties` are coerced to the declared scalar
//! type (`integer`, `number`, `boolean`) when they parse cleanly. Properties
//! that also accept `string` are never coerced. Nested values are left alone.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use switchyard_lib::schema::{compile, validate};
//!
//! let schema = compile(&json!({
//!     "type": "object",
//!     "required": ["qty"],
//!     "properties": { "qty": { "type": "integer" } }
//! }))
//! .unwrap();
//!
//! let value = validate(&json!({ "qty": "3" }), &schema).unwrap();
//! assert_eq!(value, json!({ "qty": 3 }));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::SchemaError;

/// Name carried by every [`ValidationError`].
pub const VALIDATION_ERROR_NAME: &str = "ValidationError";

/// A schema document compiled once and shared between requests.
#[derive(Clone)]
pub struct CompiledSchema {
    validator: Arc<Validator>,
    source: Arc<Value>,
}

impl CompiledSchema {
    /// The schema document this was compiled from.
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Shorthand for [`validate`].
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        validate(value, self)
    }

    /// Shorthand for [`check`].
    pub fn check(&self, value: &Value) -> Result<(), ValidationError> {
        check(value, self)
    }

    /// Shorthand for [`describe`].
    pub fn describe(&self) -> SchemaDescription {
        describe(self)
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("source", &self.source)
            .finish()
    }
}

/// Compile a schema document.
///
/// Compiling the same document twice yields equivalent validators.
pub fn compile(schema: &Value) -> Result<CompiledSchema, SchemaError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| SchemaError {
        message: e.to_string(),
    })?;

    Ok(CompiledSchema {
        validator: Arc::new(validator),
        source: Arc::new(schema.clone()),
    })
}

/// A single constraint violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationDetail {
    /// Human-readable message, prefixed with the instance path when not at the root.
    pub message: String,
    /// JSON pointer to the offending value (empty for the root).
    pub path: String,
    /// JSON pointer to the schema keyword that failed.
    pub schema_path: String,
}

impl ValidationDetail {
    fn from_error(error: &jsonschema::ValidationError<'_>) -> Self {
        let path = error.instance_path.to_string();
        let schema_path = error.schema_path.to_string();
        let reason = error.to_string();
        let message = if path.is_empty() {
            reason
        } else {
            format!("{path}: {reason}")
        };

        Self {
            message,
            path,
            schema_path,
        }
    }
}

/// Every violation found while validating one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Error class name.
    pub name: String,
    /// Detail messages joined with `"; "`.
    pub message: String,
    /// Individual violations, in the order the validator reported them.
    pub details: Vec<ValidationDetail>,
}

impl ValidationError {
    /// Build an error from a non-empty list of violations.
    pub fn from_details(details: Vec<ValidationDetail>) -> Self {
        let message = details
            .iter()
            .map(|detail| detail.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            name: VALIDATION_ERROR_NAME.to_string(),
            message,
            details,
        }
    }

    /// Number of violations.
    pub fn count(&self) -> usize {
        self.details.len()
    }
}

/// Validate `value` against `schema`, returning the coerced value on success.
pub fn validate(value: &Value, schema: &CompiledSchema) -> Result<Value, ValidationError> {
    let coerced = coerce(value.clone(), schema.source());
    check(&coerced, schema)?;
    Ok(coerced)
}

/// Validate `value` exactly as given, without coercion.
pub fn check(value: &Value, schema: &CompiledSchema) -> Result<(), ValidationError> {
    let details: Vec<ValidationDetail> = schema
        .validator
        .iter_errors(value)
        .map(|error| ValidationDetail::from_error(&error))
        .collect();

    if details.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::from_details(details))
    }
}

fn coerce(value: Value, schema: &Value) -> Value {
    let Value::Object(mut map) = value else {
        return value;
    };
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Value::Object(map);
    };

    for (key, property) in properties {
        let Some(slot) = map.get_mut(key) else {
            continue;
        };
        let coerced = match slot {
            Value::String(raw) => coerce_scalar(raw, property),
            _ => None,
        };
        if let Some(coerced) = coerced {
            *slot = coerced;
        }
    }

    Value::Object(map)
}

fn declared_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(ty)) => vec![ty.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn coerce_scalar(raw: &str, schema: &Value) -> Option<Value> {
    let types = declared_types(schema);
    if types.contains(&"string") {
        return None;
    }

    types.into_iter().find_map(|ty| match ty {
        "integer" => raw.trim().parse::<i64>().ok().map(Value::from),
        "number" => {
            let raw = raw.trim();
            raw.parse::<i64>().ok().map(Value::from).or_else(|| {
                raw.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
            })
        }
        "boolean" => match raw.trim() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    })
}

/// Serializable summary of a schema, used for route discovery.
///
/// Only the keywords a client needs to build a request are kept; anything
/// else in the source document is dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescription {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaDescription>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
}

/// Describe a compiled schema. Never re-validates anything.
pub fn describe(schema: &CompiledSchema) -> SchemaDescription {
    describe_value(schema.source())
}

fn describe_value(schema: &Value) -> SchemaDescription {
    let Some(object) = schema.as_object() else {
        return SchemaDescription::default();
    };

    let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);

    SchemaDescription {
        kind: object.get("type").cloned(),
        title: text("title"),
        description: text("description"),
        required: object
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        properties: object
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(name, property)| (name.clone(), describe_value(property)))
                    .collect()
            })
            .unwrap_or_default(),
        items: object
            .get("items")
            .map(|items| Box::new(describe_value(items))),
        allowed: object.get("enum").and_then(Value::as_array).cloned(),
        format: text("format"),
        default: object.get("default").cloned(),
        minimum: object.get("minimum").cloned(),
        maximum: object.get("maximum").cloned(),
        min_length: object.get("minLength").and_then(Value::as_u64),
        max_length: object.get("maxLength").and_then(Value::as_u64),
        pattern: text("pattern"),
        additional_properties: object.get("additionalProperties").and_then(Value::as_bool),
    }
}
