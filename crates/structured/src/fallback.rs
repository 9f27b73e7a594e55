//! Fallback Synthesizer
//!
//! Builds the minimal value satisfying every required field of a schema
//! with safe defaults, then applies caller-provided seed overrides. The
//! output depends only on the schema and the hints, so repeated runs of the
//! fallback path are reproducible. Every synthesized object is degraded.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::extract::StructuredObject;
use crate::schema::{Schema, SchemaType};

/// Placeholder used for required string fields.
pub const PLACEHOLDER: &str = "N/A";

/// Deterministic seed for a synthesized object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedHints {
    /// Values written at dotted paths after defaults are built
    pub overrides: BTreeMap<String, Value>,
}

impl SeedHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `value` at a dotted path such as `demographics.age`.
    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.overrides.insert(path.into(), value);
        self
    }
}

/// Produce a schema-valid, degraded object.
pub fn synthesize(schema: &Schema, hints: &SeedHints) -> StructuredObject {
    let mut value = default_value(schema);
    for (path, override_value) in &hints.overrides {
        set_path(&mut value, path, override_value.clone());
    }
    StructuredObject::degraded(value)
}

fn default_value(schema: &Schema) -> Value {
    match schema.schema_type {
        SchemaType::String => Value::String(PLACEHOLDER.to_string()),
        SchemaType::Number | SchemaType::Integer => Value::from(0),
        SchemaType::Boolean => Value::Bool(false),
        SchemaType::Any => Value::Null,
        SchemaType::Array => {
            let count = schema.min_items.unwrap_or(0);
            let item = schema
                .items
                .as_deref()
                .map(default_value)
                .unwrap_or(Value::Null);
            Value::Array(vec![item; count])
        }
        SchemaType::Object => {
            let mut map = Map::new();
            for name in &schema.required {
                let child = schema
                    .properties
                    .get(name)
                    .map(default_value)
                    .unwrap_or(Value::Null);
                map.insert(name.clone(), child);
            }
            Value::Object(map)
        }
    }
}

fn set_path(target: &mut Value, path: &str, value: Value) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Some(map) = target.as_object_mut() else {
        return;
    };
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_path(child, rest, value);
        }
    }
}
