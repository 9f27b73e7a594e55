//! Schema Model
//!
//! A small JSON-shape schema: value type, required/optional properties for
//! objects, item schema and minimum length for arrays. Validation checks
//! presence and basic types only; values are never rewritten.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// JSON value type expected at a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    /// Any JSON value, including null
    Any,
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
            SchemaType::Any => "any",
        };
        f.write_str(name)
    }
}

/// First schema violation found, with a dotted path to the offending node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Expected shape of a structured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
}

impl Schema {
    fn of(schema_type: SchemaType, description: Option<&str>) -> Self {
        Self {
            schema_type,
            description: description.map(|s| s.to_string()),
            properties: BTreeMap::new(),
            required: Vec::new(),
            items: None,
            min_items: None,
        }
    }

    pub fn string(description: Option<&str>) -> Self {
        Self::of(SchemaType::String, description)
    }

    pub fn number(description: Option<&str>) -> Self {
        Self::of(SchemaType::Number, description)
    }

    pub fn integer(description: Option<&str>) -> Self {
        Self::of(SchemaType::Integer, description)
    }

    pub fn boolean(description: Option<&str>) -> Self {
        Self::of(SchemaType::Boolean, description)
    }

    pub fn any(description: Option<&str>) -> Self {
        Self::of(SchemaType::Any, description)
    }

    /// An object with no properties yet; add them with `field` / `optional_field`.
    pub fn object(description: Option<&str>) -> Self {
        Self::of(SchemaType::Object, description)
    }

    pub fn array(description: Option<&str>, items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of(SchemaType::Array, description)
        }
    }

    /// Add a required property.
    pub fn field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    /// Add an optional property (validated only when present).
    pub fn optional_field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn with_min_items(mut self, min_items: usize) -> Self {
        self.min_items = Some(min_items);
        self
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Validate `value`, returning the first violation.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.validate_at(value, "")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), SchemaViolation> {
        let type_ok = match self.schema_type {
            SchemaType::String => value.is_string(),
            SchemaType::Number => value.is_number(),
            SchemaType::Integer => value.is_i64() || value.is_u64(),
            SchemaType::Boolean => value.is_boolean(),
            SchemaType::Array => value.is_array(),
            SchemaType::Object => value.is_object(),
            SchemaType::Any => true,
        };
        if !type_ok {
            return Err(SchemaViolation {
                path: path.to_string(),
                message: format!("expected {}, found {}", self.schema_type, type_name(value)),
            });
        }

        if let Some(map) = value.as_object() {
            for name in &self.required {
                if !map.contains_key(name) {
                    return Err(SchemaViolation {
                        path: join_path(path, name),
                        message: "missing required field".to_string(),
                    });
                }
            }
            for (name, child) in &self.properties {
                match map.get(name) {
                    Some(Value::Null) if !self.is_required(name) => {}
                    Some(v) => child.validate_at(v, &join_path(path, name))?,
                    None => {}
                }
            }
        }

        if let Some(items) = value.as_array() {
            if let Some(min) = self.min_items {
                if items.len() < min {
                    return Err(SchemaViolation {
                        path: path.to_string(),
                        message: format!("expected at least {} items, found {}", min, items.len()),
                    });
                }
            }
            if let Some(item_schema) = &self.items {
                for (i, item) in items.iter().enumerate() {
                    item_schema.validate_at(item, &format!("{}[{}]", path, i))?;
                }
            }
        }

        Ok(())
    }

    /// Example-shaped JSON used to show the expected structure in prompts.
    /// Leaves are rendered as their type name (or description, when given).
    pub fn example(&self) -> Value {
        match self.schema_type {
            SchemaType::Object => {
                let mut map = serde_json::Map::new();
                for (name, child) in &self.properties {
                    map.insert(name.clone(), child.example());
                }
                Value::Object(map)
            }
            SchemaType::Array => match &self.items {
                Some(items) => json!([items.example()]),
                None => json!([]),
            },
            other => match &self.description {
                Some(desc) => json!(format!("{} ({})", other, desc)),
                None => json!(other.to_string()),
            },
        }
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
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
    use super::*;

    fn person() -> Schema {
        Schema::object(None)
            .field("name", Schema::string(None))
            .field(
                "demographics",
                Schema::object(None)
                    .field("age", Schema::number(None))
                    .field("city", Schema::string(None)),
            )
            .field("interests", Schema::array(None, Schema::string(None)))
            .optional_field("nickname", Schema::string(None))
    }

    #[test]
    fn test_valid_object_passes() {
        let value = json!({
            "name": "Ana",
            "demographics": {"age": 34, "city": "Lyon"},
            "interests": ["chess"],
            "extra": true
        });
        assert!(person().validate(&value).is_ok());
    }

    #[test]
    fn test_missing_nested_field() {
        let value = json!({
            "name": "Ana",
            "demographics": {"age": 34},
            "interests": []
        });
        let err = person().validate(&value).unwrap_err();
        assert_eq!(err.path, "demographics.city");
        assert_eq!(err.message, "missing required field");
    }

    #[test]
    fn test_type_mismatches() {
        // numeric field given as string
        let value = json!({"name": "Ana", "demographics": {"age": "34", "city": "Lyon"}, "interests": []});
        let err = person().validate(&value).unwrap_err();
        assert_eq!(err.path, "demographics.age");
        assert!(err.message.contains("expected number"));

        // nested object given as string
        let value = json!({"name": "Ana", "demographics": "34, Lyon", "interests": []});
        assert_eq!(person().validate(&value).unwrap_err().path, "demographics");

        // list field given as string
        let value = json!({"name": "Ana", "demographics": {"age": 1, "city": "x"}, "interests": "chess"});
        assert_eq!(person().validate(&value).unwrap_err().path, "interests");
    }

    #[test]
    fn test_array_items_and_min_items() {
        let schema = Schema::array(None, Schema::object(None).field("id", Schema::string(None)))
            .with_min_items(1);
        assert!(schema.validate(&json!([{"id": "a"}])).is_ok());
        assert!(schema.validate(&json!([])).is_err());
        let err = schema.validate(&json!([{"id": "a"}, {"id": 2}])).unwrap_err();
        assert_eq!(err.path, "[1].id");
    }

    #[test]
    fn test_optional_field_validated_when_present() {
        let value = json!({"name": "Ana", "demographics": {"age": 1, "city": "x"}, "interests": [], "nickname": 5});
        assert!(person().validate(&value).is_err());
        let value = json!({"name": "Ana", "demographics": {"age": 1, "city": "x"}, "interests": [], "nickname": null});
        assert!(person().validate(&value).is_ok());
    }

    #[test]
    fn test_example_shape() {
        let example = person().example();
        assert_eq!(example["demographics"]["age"], "number");
        assert_eq!(example["interests"][0], "string");
    }
}
