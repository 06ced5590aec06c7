//! Utilities for primitive JSON schema definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Represents the restricted subset of JSON Schema allowed in elicitation requests:
/// only flat, primitive-typed properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Schema {
    /// See [`StringSchema`]
    String(StringSchema),

    /// See [`NumberSchema`]
    Number(NumberSchema),

    /// See [`NumberSchema`]
    Integer(NumberSchema),

    /// See [`BooleanSchema`]
    Boolean(BooleanSchema),

    /// See [`EnumSchema`]
    Enum(EnumSchema),
}

/// Represents a schema for a string type.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct StringSchema {
    /// A title for the property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// A human-readable description of the property
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    /// The minimum length for the string.
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// The maximum length for the string.
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// A specific format for the string ("email", "uri", "date", or "date-time").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Represents a schema for a number or integer type.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct NumberSchema {
    /// A title for the property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// A human-readable description of the property
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    /// The minimum allowed value.
    #[serde(rename = "minimum", skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// The maximum allowed value.
    #[serde(rename = "maximum", skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Represents a schema for a boolean type.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct BooleanSchema {
    /// A title for the property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// A human-readable description of the property
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    /// The default value for the property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

/// Represents a schema for a single-select enumeration of strings.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct EnumSchema {
    /// A title for the property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// A human-readable description of the property
    #[serde(rename = "description", skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    /// The allowed values.
    #[serde(rename = "enum")]
    pub values: Vec<Value>,
}

impl From<&str> for Schema {
    /// Builds a default schema from a type name, e.g. `"string"` or `"number"`
    #[inline]
    fn from(type_name: &str) -> Self {
        match type_name {
            "number" => Schema::Number(Default::default()),
            "integer" => Schema::Integer(Default::default()),
            "boolean" | "bool" => Schema::Boolean(Default::default()),
            _ => Schema::String(Default::default()),
        }
    }
}

impl From<StringSchema> for Schema {
    #[inline]
    fn from(schema: StringSchema) -> Self {
        Schema::String(schema)
    }
}

impl From<NumberSchema> for Schema {
    #[inline]
    fn from(schema: NumberSchema) -> Self {
        Schema::Number(schema)
    }
}

impl From<BooleanSchema> for Schema {
    #[inline]
    fn from(schema: BooleanSchema) -> Self {
        Schema::Boolean(schema)
    }
}

impl From<EnumSchema> for Schema {
    #[inline]
    fn from(schema: EnumSchema) -> Self {
        Schema::Enum(schema)
    }
}
