//! A small JSON-schema builder for tool parameter definitions.
//!
//! Only the JSON-schema type enumeration is constructible, so schemas with
//! invalid type names cannot exist. Operation-style parameters enumerate
//! their allowed values.

use serde_json::{json, Map, Value};

/// The JSON-schema primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl SchemaType {
    fn as_str(self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
            SchemaType::Null => "null",
        }
    }
}

/// Builder for an object schema (`"type": "object"`), which is what every
/// tool's `parameters` must be.
#[derive(Debug, Default)]
pub struct ObjectSchema {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string property.
    pub fn string(mut self, name: &str, description: &str) -> Self {
        self.properties.insert(
            name.into(),
            json!({"type": SchemaType::String.as_str(), "description": description}),
        );
        self
    }

    /// Add a string property restricted to an enumerated set of values.
    pub fn string_enum(mut self, name: &str, description: &str, values: &[&str]) -> Self {
        self.properties.insert(
            name.into(),
            json!({
                "type": SchemaType::String.as_str(),
                "description": description,
                "enum": values,
            }),
        );
        self
    }

    /// Add an integer property.
    pub fn integer(mut self, name: &str, description: &str) -> Self {
        self.properties.insert(
            name.into(),
            json!({"type": SchemaType::Integer.as_str(), "description": description}),
        );
        self
    }

    /// Add a number property.
    pub fn number(mut self, name: &str, description: &str) -> Self {
        self.properties.insert(
            name.into(),
            json!({"type": SchemaType::Number.as_str(), "description": description}),
        );
        self
    }

    /// Add a boolean property.
    pub fn boolean(mut self, name: &str, description: &str) -> Self {
        self.properties.insert(
            name.into(),
            json!({"type": SchemaType::Boolean.as_str(), "description": description}),
        );
        self
    }

    /// Add an array property with typed items.
    pub fn array_of(mut self, name: &str, description: &str, items: SchemaType) -> Self {
        self.properties.insert(
            name.into(),
            json!({
                "type": SchemaType::Array.as_str(),
                "description": description,
                "items": {"type": items.as_str()},
            }),
        );
        self
    }

    /// Mark properties as required.
    pub fn required(mut self, names: &[&str]) -> Self {
        self.required = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Build the final schema value.
    pub fn build(self) -> Value {
        json!({
            "type": SchemaType::Object.as_str(),
            "properties": self.properties,
            "required": self.required,
        })
    }
}
