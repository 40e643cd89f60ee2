//! Attribute declarations

use serde::{Deserialize, Serialize};
use std::fmt;

/// The value type an attribute stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    #[serde(alias = "list[string]", alias = "string_list")]
    StringList,
    Integer,
    Float,
}

impl ValueType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Float)
    }

    /// Name used when describing the schema to the language model.
    pub fn prompt_name(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::StringList => "list[string]",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prompt_name())
    }
}

/// A filterable metadata attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Unique within a schema
    pub name: String,
    /// Human-readable description shown to the translator
    pub description: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Documents may omit optional attributes; comparisons on a missing
    /// optional attribute evaluate to false.
    #[serde(default)]
    pub optional: bool,
}

impl AttributeSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            value_type,
            optional: false,
        }
    }

    /// Mark the attribute as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}
