//! SchemaRegistry: the set of filterable attributes

use super::attribute::{AttributeSpec, ValueType};
use crate::error::{RetrievalError, RetrievalResult};
use crate::filter::Comparator;
use std::collections::HashMap;

/// Registry of filterable attributes.
///
/// Built once at startup and then shared immutably (usually behind an `Arc`)
/// by the store, the translator and the evaluator.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    /// Registration order is kept for prompt rendering
    attributes: Vec<AttributeSpec>,
    by_name: HashMap<String, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of attributes, failing on the first repeat.
    pub fn from_attributes(
        attributes: impl IntoIterator<Item = AttributeSpec>,
    ) -> RetrievalResult<Self> {
        let mut registry = Self::new();
        for spec in attributes {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    /// Register an attribute.
    pub fn register(&mut self, spec: AttributeSpec) -> RetrievalResult<()> {
        if self.by_name.contains_key(&spec.name) {
            return Err(RetrievalError::DuplicateField(spec.name));
        }
        self.by_name.insert(spec.name.clone(), self.attributes.len());
        self.attributes.push(spec);
        Ok(())
    }

    /// Look up an attribute by name.
    pub fn resolve(&self, name: &str) -> RetrievalResult<&AttributeSpec> {
        self.by_name
            .get(name)
            .map(|&idx| &self.attributes[idx])
            .ok_or_else(|| RetrievalError::UnknownField(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All attributes in registration order
    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Comparators valid for a value type.
    pub fn allowed_operators(value_type: ValueType) -> Vec<Comparator> {
        Comparator::ALL
            .iter()
            .copied()
            .filter(|c| c.valid_for(value_type))
            .collect()
    }

    /// Render the attributes as a JSON object keyed by attribute name.
    ///
    /// This is the form the translator embeds in its prompt.
    pub fn describe(&self) -> String {
        let mut map = serde_json::Map::new();
        for attr in &self.attributes {
            map.insert(
                attr.name.clone(),
                serde_json::json!({
                    "description": attr.description,
                    "type": attr.value_type.prompt_name(),
                }),
            );
        }
        serde_json::to_string_pretty(&serde_json::Value::Object(map))
            .unwrap_or_else(|_| "{}".to_string())
    }
}
