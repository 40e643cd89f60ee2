//! Document representation

use super::value::MetadataValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable identifier assigned by the store.
///
/// Identifiers are allocated in increasing order, so ascending id order is
/// insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(u64);

impl DocumentId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "doc-{}", self.0)
    }
}

/// Metadata record: attribute name → value
pub type Metadata = HashMap<String, MetadataValue>;

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Free text that gets embedded
    pub content: String,
    pub metadata: Metadata,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    /// String-valued metadata field, if present
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).and_then(MetadataValue::as_str)
    }
}
