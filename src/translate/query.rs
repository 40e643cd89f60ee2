//! StructuredQuery: the translator's typed output

use crate::filter::Predicate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;

/// A natural-language query split into its semantic and structured parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    /// Text ranked by similarity; may be empty
    pub semantic_phrase: String,
    /// Metadata predicate, absent when the query has no filterable intent
    #[serde(default)]
    pub filter: Option<Predicate>,
    #[serde(default)]
    pub limit: Option<NonZeroUsize>,
}

impl StructuredQuery {
    /// Pure similarity search with no filter and no limit.
    pub fn semantic(phrase: impl Into<String>) -> Self {
        Self {
            semantic_phrase: phrase.into(),
            filter: None,
            limit: None,
        }
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the limit; zero clears it.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = NonZeroUsize::new(limit);
        self
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }
}

impl fmt::Display for StructuredQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query={:?}", self.semantic_phrase)?;
        match &self.filter {
            Some(filter) => write!(f, " filter={}", filter)?,
            None => write!(f, " filter=NO_FILTER")?,
        }
        if let Some(limit) = self.limit {
            write!(f, " limit={}", limit)?;
        }
        Ok(())
    }
}
