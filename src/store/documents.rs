//! DocumentStore: schema-validated, in-memory document storage

use super::document::{Document, DocumentId, Metadata};
use crate::error::{RetrievalError, RetrievalResult};
use crate::schema::SchemaRegistry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Owns every document record.
///
/// Concurrent reads are lock-free across shards; writes to a single id are
/// serialized by the shard lock.
#[derive(Debug)]
pub struct DocumentStore {
    schema: Arc<SchemaRegistry>,
    documents: DashMap<DocumentId, Document>,
    next_id: AtomicU64,
}

impl DocumentStore {
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self {
            schema,
            documents: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    /// Validate and insert a document, returning its new id.
    ///
    /// Nothing is written when validation fails.
    pub fn add(&self, content: impl Into<String>, metadata: Metadata) -> RetrievalResult<DocumentId> {
        self.validate(&metadata)?;

        let id = DocumentId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let document = Document {
            id,
            content: content.into(),
            metadata,
            ingested_at: chrono::Utc::now(),
        };
        self.documents.insert(id, document);
        debug!(%id, "document stored");
        Ok(id)
    }

    /// Check a metadata record against the schema.
    pub fn validate(&self, metadata: &Metadata) -> RetrievalResult<()> {
        for (name, value) in metadata {
            let spec = self.schema.resolve(name).map_err(|_| {
                RetrievalError::SchemaViolation(format!("unknown field '{}'", name))
            })?;
            if value.value_type() != spec.value_type {
                return Err(RetrievalError::type_mismatch(
                    name,
                    format!("expected {}, got {}", spec.value_type, value.value_type()),
                ));
            }
        }

        for spec in self.schema.attributes() {
            if !spec.optional && !metadata.contains_key(&spec.name) {
                return Err(RetrievalError::SchemaViolation(format!(
                    "missing required field '{}'",
                    spec.name
                )));
            }
        }

        Ok(())
    }

    pub fn get(&self, id: DocumentId) -> RetrievalResult<Document> {
        self.documents
            .get(&id)
            .map(|r| r.clone())
            .ok_or(RetrievalError::NotFound(id))
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.documents.contains_key(&id)
    }

    /// All documents in insertion order.
    pub fn all(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self.documents.iter().map(|r| r.value().clone()).collect();
        docs.sort_by_key(|d| d.id);
        docs
    }

    /// All ids in insertion order.
    pub fn ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = self.documents.iter().map(|r| *r.key()).collect();
        ids.sort();
        ids
    }

    /// Ids whose metadata satisfies `keep`, in insertion order.
    ///
    /// Stops at the first error `keep` returns.
    pub fn select<F>(&self, mut keep: F) -> RetrievalResult<Vec<DocumentId>>
    where
        F: FnMut(&Metadata) -> RetrievalResult<bool>,
    {
        let mut ids = Vec::new();
        for entry in self.documents.iter() {
            if keep(&entry.value().metadata)? {
                ids.push(*entry.key());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove a document.
    ///
    /// Crate-private: `SelfQueryRetriever::remove_document` is the public
    /// path, and it drops the matching index vector as well.
    pub(crate) fn remove(&self, id: DocumentId) -> RetrievalResult<Document> {
        self.documents
            .remove(&id)
            .map(|(_, doc)| doc)
            .ok_or(RetrievalError::NotFound(id))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
