//! SelfQueryRetriever: translate → filter → rank → return
//!
//! Filtering happens before ranking, so a document the predicate excludes can
//! never reach the ranked output regardless of its similarity score.

use crate::config::RetrieverConfig;
use crate::embedding::{Embedder, EmbeddingIndex};
use crate::error::{RetrievalError, RetrievalResult};
use crate::filter::FilterEvaluator;
use crate::model::LanguageModel;
use crate::schema::SchemaRegistry;
use crate::store::{Document, DocumentId, DocumentStore, Metadata};
use crate::translate::{ModelTranslator, QueryTranslator, StructuredQuery};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Answers natural-language queries over a metadata + vector store.
///
/// Cheap to share: the store and index are `Arc`s and every method takes
/// `&self`, so concurrent `retrieve` calls and ingestion can run against the
/// same instance.
pub struct SelfQueryRetriever {
    store: Arc<DocumentStore>,
    index: Arc<EmbeddingIndex>,
    translator: Arc<dyn QueryTranslator>,
    config: RetrieverConfig,
}

impl SelfQueryRetriever {
    /// Create a retriever with an empty store and index.
    pub fn new(
        schema: Arc<SchemaRegistry>,
        embedder: Arc<dyn Embedder>,
        translator: Arc<dyn QueryTranslator>,
        config: RetrieverConfig,
    ) -> Self {
        let store = Arc::new(DocumentStore::new(schema));
        let index = Arc::new(EmbeddingIndex::new(embedder, config.metric));
        Self::from_parts(store, index, translator, config)
    }

    /// Create a retriever whose translator calls `model`.
    pub fn with_model(
        schema: Arc<SchemaRegistry>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
        config: RetrieverConfig,
    ) -> Self {
        let translator = Arc::new(ModelTranslator::new(model).with_limit(config.enable_limit));
        Self::new(schema, embedder, translator, config)
    }

    /// Assemble from an existing store and index.
    ///
    /// The index must only ever hold ids from `store`.
    pub fn from_parts(
        store: Arc<DocumentStore>,
        index: Arc<EmbeddingIndex>,
        translator: Arc<dyn QueryTranslator>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            store,
            index,
            translator,
            config,
        }
    }

    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        self.store.schema()
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // === Ingestion ===

    /// Store and embed one document.
    ///
    /// If embedding fails the stored record is rolled back, so the store
    /// never holds a document the index cannot rank.
    pub async fn add_document(
        &self,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> RetrievalResult<DocumentId> {
        let content = content.into();
        let id = self.store.add(content.clone(), metadata)?;

        let embedded = self
            .timed("embedding", self.config.timeouts.embed_seconds, self.index.upsert(id, &content))
            .await;
        if let Err(err) = embedded {
            warn!(%id, error = %err, "embedding failed, rolling back document");
            self.rollback(&[id]);
            return Err(err);
        }
        if !self.drop_orphans(&[id]).is_empty() {
            return Err(RetrievalError::NotFound(id));
        }

        info!(%id, "document ingested");
        Ok(id)
    }

    /// Store and embed many documents with a single embedder call.
    ///
    /// All metadata is validated before anything is written. If embedding
    /// fails every document of the batch is rolled back.
    pub async fn add_documents(
        &self,
        documents: Vec<(String, Metadata)>,
    ) -> RetrievalResult<Vec<DocumentId>> {
        for (_, metadata) in &documents {
            self.store.validate(metadata)?;
        }

        let mut ids = Vec::with_capacity(documents.len());
        let mut contents = Vec::with_capacity(documents.len());
        for (content, metadata) in documents {
            match self.store.add(content.clone(), metadata) {
                Ok(id) => {
                    ids.push(id);
                    contents.push(content);
                }
                Err(err) => {
                    self.rollback(&ids);
                    return Err(err);
                }
            }
        }

        let items: Vec<(DocumentId, &str)> = ids
            .iter()
            .copied()
            .zip(contents.iter().map(String::as_str))
            .collect();
        let embedded = self
            .timed(
                "embedding",
                self.config.timeouts.embed_seconds,
                self.index.upsert_batch(&items),
            )
            .await;
        match embedded {
            Ok(count) => {
                let removed = self.drop_orphans(&ids);
                info!(documents = ids.len(), embedded = count, "batch ingested");
                Ok(ids.into_iter().filter(|id| !removed.contains(id)).collect())
            }
            Err(err) => {
                warn!(documents = ids.len(), error = %err, "batch embedding failed, rolling back");
                self.rollback(&ids);
                Err(err)
            }
        }
    }

    /// Remove a document from the store and the index.
    ///
    /// The record goes first. An ingest of the same id that is still
    /// embedding then finds it gone and drops its own vector.
    pub fn remove_document(&self, id: DocumentId) -> RetrievalResult<Document> {
        let removed = self.store.remove(id);
        self.index.remove(id);
        let document = removed?;
        info!(%id, "document removed");
        Ok(document)
    }

    fn rollback(&self, ids: &[DocumentId]) {
        for id in ids {
            let _ = self.store.remove(*id);
            self.index.remove(*id);
        }
    }

    /// Drop vectors upserted for ids removed while they were embedding.
    /// Returns the ids dropped.
    fn drop_orphans(&self, ids: &[DocumentId]) -> HashSet<DocumentId> {
        let mut orphans = HashSet::new();
        for id in ids {
            if !self.store.contains(*id) {
                self.index.remove(*id);
                debug!(%id, "document removed during ingestion, vector dropped");
                orphans.insert(*id);
            }
        }
        orphans
    }

    // === Retrieval ===

    /// Translate a query, retrying once with a strict prompt when the first
    /// translation is rejected.
    pub async fn translate(&self, query: &str) -> RetrievalResult<StructuredQuery> {
        match self.translate_once(query, false).await {
            Err(RetrievalError::TranslationInvalid(reason)) if self.config.retry_on_invalid => {
                warn!(%reason, "translation rejected, retrying with strict prompt");
                self.translate_once(query, true).await
            }
            other => other,
        }
    }

    async fn translate_once(&self, query: &str, strict: bool) -> RetrievalResult<StructuredQuery> {
        let schema = self.store.schema();
        let description = self.config.content_description.as_str();
        self.timed(
            "translation",
            self.config.timeouts.translate_seconds,
            self.translator.translate(query, schema, description, strict),
        )
        .await
    }

    /// Answer a natural-language query.
    ///
    /// Every returned document satisfies the translated filter. A filter
    /// that matches nothing is an empty result, not an error.
    pub async fn retrieve(&self, query: &str) -> RetrievalResult<Vec<Document>> {
        Ok(self
            .retrieve_with_scores(query)
            .await?
            .into_iter()
            .map(|(doc, _)| doc)
            .collect())
    }

    /// Like `retrieve`, with each document's similarity score.
    pub async fn retrieve_with_scores(&self, query: &str) -> RetrievalResult<Vec<(Document, f32)>> {
        let mut structured = self.translate(query).await?;
        if self.config.use_original_query {
            structured.semantic_phrase = query.to_string();
        }
        debug!(%structured, "query translated");

        let results = self.run_with_scores(&structured).await?;
        info!(query, results = results.len(), "retrieval complete");
        Ok(results)
    }

    /// Execute an already structured query.
    pub async fn run(&self, query: &StructuredQuery) -> RetrievalResult<Vec<Document>> {
        Ok(self
            .run_with_scores(query)
            .await?
            .into_iter()
            .map(|(doc, _)| doc)
            .collect())
    }

    /// Execute an already structured query, keeping scores.
    pub async fn run_with_scores(
        &self,
        query: &StructuredQuery,
    ) -> RetrievalResult<Vec<(Document, f32)>> {
        let candidates: HashSet<DocumentId> = match &query.filter {
            Some(predicate) => {
                let schema = self.store.schema();
                predicate.validate(schema)?;
                let evaluator = FilterEvaluator::new(schema);
                let ids = self.store.select(|metadata| evaluator.evaluate(predicate, metadata))?;
                debug!(candidates = ids.len(), filter = %predicate, "filter applied");
                ids.into_iter().collect()
            }
            None => self.store.ids().into_iter().collect(),
        };

        let top_k = self.effective_limit(query);
        let ranked = self
            .timed(
                "embedding",
                self.config.timeouts.embed_seconds,
                self.index
                    .rank_by_similarity(&query.semantic_phrase, Some(&candidates), top_k),
            )
            .await?;

        let mut results = Vec::with_capacity(ranked.len());
        for (id, score) in ranked {
            match self.store.get(id) {
                Ok(doc) => results.push((doc, score)),
                Err(_) => debug!(%id, "skipping document removed during retrieval"),
            }
        }
        Ok(results)
    }

    fn effective_limit(&self, query: &StructuredQuery) -> Option<usize> {
        let stated = if self.config.enable_limit {
            query.limit.map(|n| n.get())
        } else {
            None
        };
        stated.or(self.config.default_k)
    }

    async fn timed<T, F>(&self, stage: &'static str, seconds: u64, fut: F) -> RetrievalResult<T>
    where
        F: Future<Output = RetrievalResult<T>>,
    {
        match tokio::time::timeout(Duration::from_secs(seconds), fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(stage, seconds, "stage timed out");
                Err(RetrievalError::Timeout { stage, seconds })
            }
        }
    }
}
