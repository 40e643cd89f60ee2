//! EmbeddingIndex: exact in-memory similarity ranking
//!
//! Holds a derived document id → vector cache. Each entry remembers a
//! fingerprint of the content it was computed from, so re-upserting unchanged
//! content never calls the embedder again. Removal drops the entry; a removed
//! id can never be ranked afterwards.

use super::embedder::{Embedder, EmbeddingError};
use super::hashing::fnv1a;
use crate::error::{RetrievalError, RetrievalResult};
use crate::store::DocumentId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Similarity metric used for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity, range [-1, 1]
    #[default]
    Cosine,
    /// `1 / (1 + L2 distance)`, range (0, 1]
    Euclidean,
}

impl DistanceMetric {
    /// Similarity score; higher means closer.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::Euclidean => {
                let dist: f32 = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + dist)
            }
        }
    }
}

/// Cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

struct IndexEntry {
    fingerprint: u64,
    vector: Vec<f32>,
}

/// Vector index over document content.
pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    metric: DistanceMetric,
    entries: DashMap<DocumentId, IndexEntry>,
    /// Fixed by the first vector stored
    dimension: OnceLock<usize>,
}

impl EmbeddingIndex {
    pub fn new(embedder: Arc<dyn Embedder>, metric: DistanceMetric) -> Self {
        Self {
            embedder,
            metric,
            entries: DashMap::new(),
            dimension: OnceLock::new(),
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Compute and store the vector for `id`, replacing any previous one.
    ///
    /// Returns `false` when the stored vector was already computed from the
    /// same content and the embedder was not called.
    pub async fn upsert(&self, id: DocumentId, content: &str) -> RetrievalResult<bool> {
        let embedded = self.upsert_batch(&[(id, content)]).await?;
        Ok(embedded == 1)
    }

    /// Upsert many documents with a single embedder call.
    ///
    /// Returns the number of vectors actually computed. Nothing is stored if
    /// the embedder fails.
    pub async fn upsert_batch(&self, items: &[(DocumentId, &str)]) -> RetrievalResult<usize> {
        let pending: Vec<(DocumentId, &str, u64)> = items
            .iter()
            .map(|(id, content)| (*id, *content, fingerprint(content)))
            .filter(|(id, _, fp)| {
                self.entries
                    .get(id)
                    .map_or(true, |entry| entry.fingerprint != *fp)
            })
            .collect();

        if pending.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = pending.iter().map(|(_, text, _)| *text).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            }
            .into());
        }
        for vector in &vectors {
            self.check_dimension(vector.len())?;
        }

        for ((id, _, fp), vector) in pending.iter().zip(vectors) {
            self.entries.insert(
                *id,
                IndexEntry {
                    fingerprint: *fp,
                    vector,
                },
            );
        }
        debug!(
            count = pending.len(),
            model = self.embedder.model_name(),
            "vectors upserted"
        );
        Ok(pending.len())
    }

    /// Drop the vector for `id`. Returns whether one was stored.
    pub fn remove(&self, id: DocumentId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Rank stored vectors against `query`.
    ///
    /// `candidates = None` ranks everything; an empty candidate set returns
    /// an empty ranking without calling the embedder. Results are ordered by
    /// descending score, ties by ascending id, and cut to `top_k` if given.
    pub async fn rank_by_similarity(
        &self,
        query: &str,
        candidates: Option<&HashSet<DocumentId>>,
        top_k: Option<usize>,
    ) -> RetrievalResult<Vec<(DocumentId, f32)>> {
        if candidates.map_or(false, |c| c.is_empty()) || top_k == Some(0) || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = self.embedder.embed_batch(&[query]).await?;
        let query_vector = vectors.pop().ok_or(EmbeddingError::EmptyResult)?;
        self.check_dimension(query_vector.len())?;

        let mut ranked: Vec<(DocumentId, f32)> = self
            .entries
            .iter()
            .filter(|entry| candidates.map_or(true, |c| c.contains(entry.key())))
            .map(|entry| (*entry.key(), self.metric.score(&query_vector, &entry.vector)))
            .collect();

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(k) = top_k {
            ranked.truncate(k);
        }
        Ok(ranked)
    }

    fn check_dimension(&self, actual: usize) -> RetrievalResult<()> {
        let expected = *self.dimension.get_or_init(|| actual);
        if expected != actual {
            return Err(RetrievalError::EmbeddingUnavailable(format!(
                "dimension mismatch: expected {}, got {}",
                expected, actual
            )));
        }
        Ok(())
    }
}

fn fingerprint(content: &str) -> u64 {
    fnv1a(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Shared call counter for verifying batching behavior.
    #[derive(Clone)]
    struct CallCounter(Arc<AtomicUsize>);

    impl CallCounter {
        fn new() -> Self {
            Self(Arc::new(AtomicUsize::new(0)))
        }
        fn get(&self) -> usize {
            self.0.load(Ordering::Relaxed)
        }
    }

    /// Mock embedder that returns predetermined vectors based on text.
    struct MockEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        calls: CallCounter,
        fail: bool,
    }

    impl MockEmbedder {
        fn new(pairs: Vec<(&str, Vec<f32>)>) -> (Self, CallCounter) {
            let calls = CallCounter::new();
            let vectors = pairs.into_iter().map(|(t, v)| (t.to_string(), v)).collect();
            (
                Self {
                    vectors,
                    calls: calls.clone(),
                    fail: false,
                },
                calls,
            )
        }

        fn failing() -> Self {
            Self {
                vectors: HashMap::new(),
                calls: CallCounter::new(),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        fn model_name(&self) -> &str {
            "mock"
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.0.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(EmbeddingError::ModelError("service down".to_string()));
            }
            Ok(texts
                .iter()
                .map(|t| self.vectors.get(*t).cloned().unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
                .collect())
        }
    }

    fn id(n: u64) -> DocumentId {
        DocumentId::from_raw(n)
    }

    async fn index_with_three() -> (EmbeddingIndex, CallCounter) {
        let (embedder, calls) = MockEmbedder::new(vec![
            ("north", vec![1.0, 0.0, 0.0]),
            ("north-east", vec![0.7, 0.7, 0.0]),
            ("east", vec![0.0, 1.0, 0.0]),
            ("query north", vec![1.0, 0.1, 0.0]),
        ]);
        let index = EmbeddingIndex::new(Arc::new(embedder), DistanceMetric::Cosine);
        index
            .upsert_batch(&[(id(1), "north"), (id(2), "north-east"), (id(3), "east")])
            .await
            .unwrap();
        (index, calls)
    }

    #[tokio::test]
    async fn ranks_by_descending_similarity() {
        let (index, _) = index_with_three().await;
        let ranked = index.rank_by_similarity("query north", None, None).await.unwrap();
        let ids: Vec<DocumentId> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(ids, vec![id(1), id(2), id(3)]);
        assert!(ranked[0].1 >= ranked[1].1 && ranked[1].1 >= ranked[2].1);
    }

    #[tokio::test]
    async fn candidate_set_restricts_ranking() {
        let (index, _) = index_with_three().await;
        let candidates: HashSet<DocumentId> = [id(2), id(3)].into_iter().collect();
        let ranked = index
            .rank_by_similarity("query north", Some(&candidates), Some(1))
            .await
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, id(2));
    }

    #[tokio::test]
    async fn empty_candidates_return_empty_without_embedding() {
        let (index, calls) = index_with_three().await;
        let before = calls.get();
        let ranked = index
            .rank_by_similarity("query north", Some(&HashSet::new()), None)
            .await
            .unwrap();
        assert!(ranked.is_empty());
        assert_eq!(calls.get(), before);
    }

    #[tokio::test]
    async fn ties_break_by_ascending_id() {
        let (embedder, _) = MockEmbedder::new(vec![("same", vec![1.0, 0.0, 0.0])]);
        let index = EmbeddingIndex::new(Arc::new(embedder), DistanceMetric::Cosine);
        index
            .upsert_batch(&[(id(9), "same"), (id(4), "same"), (id(6), "same")])
            .await
            .unwrap();
        let ranked = index.rank_by_similarity("same", None, None).await.unwrap();
        let ids: Vec<DocumentId> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(ids, vec![id(4), id(6), id(9)]);
    }

    #[tokio::test]
    async fn removed_ids_are_never_ranked() {
        let (index, _) = index_with_three().await;
        assert!(index.remove(id(1)));
        assert!(!index.remove(id(1)));
        let ranked = index.rank_by_similarity("query north", None, None).await.unwrap();
        assert!(ranked.iter().all(|(i, _)| *i != id(1)));
        assert_eq!(ranked.len(), 2);
    }

    #[tokio::test]
    async fn unchanged_content_is_not_re_embedded() {
        let (index, calls) = index_with_three().await;
        assert_eq!(calls.get(), 1);

        assert!(!index.upsert(id(1), "north").await.unwrap());
        assert_eq!(calls.get(), 1);

        assert!(index.upsert(id(1), "east").await.unwrap());
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn embedder_failure_propagates() {
        let index = EmbeddingIndex::new(Arc::new(MockEmbedder::failing()), DistanceMetric::Cosine);
        let err = index.upsert(id(1), "north").await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingUnavailable(_)));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let (embedder, _) = MockEmbedder::new(vec![
            ("wide", vec![1.0, 0.0, 0.0, 0.0]),
            ("narrow", vec![1.0, 0.0, 0.0]),
        ]);
        let index = EmbeddingIndex::new(Arc::new(embedder), DistanceMetric::Euclidean);
        index.upsert(id(1), "narrow").await.unwrap();
        let err = index.upsert(id(2), "wide").await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingUnavailable(_)));
        assert_eq!(index.dimension(), Some(3));
    }

    #[test]
    fn euclidean_score_is_one_for_identical_vectors() {
        let s = DistanceMetric::Euclidean.score(&[1.0, 2.0], &[1.0, 2.0]);
        assert!((s - 1.0).abs() < 1e-6);
        let far = DistanceMetric::Euclidean.score(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((far - 1.0 / 6.0).abs() < 1e-6);
    }
}
