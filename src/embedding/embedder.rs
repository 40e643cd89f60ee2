//! Embedder trait and backends
//!
//! Uses a trait-based embedding backend (`Embedder`) so production code can use
//! fastembed-rs while tests and the offline demo use the deterministic
//! `HashingEmbedder`.

use crate::error::RetrievalError;
use async_trait::async_trait;
use std::fmt;

/// Error type for embedding operations.
#[derive(Debug)]
pub enum EmbeddingError {
    /// The embedding model returned no results
    EmptyResult,
    /// The model returned a different number of vectors than texts
    CountMismatch { expected: usize, actual: usize },
    /// Model loading or inference failed
    ModelError(String),
}

impl fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingError::EmptyResult => write!(f, "embedding returned no results"),
            EmbeddingError::CountMismatch { expected, actual } => write!(
                f,
                "embedding returned {} vectors for {} texts",
                actual, expected
            ),
            EmbeddingError::ModelError(msg) => write!(f, "embedding model error: {}", msg),
        }
    }
}

impl std::error::Error for EmbeddingError {}

impl From<EmbeddingError> for RetrievalError {
    fn from(err: EmbeddingError) -> Self {
        RetrievalError::EmbeddingUnavailable(err.to_string())
    }
}

/// Trait for embedding text into vectors.
///
/// Implementations handle model loading and inference. Calls may be slow
/// (remote or ONNX inference), hence async.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifies the model, e.g. for logs.
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, returning one vector per text.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

// ---------------------------------------------------------------------------
// FastEmbedEmbedder: production embedder behind `embeddings` feature
// ---------------------------------------------------------------------------

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use super::{Embedder, EmbeddingError};
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Production embedder backed by fastembed (ONNX Runtime).
    ///
    /// Wraps `fastembed::TextEmbedding` in a `Mutex` because its `embed`
    /// method requires `&mut self`, while the `Embedder` trait uses `&self`.
    pub struct FastEmbedEmbedder {
        model: Mutex<TextEmbedding>,
        name: String,
    }

    impl FastEmbedEmbedder {
        /// Create a new FastEmbedEmbedder with a specific model.
        pub fn new(model: EmbeddingModel) -> Result<Self, EmbeddingError> {
            let name = format!("{:?}", model);
            let options = InitOptions::new(model).with_show_download_progress(false);
            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
            Ok(Self {
                model: Mutex::new(embedding),
                name,
            })
        }

        /// Create a new FastEmbedEmbedder with the default model (nomic-embed-text-v1.5).
        pub fn default_model() -> Result<Self, EmbeddingError> {
            Self::new(EmbeddingModel::NomicEmbedTextV15)
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedEmbedder {
        fn model_name(&self) -> &str {
            &self.name
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let mut model = self
                .model
                .lock()
                .map_err(|_| EmbeddingError::ModelError("model lock poisoned".to_string()))?;
            let embeddings = model
                .embed(texts.to_vec(), None)
                .map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
            if embeddings.is_empty() {
                return Err(EmbeddingError::EmptyResult);
            }
            Ok(embeddings)
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;
