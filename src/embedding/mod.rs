//! Text embeddings and the similarity index built on them

mod embedder;
mod hashing;
mod index;

pub use embedder::{Embedder, EmbeddingError};
pub use hashing::{HashingEmbedder, DEFAULT_DIMENSION};
pub use index::{DistanceMetric, EmbeddingIndex};

#[cfg(feature = "embeddings")]
pub use embedder::FastEmbedEmbedder;
