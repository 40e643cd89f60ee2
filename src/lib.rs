//! Selfquery: Self-Querying Retrieval over a Metadata + Vector Store
//!
//! Turns a natural-language query into a semantic search phrase plus a typed
//! metadata filter, then answers it by filtering documents on their metadata
//! and ranking the survivors by embedding similarity.
//!
//! # Core Concepts
//!
//! - **Schema**: the filterable attributes, each with a name, description and value type
//! - **Documents**: free-text content plus a schema-conforming metadata record
//! - **Predicates**: `and`/`or`/`not` trees of typed comparisons over metadata
//! - **Translator**: a language model that turns queries into `StructuredQuery`s
//!
//! # Example
//!
//! ```
//! use selfquery::{AttributeSpec, Predicate, SchemaRegistry, ValueType};
//!
//! let schema = SchemaRegistry::from_attributes(vec![
//!     AttributeSpec::new("country", "Country of origin", ValueType::String),
//! ])
//! .unwrap();
//! assert!(Predicate::eq("country", "USA").validate(&schema).is_ok());
//! ```

pub mod config;
pub mod embedding;
mod error;
pub mod filter;
pub mod model;
mod retriever;
pub mod schema;
pub mod store;
pub mod translate;

pub use config::{Corpus, CorpusDocument, ConfigError, RetrieverConfig, SelfQueryConfig, TimeoutConfig};
pub use embedding::{DistanceMetric, Embedder, EmbeddingError, EmbeddingIndex, HashingEmbedder};
pub use error::{RetrievalError, RetrievalResult};
pub use filter::{evaluate, parse_filter, Comparator, Literal, Predicate};
pub use model::{LanguageModel, MockModel, ModelError, Prompt, SubprocessModel};
pub use retriever::SelfQueryRetriever;
pub use schema::{AttributeSpec, SchemaRegistry, ValueType};
pub use store::{Document, DocumentId, DocumentStore, Metadata, MetadataValue};
pub use translate::{ModelTranslator, QueryTranslator, StructuredQuery};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
