//! Error taxonomy for self-querying retrieval

use crate::store::DocumentId;
use thiserror::Error;

/// Errors surfaced by the retrieval pipeline.
///
/// Everything except `TranslationInvalid` reaches the caller of
/// `SelfQueryRetriever::retrieve` unchanged; `TranslationInvalid` is retried
/// once with a stricter prompt before it surfaces.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Metadata names a field the schema does not declare, or omits a required one.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// A value's runtime type does not fit the declared type or operator.
    #[error("Type mismatch on field '{field}': {detail}")]
    TypeMismatch { field: String, detail: String },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Duplicate field: {0}")]
    DuplicateField(String),

    /// The translator produced an out-of-schema predicate or an unusable limit.
    #[error("Translation invalid: {0}")]
    TranslationInvalid(String),

    /// The language model could not be reached or failed to answer.
    #[error("Translator unavailable: {0}")]
    TranslatorUnavailable(String),

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },
}

impl RetrievalError {
    pub(crate) fn type_mismatch(field: impl Into<String>, detail: impl Into<String>) -> Self {
        RetrievalError::TypeMismatch {
            field: field.into(),
            detail: detail.into(),
        }
    }
}

/// Result type for retrieval operations
pub type RetrievalResult<T> = Result<T, RetrievalError>;
