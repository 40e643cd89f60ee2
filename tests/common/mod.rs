//! Shared fixtures for the integration tests
//!
//! The nine-book corpus, a scripted translator model and a counting embedder.

#![allow(dead_code)]

pub mod books;
pub mod embedder;
pub mod mock_model;

pub use books::{book_documents, book_schema, BOOKS, CONTENT_DESCRIPTION};
pub use embedder::{CountingEmbedder, EmbedGate};
pub use mock_model::BookTranslatorModel;

use selfquery::{RetrieverConfig, SelfQueryRetriever};
use std::sync::Arc;

/// A retriever loaded with the nine books.
pub async fn book_retriever(
    model: Arc<BookTranslatorModel>,
    embedder: CountingEmbedder,
    config: RetrieverConfig,
) -> SelfQueryRetriever {
    let retriever = SelfQueryRetriever::with_model(
        Arc::new(book_schema()),
        Arc::new(embedder),
        model,
        config,
    );
    retriever
        .add_documents(book_documents())
        .await
        .expect("sample corpus ingests");
    retriever
}

pub fn default_config() -> RetrieverConfig {
    RetrieverConfig::new(CONTENT_DESCRIPTION)
}

/// Titles of the returned documents, in order.
pub fn titles(docs: &[selfquery::Document]) -> Vec<String> {
    docs.iter()
        .map(|d| d.text_field("title").unwrap_or_default().to_string())
        .collect()
}
