//! Document storage

mod document;
mod documents;
mod value;

pub use document::{Document, DocumentId, Metadata};
pub use documents::DocumentStore;
pub use value::MetadataValue;
