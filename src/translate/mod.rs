//! Query Translator: natural language → StructuredQuery
//!
//! Builds the prompt, calls the language model and validates what comes back
//! against the schema before anything downstream sees it.

mod prompt;
mod query;
mod translator;

pub use prompt::PromptBuilder;
pub use query::StructuredQuery;
pub use translator::{parse_translation, ModelTranslator, QueryTranslator};
