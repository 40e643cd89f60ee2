//! Language model client: the query-understanding collaborator
//!
//! Defines the client trait the translator calls. Two implementations:
//! - `SubprocessModel`: spawns an MCP server (e.g. `llm-orc mcp serve`) and
//!   invokes an ensemble over JSON-RPC (production)
//! - `MockModel`: returns scripted responses (testing)

mod mock;
mod subprocess;

pub use mock::MockModel;
pub use subprocess::{AgentResult, InvokeResponse, SubprocessModel, SubprocessModelConfig};

use crate::error::RetrievalError;
use async_trait::async_trait;

/// Errors from language model operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("model not available: {0}")]
    Unavailable(String),
    #[error("invocation failed: {0}")]
    InvocationFailed(String),
    #[error("response parse error: {0}")]
    ParseError(String),
}

impl From<ModelError> for RetrievalError {
    fn from(err: ModelError) -> Self {
        RetrievalError::TranslatorUnavailable(err.to_string())
    }
}

/// A rendered translation prompt.
///
/// `instructions` carries everything except the user's query so that chat
/// style backends can send them as separate messages, and so scripted test
/// models can match on the query alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub instructions: String,
    pub query: String,
    /// Set on the retry that follows an invalid translation
    pub strict: bool,
}

impl Prompt {
    /// Single-string form for completion-style backends.
    pub fn render(&self) -> String {
        format!(
            "{}\n\n<< User Query >>\n{}\n\nStructured Request:\n",
            self.instructions, self.query
        )
    }
}

/// Client trait for the language model.
///
/// Abstracts over transport (subprocess, HTTP, mock) so the translator does
/// not depend on how the model is reached.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Check if the model is reachable.
    async fn is_available(&self) -> bool;

    /// Complete a prompt, returning the raw model text.
    async fn complete(&self, prompt: &Prompt) -> Result<String, ModelError>;
}
