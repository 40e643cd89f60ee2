//! Configuration: retriever settings, YAML config files and demo corpora

use crate::embedding::DistanceMetric;
use crate::error::RetrievalError;
use crate::model::SubprocessModelConfig;
use crate::schema::{AttributeSpec, SchemaRegistry};
use crate::store::Metadata;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading configuration files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid schema: {0}")]
    Schema(#[from] RetrievalError),
}

/// Per-stage timeouts in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub translate_seconds: u64,
    pub embed_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            translate_seconds: 30,
            embed_seconds: 30,
        }
    }
}

/// Settings for `SelfQueryRetriever`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// What the document contents are, shown to the translator
    pub content_description: String,
    /// Keep limits stated in the query ("two books")
    pub enable_limit: bool,
    /// Rank on the raw query instead of the translated phrase
    pub use_original_query: bool,
    /// Cap applied when the query states no limit
    pub default_k: Option<usize>,
    pub metric: DistanceMetric,
    /// Retry once with a stricter prompt when a translation is rejected
    pub retry_on_invalid: bool,
    pub timeouts: TimeoutConfig,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            content_description: "Document contents".to_string(),
            enable_limit: true,
            use_original_query: false,
            default_k: None,
            metric: DistanceMetric::Cosine,
            retry_on_invalid: true,
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl RetrieverConfig {
    pub fn new(content_description: impl Into<String>) -> Self {
        Self {
            content_description: content_description.into(),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, enable: bool) -> Self {
        self.enable_limit = enable;
        self
    }

    pub fn with_original_query(mut self, enable: bool) -> Self {
        self.use_original_query = enable;
        self
    }

    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = Some(k);
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry_on_invalid = retry;
        self
    }

    pub fn with_timeouts(mut self, translate_seconds: u64, embed_seconds: u64) -> Self {
        self.timeouts = TimeoutConfig {
            translate_seconds,
            embed_seconds,
        };
        self
    }
}

/// Contents of a `config.yaml` file.
///
/// ```yaml
/// retriever:
///   content_description: Brief summary of a book
/// model:
///   command: llm-orc
///   ensemble: self-query
/// attributes:
///   - name: year
///     description: The year the book was published
///     type: integer
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfQueryConfig {
    pub retriever: RetrieverConfig,
    pub model: SubprocessModelConfig,
    pub attributes: Vec<AttributeSpec>,
}

impl SelfQueryConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read(path)?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Build the schema registry from the declared attributes.
    pub fn schema(&self) -> Result<SchemaRegistry, ConfigError> {
        Ok(SchemaRegistry::from_attributes(self.attributes.clone())?)
    }
}

/// One entry of a corpus file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A `documents:` list loaded from YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    pub documents: Vec<CorpusDocument>,
}

impl Corpus {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read(path)?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// `~/.config/selfquery/config.yaml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("selfquery").join("config.yaml"))
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
