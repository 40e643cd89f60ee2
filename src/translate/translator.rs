//! Query translation through a language model
//!
//! The model answers with JSON holding a search phrase, a filter written in
//! the textual grammar of `crate::filter::parse`, and an optional limit. The
//! answer is parsed in stages (JSON extraction, filter grammar, schema
//! validation) and any stage failing yields `TranslationInvalid`.

use super::prompt::PromptBuilder;
use super::query::StructuredQuery;
use crate::error::{RetrievalError, RetrievalResult};
use crate::filter::parse_filter;
use crate::model::LanguageModel;
use crate::schema::SchemaRegistry;
use async_trait::async_trait;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Turns natural-language queries into structured ones.
#[async_trait]
pub trait QueryTranslator: Send + Sync {
    /// Translate `query` against `schema`.
    ///
    /// `strict` asks for the tighter instruction set used when a previous
    /// translation of the same query was rejected.
    async fn translate(
        &self,
        query: &str,
        schema: &SchemaRegistry,
        content_description: &str,
        strict: bool,
    ) -> RetrievalResult<StructuredQuery>;
}

/// Translator backed by a `LanguageModel`.
pub struct ModelTranslator {
    model: Arc<dyn LanguageModel>,
    enable_limit: bool,
}

impl ModelTranslator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            enable_limit: true,
        }
    }

    /// When disabled, limits are neither requested nor kept.
    pub fn with_limit(mut self, enable: bool) -> Self {
        self.enable_limit = enable;
        self
    }
}

#[async_trait]
impl QueryTranslator for ModelTranslator {
    async fn translate(
        &self,
        query: &str,
        schema: &SchemaRegistry,
        content_description: &str,
        strict: bool,
    ) -> RetrievalResult<StructuredQuery> {
        let prompt = PromptBuilder::new(schema, content_description)
            .enable_limit(self.enable_limit)
            .build(query, strict);
        debug!(
            prompt_chars = prompt.instructions.len(),
            strict, "requesting translation"
        );

        let text = self.model.complete(&prompt).await?;
        let mut structured = parse_translation(&text, query, schema)?;
        if !self.enable_limit {
            structured.limit = None;
        }

        debug!(%structured, "translation accepted");
        Ok(structured)
    }
}

/// Parse raw model output into a schema-valid `StructuredQuery`.
///
/// `original_query` becomes the semantic phrase when the model found no
/// filterable intent and returned an empty phrase.
pub fn parse_translation(
    text: &str,
    original_query: &str,
    schema: &SchemaRegistry,
) -> RetrievalResult<StructuredQuery> {
    let json = extract_json(text).ok_or_else(|| {
        RetrievalError::TranslationInvalid(format!("no JSON object in model output: {}", preview(text)))
    })?;

    let semantic_phrase = match json.get("query") {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(other) => {
            return Err(RetrievalError::TranslationInvalid(format!(
                "'query' must be a string, got {}",
                other
            )))
        }
    };

    let filter = match json.get("filter") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => parse_filter(s)
            .map_err(|e| RetrievalError::TranslationInvalid(format!("filter {}", e)))?,
        Some(other) => {
            return Err(RetrievalError::TranslationInvalid(format!(
                "'filter' must be a string, got {}",
                other
            )))
        }
    };

    if let Some(predicate) = &filter {
        predicate
            .validate(schema)
            .map_err(|e| RetrievalError::TranslationInvalid(e.to_string()))?;
    }

    let limit = parse_limit(json.get("limit"))?;

    let semantic_phrase = if semantic_phrase.is_empty() && filter.is_none() {
        original_query.trim().to_string()
    } else {
        semantic_phrase
    };

    Ok(StructuredQuery {
        semantic_phrase,
        filter,
        limit,
    })
}

/// Limits may arrive as numbers or numeric strings; anything else, zero, or
/// a negative count is invalid.
fn parse_limit(value: Option<&serde_json::Value>) -> RetrievalResult<Option<NonZeroUsize>> {
    let raw = match value {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(serde_json::Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    let invalid = || {
        RetrievalError::TranslationInvalid(format!(
            "limit must be a positive integer, got {}",
            value.map(|v| v.to_string()).unwrap_or_default()
        ))
    };
    let n = raw.ok_or_else(invalid)?;
    let n = usize::try_from(n).map_err(|_| invalid())?;
    NonZeroUsize::new(n).map(Some).ok_or_else(invalid)
}

/// Extract a JSON object from model output.
///
/// Tries, in order: the whole text, a fenced code block, and the span from
/// the first `{` to the last `}`.
pub(crate) fn extract_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }

    let fenced = if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        after.find("```").map(|end| &after[..end])
    } else if let Some(start) = trimmed.find("```\n") {
        let after = &trimmed[start + 4..];
        after.find("```").map(|end| &after[..end])
    } else {
        None
    };

    if let Some(block) = fenced {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(block.trim()) {
            if v.is_object() {
                return Some(v);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(&trimmed[start..=end]) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
    }

    None
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(80).collect();
    if text.chars().count() > 80 {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Predicate;
    use crate::model::{MockModel, ModelError};
    use crate::schema::{AttributeSpec, ValueType};

    fn books() -> SchemaRegistry {
        SchemaRegistry::from_attributes(vec![
            AttributeSpec::new("title", "The title of the book", ValueType::String),
            AttributeSpec::new("year", "The year the book was published", ValueType::Integer),
            AttributeSpec::new("genre", "The genres of the book", ValueType::StringList),
            AttributeSpec::new("rating", "The rating of the book", ValueType::Float),
            AttributeSpec::new("country", "The country of origin", ValueType::String),
        ])
        .unwrap()
    }

    #[test]
    fn extract_json_direct() {
        let v = extract_json(r#"{"query": "x"}"#).unwrap();
        assert_eq!(v["query"], "x");
    }

    #[test]
    fn extract_json_fenced() {
        let text = "Here you go:\n```json\n{\"query\": \"x\", \"filter\": \"NO_FILTER\"}\n```\n";
        let v = extract_json(text).unwrap();
        assert_eq!(v["filter"], "NO_FILTER");
    }

    #[test]
    fn extract_json_surrounded_by_prose() {
        let v = extract_json(r#"Sure! {"query": "x", "limit": 2} Hope that helps."#).unwrap();
        assert_eq!(v["limit"], 2);
    }

    #[test]
    fn extract_json_rejects_non_objects() {
        assert!(extract_json("[1, 2]").is_none());
        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn country_filter_parses_and_validates() {
        let sq = parse_translation(
            r#"{"query": "", "filter": "eq(\"country\", \"USA\")"}"#,
            "What books come from the USA?",
            &books(),
        )
        .unwrap();
        assert_eq!(sq.semantic_phrase, "");
        assert_eq!(sq.filter, Some(Predicate::eq("country", "USA")));
        assert_eq!(sq.limit, None);
    }

    #[test]
    fn limit_is_read_from_number_or_string() {
        let schema = books();
        let sq = parse_translation(
            r#"{"query": "", "filter": "gt(\"rating\", 4.8)", "limit": 2}"#,
            "q",
            &schema,
        )
        .unwrap();
        assert_eq!(sq.limit, NonZeroUsize::new(2));

        let sq = parse_translation(r#"{"query": "x", "filter": null, "limit": "3"}"#, "q", &schema)
            .unwrap();
        assert_eq!(sq.limit, NonZeroUsize::new(3));
    }

    #[test]
    fn non_positive_limit_is_invalid() {
        let schema = books();
        for limit in ["0", "-1", "1.5", "\"many\"", "[2]"] {
            let text = format!(r#"{{"query": "x", "filter": "NO_FILTER", "limit": {}}}"#, limit);
            let err = parse_translation(&text, "q", &schema).unwrap_err();
            assert!(
                matches!(err, RetrievalError::TranslationInvalid(_)),
                "limit {} gave {:?}",
                limit,
                err
            );
        }
    }

    #[test]
    fn deeply_nested_filter_is_invalid() {
        let filter = format!(
            "{}eq(\"country\", \"USA\"){}",
            "not(".repeat(1_000),
            ")".repeat(1_000)
        );
        let text = serde_json::json!({"query": "x", "filter": filter}).to_string();
        let err = parse_translation(&text, "q", &books()).unwrap_err();
        assert!(matches!(err, RetrievalError::TranslationInvalid(_)));
    }

    #[test]
    fn no_filter_with_empty_phrase_uses_full_query() {
        let sq = parse_translation(
            r#"{"query": "", "filter": "NO_FILTER"}"#,
            "a gripping adventure story",
            &books(),
        )
        .unwrap();
        assert_eq!(sq.semantic_phrase, "a gripping adventure story");
        assert!(sq.filter.is_none());
    }

    #[test]
    fn unknown_field_is_translation_invalid() {
        let err = parse_translation(
            r#"{"query": "", "filter": "eq(\"publisher\", \"Penguin\")"}"#,
            "q",
            &books(),
        )
        .unwrap_err();
        assert!(matches!(err, RetrievalError::TranslationInvalid(msg) if msg.contains("publisher")));
    }

    #[test]
    fn operator_type_mismatch_is_translation_invalid() {
        let err = parse_translation(
            r#"{"query": "", "filter": "gt(\"country\", \"USA\")"}"#,
            "q",
            &books(),
        )
        .unwrap_err();
        assert!(matches!(err, RetrievalError::TranslationInvalid(_)));
    }

    #[test]
    fn unparsable_filter_is_translation_invalid() {
        let err = parse_translation(
            r#"{"query": "", "filter": "eq(\"country\""}"#,
            "q",
            &books(),
        )
        .unwrap_err();
        assert!(matches!(err, RetrievalError::TranslationInvalid(_)));
    }

    #[tokio::test]
    async fn translator_calls_model_with_rendered_prompt() {
        let model = Arc::new(MockModel::available().with_response(
            "usa",
            r#"```json
{"query": "", "filter": "eq(\"country\", \"USA\")", "limit": null}
```"#,
        ));
        let translator = ModelTranslator::new(model.clone());

        let sq = translator
            .translate("What books come from the USA?", &books(), "Brief summary of a book", false)
            .await
            .unwrap();

        assert_eq!(sq.filter, Some(Predicate::eq("country", "USA")));
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].query, "What books come from the USA?");
        assert!(prompts[0].instructions.contains("Brief summary of a book"));
    }

    #[tokio::test]
    async fn disabled_limit_is_dropped() {
        let model = Arc::new(
            MockModel::available().with_fallback(r#"{"query": "books", "filter": "NO_FILTER", "limit": 2}"#),
        );
        let translator = ModelTranslator::new(model).with_limit(false);

        let sq = translator.translate("two books", &books(), "books", false).await.unwrap();
        assert_eq!(sq.limit, None);
    }

    #[tokio::test]
    async fn model_failure_is_translator_unavailable() {
        let model = Arc::new(MockModel::unavailable());
        let translator = ModelTranslator::new(model);

        let err = translator.translate("q", &books(), "books", false).await.unwrap_err();
        assert!(matches!(err, RetrievalError::TranslatorUnavailable(_)));

        let model = Arc::new(
            MockModel::available().with_failure("q", ModelError::ParseError("bad".to_string())),
        );
        let err = ModelTranslator::new(model)
            .translate("q", &books(), "books", false)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::TranslatorUnavailable(_)));
    }
}
