//! Scripted book translator for integration tests
//!
//! Stands in for the language model: each rule is a regex over the user
//! query and a template producing the JSON a well-behaved model would answer
//! with. Captures are substituted as `$1`, `$2`, ...

use async_trait::async_trait;
use regex_lite::Regex;
use selfquery::{LanguageModel, ModelError, Prompt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

struct Rule {
    pattern: Regex,
    template: String,
}

pub struct BookTranslatorModel {
    rules: Vec<Rule>,
    calls: AtomicUsize,
    strict_calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl Default for BookTranslatorModel {
    fn default() -> Self {
        Self::new()
    }
}

impl BookTranslatorModel {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: AtomicUsize::new(0),
            strict_calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Translations for the queries the scenario tests ask.
    pub fn books() -> Self {
        Self::new()
            .rule(
                r"(?i)come from the usa",
                r#"{"query": "", "filter": "eq(\"country\", \"USA\")", "limit": null}"#,
            )
            .rule(
                r"(?i)^what are (\w+) books that have a rating above ([0-9.]+)",
                r#"```json
{"query": "", "filter": "gt(\"rating\", $2)", "limit": "$1"}
```"#,
            )
            .rule(
                r"(?i)gripping adventure",
                r#"{"query": "", "filter": "NO_FILTER", "limit": null}"#,
            )
            .rule(
                r"(?i)fables? written in (\w+)",
                r#"Here is the structured request:
{"query": "fable", "filter": "and(contain(\"genre\", \"fable\"), eq(\"language\", \"$1\"))", "limit": null}"#,
            )
            .rule(
                r"(?i)published before (\d{4}) and not in english",
                r#"{"query": "", "filter": "and(lt(\"year\", $1), ne(\"language\", \"English\"))"}"#,
            )
            .rule(
                r"(?i)murder",
                r#"{"query": "murder and guilt", "filter": "nin(\"country\", [\"USA\"])"}"#,
            )
            .rule(
                r"(?i)by a publisher",
                r#"{"query": "", "filter": "eq(\"publisher\", \"Penguin\")"}"#,
            )
            .rule(
                r"(?i)from mars",
                r#"{"query": "", "filter": "eq(\"country\", \"Mars\")"}"#,
            )
    }

    pub fn rule(mut self, pattern: &str, template: &str) -> Self {
        self.rules.push(Rule {
            pattern: Regex::new(pattern).expect("valid test regex"),
            template: template.to_string(),
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn strict_calls(&self) -> usize {
        self.strict_calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn answer(&self, query: &str) -> Option<String> {
        self.rules.iter().find_map(|rule| {
            rule.pattern.captures(query).map(|caps| {
                let mut out = rule.template.clone();
                for i in (1..caps.len()).rev() {
                    let value = caps.get(i).map(|m| m.as_str()).unwrap_or("");
                    out = out.replace(&format!("${}", i), &number_word(value));
                }
                out
            })
        })
    }
}

fn number_word(word: &str) -> String {
    match word.to_lowercase().as_str() {
        "one" => "1".to_string(),
        "two" => "2".to_string(),
        "three" => "3".to_string(),
        "four" => "4".to_string(),
        "five" => "5".to_string(),
        _ => word.to_string(),
    }
}

#[async_trait]
impl LanguageModel for BookTranslatorModel {
    async fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.strict {
            self.strict_calls.fetch_add(1, Ordering::SeqCst);
        }
        self.queries.lock().unwrap().push(prompt.query.clone());

        self.answer(&prompt.query)
            .ok_or_else(|| ModelError::InvocationFailed(format!("no script for '{}'", prompt.query)))
    }
}
