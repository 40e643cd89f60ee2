//! Mock model for testing: returns preconfigured responses.

use super::{LanguageModel, ModelError, Prompt};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Respond when the query contains the pattern (case-insensitive)
struct Rule {
    pattern: String,
    response: Result<String, ModelError>,
}

/// Scripted language model.
///
/// Responses are chosen in this order: the next queued response (see
/// `with_sequence`), then the first matching rule, then the fallback.
pub struct MockModel {
    available: bool,
    rules: Vec<Rule>,
    queue: Mutex<VecDeque<Result<String, ModelError>>>,
    fallback: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

impl MockModel {
    /// Create a mock model that reports as available.
    pub fn available() -> Self {
        Self {
            available: true,
            rules: Vec::new(),
            queue: Mutex::new(VecDeque::new()),
            fallback: None,
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock model that reports as unavailable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    /// Respond with `response` to queries containing `pattern`.
    pub fn with_response(mut self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into().to_lowercase(),
            response: Ok(response.into()),
        });
        self
    }

    /// Fail queries containing `pattern`.
    pub fn with_failure(mut self, pattern: impl Into<String>, error: ModelError) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into().to_lowercase(),
            response: Err(error),
        });
        self
    }

    /// Queue responses returned one per call, before any rule applies.
    pub fn with_sequence(self, responses: Vec<&str>) -> Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(responses.into_iter().map(|r| Ok(r.to_string())));
        }
        self
    }

    /// Response used when nothing else matches.
    pub fn with_fallback(mut self, response: impl Into<String>) -> Self {
        self.fallback = Some(response.into());
        self
    }

    /// Sleep before answering (for timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Every prompt received, in order
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn respond(&self, query: &str) -> Result<String, ModelError> {
        if let Some(next) = self.queue.lock().ok().and_then(|mut q| q.pop_front()) {
            return next;
        }

        let query = query.to_lowercase();
        if let Some(rule) = self.rules.iter().find(|r| query.contains(r.pattern.as_str())) {
            return rule.response.clone();
        }

        self.fallback.clone().ok_or_else(|| {
            ModelError::InvocationFailed(format!("no mock response for query '{}'", query))
        })
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if !self.available {
            return Err(ModelError::Unavailable(
                "mock model configured as unavailable".to_string(),
            ));
        }

        self.respond(&prompt.query)
    }
}
