//! Call-counting embedder with a failure switch and a pause gate

use async_trait::async_trait;
use selfquery::{Embedder, EmbeddingError, HashingEmbedder};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Wraps `HashingEmbedder`, counting batches and texts.
#[derive(Clone, Default)]
pub struct CountingEmbedder {
    inner: Arc<HashingEmbedder>,
    batches: Arc<AtomicUsize>,
    texts: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    gate: Arc<Mutex<Option<EmbedGate>>>,
}

/// Pauses one embedder call until released.
#[derive(Clone, Default)]
pub struct EmbedGate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl EmbedGate {
    /// Wait until the held call has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held call finish.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    /// Hold the next call until the returned gate is released.
    pub fn hold_next(&self) -> EmbedGate {
        let gate = EmbedGate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Make every following call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn model_name(&self) -> &str {
        "counting-hashing"
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        let held = self.gate.lock().unwrap().take();
        if let Some(gate) = held {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::ModelError("embedder switched off".to_string()));
        }
        self.inner.embed_batch(texts).await
    }
}
