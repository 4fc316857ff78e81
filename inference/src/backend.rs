use crate::{classifier::KeywordClassifier, Result, ScoreResult, ScoringError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag passed alongside each unit of scoring work.
///
/// Cancellation is cooperative: setting the flag asks the work to stop, but a
/// backend that never checks it simply runs to completion and its result is
/// thrown away by whoever gave up waiting.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Anything that can turn normalized text into a sentiment judgment.
///
/// Calls are blocking and are expected to run on a worker thread, never on
/// the async executor. Implementations must be thread-safe so a single
/// backend can serve every worker.
pub trait ScoringBackend: Send + Sync {
    fn name(&self) -> &str;

    fn is_loaded(&self) -> bool;

    fn score(&self, text: &str) -> Result<ScoreResult>;

    /// Element-wise, order-preserving batch scoring.
    fn score_batch(&self, texts: &[String]) -> Result<Vec<ScoreResult>> {
        texts.iter().map(|text| self.score(text)).collect()
    }

    /// Batch scoring that may stop early once `cancel` is set. The default
    /// only checks the token before starting.
    fn score_batch_cancellable(&self, texts: &[String], cancel: &CancelToken) -> Result<Vec<ScoreResult>> {
        if cancel.is_cancelled() {
            return Err(ScoringError::Cancelled);
        }
        self.score_batch(texts)
    }
}

/// Try to construct the real model backend named by `model_name`.
#[cfg(feature = "onnx")]
pub fn load_backend(model_name: &str) -> Result<Arc<dyn ScoringBackend>> {
    let backend = crate::inference::OnnxSentimentBackend::new(std::path::Path::new(model_name))?;
    Ok(Arc::new(backend))
}

/// Try to construct the real model backend named by `model_name`.
#[cfg(not(feature = "onnx"))]
pub fn load_backend(model_name: &str) -> Result<Arc<dyn ScoringBackend>> {
    Err(ScoringError::Unavailable(format!(
        "cannot load model '{}': built without the `onnx` feature",
        model_name
    )))
}

/// The backend chosen for serving, and why the fallback was used if it was.
#[derive(Clone)]
pub struct BackendSelection {
    pub backend: Arc<dyn ScoringBackend>,
    pub fallback_reason: Option<String>,
}

impl BackendSelection {
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

impl std::fmt::Debug for BackendSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSelection")
            .field("backend", &self.backend.name())
            .field("fallback_reason", &self.fallback_reason)
            .finish()
    }
}

/// Keep a successfully constructed backend, otherwise substitute the keyword
/// classifier and remember the construction error.
pub fn select_backend(attempt: Result<Arc<dyn ScoringBackend>>) -> BackendSelection {
    match attempt {
        Ok(backend) => BackendSelection {
            backend,
            fallback_reason: None,
        },
        Err(e) => BackendSelection {
            backend: Arc::new(KeywordClassifier::new()),
            fallback_reason: Some(e.to_string()),
        },
    }
}
