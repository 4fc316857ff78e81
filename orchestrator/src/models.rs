use crate::state::ServiceState;
use inference::{ScoreResult, SentimentLabel};
use serde::Serialize;

/// Outcome of one successful inference call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    label: SentimentLabel,
    confidence: f64,
    #[serde(rename = "sentiment_score")]
    signed_score: f64,
    processing_time_ms: f64,
}

impl PredictionRecord {
    pub fn new(score: ScoreResult, processing_time_ms: f64) -> Self {
        Self {
            label: score.label(),
            confidence: score.confidence(),
            signed_score: score.signed_score(),
            processing_time_ms: processing_time_ms.max(0.0),
        }
    }

    pub fn label(&self) -> SentimentLabel {
        self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn signed_score(&self) -> f64 {
        self.signed_score
    }

    /// Wall-clock time spent on this record. For batch calls this is the
    /// batch total divided evenly across its items.
    pub fn processing_time_ms(&self) -> f64 {
        self.processing_time_ms
    }
}

/// Snapshot of what an orchestrator is serving.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub backend: Option<String>,
    pub fallback: bool,
    pub fallback_reason: Option<String>,
    pub state: ServiceState,
    pub is_ready: bool,
    pub max_sequence_length: usize,
    pub batch_size: usize,
    pub worker_pool_size: usize,
}
