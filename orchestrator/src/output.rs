use chrono::{DateTime, Utc};
use sentiment_orchestrator::{ModelInfo, PredictionRecord, RunError, TextFeatures};
use serde::Serialize;
use uuid::Uuid;

const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub text: String,
    #[serde(flatten)]
    pub record: PredictionRecord,
}

impl PredictionResponse {
    pub fn new(model: &str, text: &str, record: PredictionRecord) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            model: model.to_string(),
            text: preview(text),
            record,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchPredictionResponse {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub count: usize,
    pub total_processing_time_ms: f64,
    pub results: Vec<BatchItem>,
}

#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub text: String,
    #[serde(flatten)]
    pub record: PredictionRecord,
}

impl BatchPredictionResponse {
    pub fn new<S: AsRef<str>>(model: &str, texts: &[S], records: Vec<PredictionRecord>) -> Self {
        let total_processing_time_ms = records.iter().map(|r| r.processing_time_ms()).sum();
        let results: Vec<BatchItem> = texts
            .iter()
            .zip(records)
            .map(|(text, record)| BatchItem {
                text: preview(text.as_ref()),
                record,
            })
            .collect();

        Self {
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            model: model.to_string(),
            count: results.len(),
            total_processing_time_ms,
            results,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeaturesResponse {
    pub text: String,
    #[serde(flatten)]
    pub features: TextFeatures,
}

impl FeaturesResponse {
    pub fn new(text: &str, features: TextFeatures) -> Self {
        Self {
            text: preview(text),
            features,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub info: ModelInfo,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: String,
    pub kind: &'static str,
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn from_run_error(error: &RunError) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            error: error.to_string(),
            kind: error.kind(),
            retryable: error.is_retryable(),
        }
    }
}

/// First `PREVIEW_CHARS` characters of `text`, with "..." when cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn render<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}
