pub mod backend;
pub mod classifier;
pub mod error;

#[cfg(feature = "onnx")]
pub mod inference;
#[cfg(feature = "onnx")]
pub mod model;
#[cfg(feature = "onnx")]
pub mod tokenizer;

use serde::Serialize;
use std::fmt;

pub use backend::{load_backend, select_backend, BackendSelection, CancelToken, ScoringBackend};
pub use classifier::KeywordClassifier;
pub use error::{Result, ScoringError};

#[cfg(feature = "onnx")]
pub use inference::OnnxSentimentBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Map a model label name onto the three sentiment classes.
    /// Anything other than positive/negative is treated as neutral.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" => SentimentLabel::Positive,
            "negative" | "neg" => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Negative => "NEGATIVE",
            SentimentLabel::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single sentiment judgment.
///
/// The sign of `signed_score` always agrees with `label`: positive results
/// carry `+confidence`, negative results `-confidence`, and neutral results
/// are pinned to confidence 0.5 with a score of exactly zero. Fields are
/// private so a result can only be built through the checked constructors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreResult {
    label: SentimentLabel,
    confidence: f64,
    signed_score: f64,
}

impl ScoreResult {
    pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

    /// Build a result from a label and a confidence in `[0, 1]`.
    ///
    /// Positive and negative labels need a strictly positive confidence so the
    /// signed score cannot collapse to zero. A neutral label ignores the given
    /// confidence.
    pub fn new(label: SentimentLabel, confidence: f64) -> Result<Self> {
        if label == SentimentLabel::Neutral {
            return Ok(Self::neutral());
        }

        if !confidence.is_finite() || confidence <= 0.0 || confidence > 1.0 {
            return Err(ScoringError::InvalidInput(format!(
                "confidence {} out of range (0, 1] for {} result",
                confidence, label
            )));
        }

        Ok(match label {
            SentimentLabel::Positive => Self::positive(confidence),
            _ => Self::negative(confidence),
        })
    }

    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            confidence: Self::NEUTRAL_CONFIDENCE,
            signed_score: 0.0,
        }
    }

    pub(crate) fn positive(confidence: f64) -> Self {
        debug_assert!(confidence > 0.0 && confidence <= 1.0);
        Self {
            label: SentimentLabel::Positive,
            confidence,
            signed_score: confidence,
        }
    }

    pub(crate) fn negative(confidence: f64) -> Self {
        debug_assert!(confidence > 0.0 && confidence <= 1.0);
        Self {
            label: SentimentLabel::Negative,
            confidence,
            signed_score: -confidence,
        }
    }

    pub fn label(&self) -> SentimentLabel {
        self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Sentiment on a -1.0 (negative) to 1.0 (positive) scale.
    pub fn signed_score(&self) -> f64 {
        self.signed_score
    }
}

// Configuration structure matching the model's JSON config file
#[cfg(feature = "onnx")]
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ModelConfig {
    pub model_path: String,
    pub tokenizer_path: String,
    pub max_length: usize,
    pub labels: Vec<String>,
}
