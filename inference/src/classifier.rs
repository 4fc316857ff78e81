//! Keyword-ratio sentiment scorer used when no model backend can be loaded.

use crate::backend::{CancelToken, ScoringBackend};
use crate::{Result, ScoreResult, ScoringError};

const POSITIVE_KEYWORDS: [&str; 14] = [
    "good", "great", "excellent", "amazing", "wonderful",
    "fantastic", "love", "happy", "best", "awesome",
    "beautiful", "perfect", "brilliant", "outstanding",
];

const NEGATIVE_KEYWORDS: [&str; 14] = [
    "bad", "terrible", "awful", "horrible", "hate",
    "worst", "disappointing", "poor", "sad", "angry",
    "ugly", "disgusting", "pathetic", "failure",
];

/// Deterministic rule-based backend. Always constructible, always loaded,
/// holds no mutable state.
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub const NAME: &'static str = "keyword-fallback";

    pub fn new() -> Self {
        Self
    }

    /// Number of positive and negative keywords present in `text`.
    ///
    /// Matching is plain substring containment on the case-folded text, so a
    /// keyword inside a longer word ("goodness") still counts. Each keyword
    /// counts at most once.
    pub fn keyword_hits(&self, text: &str) -> (usize, usize) {
        let folded = text.to_lowercase();
        let positive = POSITIVE_KEYWORDS.iter().filter(|word| folded.contains(*word)).count();
        let negative = NEGATIVE_KEYWORDS.iter().filter(|word| folded.contains(*word)).count();
        (positive, negative)
    }

    pub fn classify(&self, text: &str) -> ScoreResult {
        let (positive, negative) = self.keyword_hits(text);
        let total = positive + negative;

        if total == 0 {
            return ScoreResult::neutral();
        }

        let positive_ratio = positive as f64 / total as f64;

        // An even split lands in the negative branch.
        if positive_ratio > 0.5 {
            ScoreResult::positive(0.5 + positive_ratio * 0.5)
        } else {
            ScoreResult::negative(0.5 + (1.0 - positive_ratio) * 0.5)
        }
    }
}

impl ScoringBackend for KeywordClassifier {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn score(&self, text: &str) -> Result<ScoreResult> {
        Ok(self.classify(text))
    }

    fn score_batch(&self, texts: &[String]) -> Result<Vec<ScoreResult>> {
        Ok(texts.iter().map(|text| self.classify(text)).collect())
    }

    fn score_batch_cancellable(&self, texts: &[String], cancel: &CancelToken) -> Result<Vec<ScoreResult>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            if cancel.is_cancelled() {
                return Err(ScoringError::Cancelled);
            }
            results.push(self.classify(text));
        }
        Ok(results)
    }
}
