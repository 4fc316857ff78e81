use crate::backend::ScoringBackend;
use crate::model::OnnxModel;
use crate::tokenizer::ModelTokenizer;
use crate::{ModelConfig, Result, ScoreResult, ScoringError, SentimentLabel};
use std::path::Path;
use std::sync::Mutex;

/// Scoring backend running an exported transformer classifier through ONNX Runtime.
///
/// The session needs exclusive access per call, so concurrent workers queue
/// on the model mutex; tokenization runs outside the lock.
pub struct OnnxSentimentBackend {
    model: Mutex<OnnxModel>,
    tokenizer: ModelTokenizer,
    config: ModelConfig,
    name: String,
}

impl OnnxSentimentBackend {
    pub fn new(config_path: &Path) -> Result<Self> {
        tracing::info!("Initializing ONNX sentiment backend from: {:?}", config_path);

        let config_content = std::fs::read_to_string(config_path)?;
        let config: ModelConfig = serde_json::from_str(&config_content)?;
        if config.labels.is_empty() {
            return Err(ScoringError::Config("Model config lists no labels".to_string()));
        }
        let base_dir = config_path.parent()
            .ok_or_else(|| ScoringError::Config("Invalid config path".to_string()))?;

        let tokenizer = ModelTokenizer::from_config(&config, base_dir)?;
        let model = OnnxModel::new(&base_dir.join(&config.model_path), config.clone())?;
        tracing::info!("Successfully initialized ONNX sentiment backend");

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            name: format!("onnx:{}", config_path.display()),
            config,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn probabilities_to_result(&self, probabilities: &[f64]) -> Result<ScoreResult> {
        let (max_idx, &max_prob) = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .ok_or_else(|| ScoringError::OnnxInference("Model returned no probabilities".to_string()))?;

        let label = self.config.labels.get(max_idx)
            .map(|name| SentimentLabel::from_name(name))
            .unwrap_or(SentimentLabel::Neutral);

        ScoreResult::new(label, max_prob)
    }
}

impl ScoringBackend for OnnxSentimentBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_loaded(&self) -> bool {
        // a poisoned session mutex means a previous call panicked mid-run
        !self.model.is_poisoned()
    }

    fn score(&self, text: &str) -> Result<ScoreResult> {
        let tokens = self.tokenizer.tokenize(text)?;
        let probabilities = {
            let mut model = self.model.lock()
                .map_err(|_| ScoringError::OnnxInference("Model session poisoned".to_string()))?;
            model.run_inference(&tokens.input_ids, &tokens.attention_mask)?
        };

        let result = self.probabilities_to_result(&probabilities)?;
        tracing::debug!(
            "Sentiment for '{}': {} (score: {:.3}, confidence: {:.3})",
            text.chars().take(50).collect::<String>(),
            result.label(),
            result.signed_score(),
            result.confidence()
        );
        Ok(result)
    }
}
