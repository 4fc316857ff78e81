use crate::{ModelConfig, Result, ScoringError};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;

pub struct OnnxModel {
    session: Session,
    config: ModelConfig,
}

impl OnnxModel {
    pub fn new(model_path: &Path, config: ModelConfig) -> Result<Self> {
        tracing::info!("Loading sentiment model from: {:?}", model_path);

        if !model_path.exists() {
            return Err(ScoringError::ModelLoad(
                format!("Model file not found: {:?}", model_path)
            ));
        }

        let session = Session::builder()
            .map_err(|e| ScoringError::ModelLoad(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ScoringError::ModelLoad(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(1) // each pool worker drives one session call at a time
            .map_err(|e| ScoringError::ModelLoad(format!("Failed to set thread count: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| ScoringError::ModelLoad(format!("Failed to load model: {}", e)))?;

        tracing::info!("Successfully loaded sentiment model");
        Ok(Self {
            session,
            config,
        })
    }

    /// Class probabilities for one tokenized input, in the order of `config.labels`.
    pub fn run_inference(&mut self, input_ids: &[i64], attention_mask: &[i64]) -> Result<Vec<f64>> {
        use ort::inputs;

        let input_ids_array = ndarray::Array2::from_shape_vec(
            (1, input_ids.len()),
            input_ids.to_vec()
        ).map_err(|e| ScoringError::OnnxInference(format!("Failed to create input_ids array: {}", e)))?;

        let attention_mask_array = ndarray::Array2::from_shape_vec(
            (1, attention_mask.len()),
            attention_mask.to_vec()
        ).map_err(|e| ScoringError::OnnxInference(format!("Failed to create attention_mask array: {}", e)))?;

        let input_tensor = Value::from_array(input_ids_array)
            .map_err(|e| ScoringError::OnnxInference(format!("Failed to build input tensor: {}", e)))?;
        let attention_tensor = Value::from_array(attention_mask_array)
            .map_err(|e| ScoringError::OnnxInference(format!("Failed to build attention tensor: {}", e)))?;

        let logits: Vec<f64> = {
            let outputs = self.session.run(inputs![
                "input_ids" => input_tensor,
                "attention_mask" => attention_tensor
            ]).map_err(|e| ScoringError::OnnxInference(format!("Inference failed: {}", e)))?;

            let (_shape, data) = outputs["logits"]
                .try_extract_tensor::<f32>()
                .map_err(|e| ScoringError::OnnxInference(format!("Failed to extract logits: {}", e)))?;

            data.iter().map(|&x| x as f64).collect()
        };

        if logits.len() != self.config.labels.len() {
            return Err(ScoringError::OnnxInference(format!(
                "Expected {} logits, got {}",
                self.config.labels.len(),
                logits.len()
            )));
        }

        Ok(softmax(&logits))
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

pub(crate) fn softmax(logits: &[f64]) -> Vec<f64> {
    let max_logit = logits.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let exp_logits: Vec<f64> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum_exp: f64 = exp_logits.iter().sum();

    exp_logits.iter().map(|&x| x / sum_exp).collect()
}
