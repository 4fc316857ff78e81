use crate::error::InitError;
use serde::{Deserialize, Serialize};
use sentiment_preprocessing::NormalizerConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL_NAME: &str = "distilbert-base-uncased-finetuned-sst-2-english";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub model_name: String,
    pub max_sequence_length: usize,
    pub worker_pool_size: usize,
    pub per_call_timeout: Duration,
    pub batch_size: usize,
    pub lowercase: bool,
    pub max_input_chars: usize,
    pub max_batch_items: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            max_sequence_length: 512,
            worker_pool_size: 4,
            per_call_timeout: Duration::from_secs(30),
            batch_size: 32,
            lowercase: false,
            max_input_chars: 10_000,
            max_batch_items: 100,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables (and a `.env` file if
    /// present), falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, InitError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, InitError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let model_name = lookup("MODEL_NAME").unwrap_or(defaults.model_name);
        let max_sequence_length = parse_var(&lookup, "MAX_SEQUENCE_LENGTH", defaults.max_sequence_length)?;
        let worker_pool_size = parse_var(&lookup, "WORKERS", defaults.worker_pool_size)?;
        let timeout_secs = parse_var(&lookup, "INFERENCE_TIMEOUT", defaults.per_call_timeout.as_secs_f64())?;
        let batch_size = parse_var(&lookup, "BATCH_SIZE", defaults.batch_size)?;
        let lowercase = parse_var(&lookup, "LOWERCASE", defaults.lowercase)?;
        let max_input_chars = parse_var(&lookup, "MAX_INPUT_CHARS", defaults.max_input_chars)?;
        let max_batch_items = parse_var(&lookup, "MAX_BATCH_ITEMS", defaults.max_batch_items)?;

        Ok(Self {
            model_name,
            max_sequence_length,
            worker_pool_size,
            per_call_timeout: timeout_from_secs(timeout_secs)?,
            batch_size,
            lowercase,
            max_input_chars,
            max_batch_items,
        })
    }

    pub fn with_timeout(mut self, per_call_timeout: Duration) -> Self {
        self.per_call_timeout = per_call_timeout;
        self
    }

    pub fn with_workers(mut self, worker_pool_size: usize) -> Self {
        self.worker_pool_size = worker_pool_size;
        self
    }

    pub fn normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig::new(self.max_sequence_length).with_lowercase(self.lowercase)
    }

    pub fn validate(&self) -> Result<(), InitError> {
        if self.model_name.trim().is_empty() {
            return Err(InitError::invalid_config("Model name cannot be empty"));
        }

        if self.max_sequence_length == 0 {
            return Err(InitError::invalid_config("Max sequence length must be greater than 0"));
        }

        if self.worker_pool_size == 0 {
            return Err(InitError::invalid_config("Worker pool size must be at least 1"));
        }

        if self.per_call_timeout.is_zero() {
            return Err(InitError::invalid_config("Inference timeout must be greater than 0"));
        }

        if self.batch_size == 0 {
            return Err(InitError::invalid_config("Batch size must be greater than 0"));
        }

        if self.max_input_chars == 0 {
            return Err(InitError::invalid_config("Max input chars must be greater than 0"));
        }

        if self.max_batch_items == 0 {
            return Err(InitError::invalid_config("Max batch items must be greater than 0"));
        }

        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, InitError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| InitError::invalid_config(format!("Invalid {}: {:?}", key, raw))),
        None => Ok(default),
    }
}

pub(crate) fn timeout_from_secs(secs: f64) -> Result<Duration, InitError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(InitError::invalid_config(format!(
            "Inference timeout must be a positive number of seconds, got {}",
            secs
        )));
    }

    Duration::try_from_secs_f64(secs)
        .map_err(|e| InitError::invalid_config(format!("Invalid inference timeout: {}", e)))
}
