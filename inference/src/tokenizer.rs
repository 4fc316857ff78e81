use crate::{ModelConfig, Result, ScoringError};
use std::path::Path;
use tokenizers::Tokenizer;

#[derive(Debug, Clone)]
pub struct TokenizerOutput {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
}

pub struct ModelTokenizer {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl ModelTokenizer {
    pub fn new(tokenizer_path: &Path, max_length: usize) -> Result<Self> {
        tracing::info!("Loading tokenizer from: {:?}", tokenizer_path);

        let tokenizer_file = tokenizer_path.join("tokenizer.json");
        if !tokenizer_file.exists() {
            return Err(ScoringError::Tokenization(
                format!("Tokenizer file not found: {:?}", tokenizer_file)
            ));
        }

        let tokenizer = Tokenizer::from_file(&tokenizer_file)
            .map_err(|e| ScoringError::Tokenization(format!("Failed to load tokenizer: {}", e)))?;
        tracing::info!("Successfully loaded tokenizer");

        Ok(Self {
            tokenizer,
            max_length,
        })
    }

    pub fn from_config(config: &ModelConfig, base_path: &Path) -> Result<Self> {
        let tokenizer_path = base_path.join(&config.tokenizer_path);
        Self::new(&tokenizer_path, config.max_length)
    }

    /// Encode already-normalized text, truncated or padded to `max_length`.
    pub fn tokenize(&self, text: &str) -> Result<TokenizerOutput> {
        let encoding = self.tokenizer
            .encode(text, true)
            .map_err(|e| ScoringError::Tokenization(format!("Encoding failed: {}", e)))?;
        let mut input_ids = encoding.get_ids().iter().map(|&id| id as i64).collect::<Vec<_>>();
        let mut attention_mask = encoding.get_attention_mask().iter().map(|&mask| mask as i64).collect::<Vec<_>>();

        if input_ids.len() > self.max_length {
            // keep the final special token (e.g. [SEP]) in place
            let last = input_ids[input_ids.len() - 1];
            input_ids.truncate(self.max_length);
            attention_mask.truncate(self.max_length);
            if let Some(slot) = input_ids.last_mut() {
                *slot = last;
            }
        }

        input_ids.resize(self.max_length, 0);
        attention_mask.resize(self.max_length, 0);

        Ok(TokenizerOutput {
            input_ids,
            attention_mask,
        })
    }
}
