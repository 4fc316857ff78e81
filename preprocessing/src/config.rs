use crate::{error::PreprocessingError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_LENGTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    pub max_length: usize,
    pub lowercase: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            lowercase: false,
        }
    }
}

impl NormalizerConfig {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            ..Self::default()
        }
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(PreprocessingError::Config(
                "Max length must be greater than zero".to_string()
            ));
        }

        Ok(())
    }
}
