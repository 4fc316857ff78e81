// Sentiment text preprocessing library

pub mod config;
mod entities;
pub mod error;
pub mod models;
pub mod processor;

pub use config::NormalizerConfig;
pub use error::{PreprocessingError, Result};
pub use models::TextFeatures;
pub use processor::{normalize, TextNormalizer};
