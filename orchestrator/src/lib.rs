//! Sentiment inference orchestration.
//!
//! Raw text flows through the normalizer, then a scoring backend running on a
//! fixed-size worker pool, and comes back as a [`PredictionRecord`]:
//! ```text
//! caller → InferenceOrchestrator::run → TextNormalizer → WorkerPool → ScoringBackend
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod pool;
pub mod service;
pub mod state;

pub use config::OrchestratorConfig;
pub use error::{InitError, PoolError, RunError};
pub use models::{ModelInfo, PredictionRecord};
pub use pool::{JobHandle, WorkerPool};
pub use service::InferenceOrchestrator;
pub use state::ServiceState;

pub use inference::{CancelToken, KeywordClassifier, ScoreResult, ScoringBackend, ScoringError, SentimentLabel};
pub use sentiment_preprocessing::{TextFeatures, TextNormalizer};
