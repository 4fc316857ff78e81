use crate::state::ServiceState;
use inference::ScoringError;
use std::time::Duration;
use thiserror::Error;

/// Failures of a single `run` / `run_batch` call.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Inference service is not ready (state: {state})")]
    NotReady { state: ServiceState },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("Scoring backend failed: {0}")]
    Backend(#[from] ScoringError),
}

impl RunError {
    /// Whether the same call may succeed if the caller tries again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RunError::NotReady { .. } | RunError::Timeout(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RunError::NotReady { .. } => "not_ready",
            RunError::Validation(_) => "validation",
            RunError::Timeout(_) => "timeout",
            RunError::Backend(_) => "backend",
        }
    }
}

/// Construction-time failures; fatal to startup.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Inference service already initialized (state: {0})")]
    AlreadyInitialized(ServiceState),

    #[error("Inference service has been shut down")]
    Terminated,

    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),
}

impl InitError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        InitError::InvalidConfig(message.into())
    }
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Worker pool is closed")]
    Closed,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Job did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Worker dropped the job before producing a result")]
    WorkerLost,

    #[error("Failed to join worker threads: {0}")]
    Join(String),
}
