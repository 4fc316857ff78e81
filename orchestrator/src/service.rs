use crate::config::OrchestratorConfig;
use crate::error::{InitError, PoolError, RunError};
use crate::models::{ModelInfo, PredictionRecord};
use crate::pool::WorkerPool;
use crate::state::{ServiceState, StateCell};
use inference::{load_backend, select_backend, ScoringBackend, ScoringError};
use sentiment_preprocessing::{NormalizerConfig, TextFeatures, TextNormalizer};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Everything built by a successful `initialize`, published exactly once.
struct Engine {
    model_name: String,
    normalizer: TextNormalizer,
    backend: Arc<dyn ScoringBackend>,
    fallback_reason: Option<String>,
    pool: WorkerPool,
}

/// Owns the normalizer, the scoring backend and the worker pool, and gates
/// every inference call on the service lifecycle.
///
/// Construct one per process (or per test) and share it behind an `Arc`.
/// All methods take `&self`; state changes go through a single atomic.
pub struct InferenceOrchestrator {
    config: OrchestratorConfig,
    state: StateCell,
    engine: OnceLock<Engine>,
}

impl InferenceOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            state: StateCell::new(),
            engine: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn state(&self) -> ServiceState {
        self.state.load()
    }

    pub fn is_ready(&self) -> bool {
        self.ready_engine().is_ok()
    }

    /// Load the backend named `model_name` and start serving.
    ///
    /// A backend that fails to load is replaced by the keyword classifier;
    /// that is logged but is not an error.
    #[instrument(skip(self))]
    pub async fn initialize(&self, model_name: &str, max_text_length: usize) -> Result<(), InitError> {
        let normalizer = self.begin_initialization(model_name, max_text_length)?;

        info!("Loading scoring backend for model {}", model_name);
        let name = model_name.to_string();
        let attempt = match tokio::task::spawn_blocking(move || load_backend(&name)).await {
            Ok(attempt) => attempt,
            Err(e) => Err(ScoringError::ModelLoad(format!("backend loader task failed: {}", e))),
        };

        self.finish_initialization(model_name, normalizer, attempt).await
    }

    /// Same as [`initialize`](Self::initialize), with the backend construction
    /// result supplied by the caller.
    pub async fn initialize_with(
        &self,
        attempt: inference::Result<Arc<dyn ScoringBackend>>,
        max_text_length: usize,
    ) -> Result<(), InitError> {
        let model_name = self.config.model_name.clone();
        let normalizer = self.begin_initialization(&model_name, max_text_length)?;
        self.finish_initialization(&model_name, normalizer, attempt).await
    }

    fn begin_initialization(&self, model_name: &str, max_text_length: usize) -> Result<TextNormalizer, InitError> {
        if model_name.trim().is_empty() {
            return Err(InitError::invalid_config("Model name cannot be empty"));
        }
        self.config.validate()?;

        let normalizer = TextNormalizer::from_config(
            NormalizerConfig::new(max_text_length).with_lowercase(self.config.lowercase),
        )
        .map_err(|e| InitError::invalid_config(e.to_string()))?;

        if let Err(found) = self
            .state
            .transition(ServiceState::Uninitialized, ServiceState::Initializing)
        {
            return Err(match found {
                ServiceState::ShuttingDown | ServiceState::Terminated => InitError::Terminated,
                other => InitError::AlreadyInitialized(other),
            });
        }

        Ok(normalizer)
    }

    async fn finish_initialization(
        &self,
        model_name: &str,
        normalizer: TextNormalizer,
        attempt: inference::Result<Arc<dyn ScoringBackend>>,
    ) -> Result<(), InitError> {
        let pool = match WorkerPool::new(self.config.worker_pool_size) {
            Ok(pool) => pool,
            Err(e) => {
                error!("Failed to start worker pool: {}", e);
                // Only roll back if cleanup has not moved us on already.
                let _ = self
                    .state
                    .transition(ServiceState::Initializing, ServiceState::Uninitialized);
                return Err(e.into());
            }
        };

        let selection = select_backend(attempt);
        match &selection.fallback_reason {
            Some(reason) => {
                warn!("Scoring backend unavailable ({}), using {}", reason, selection.backend.name())
            }
            None => info!("Scoring backend {} loaded", selection.backend.name()),
        }

        let engine = Engine {
            model_name: model_name.to_string(),
            normalizer,
            backend: selection.backend,
            fallback_reason: selection.fallback_reason,
            pool,
        };

        if let Err(rejected) = self.engine.set(engine) {
            // Unreachable while the state machine holds, but never leak threads.
            rejected.pool.shutdown().await?;
            return Err(InitError::AlreadyInitialized(self.state()));
        }

        if self
            .state
            .transition(ServiceState::Initializing, ServiceState::Ready)
            .is_err()
        {
            warn!("Cleanup ran during initialization, stopping worker pool");
            if let Some(engine) = self.engine.get() {
                engine.pool.shutdown().await?;
            }
            return Err(InitError::Terminated);
        }

        info!(
            workers = self.config.worker_pool_size,
            max_text_length = self.engine.get().map(|e| e.normalizer.max_length()),
            "Inference service ready"
        );
        Ok(())
    }

    fn ready_engine(&self) -> Result<&Engine, RunError> {
        let state = self.state.load();
        match (state, self.engine.get()) {
            (ServiceState::Ready, Some(engine)) if engine.backend.is_loaded() => Ok(engine),
            _ => Err(RunError::NotReady { state }),
        }
    }

    fn validate_text(&self, text: &str) -> Result<(), String> {
        if text.trim().is_empty() {
            return Err("text must not be empty".to_string());
        }

        let chars = text.chars().count();
        if chars > self.config.max_input_chars {
            return Err(format!(
                "text is {} characters, limit is {}",
                chars, self.config.max_input_chars
            ));
        }

        Ok(())
    }

    /// Score a single raw text.
    #[instrument(skip_all, fields(chars = text.len()))]
    pub async fn run(&self, text: &str) -> Result<PredictionRecord, RunError> {
        let started = Instant::now();

        let engine = self.ready_engine().inspect_err(|e| debug!("Rejected run: {}", e))?;
        self.validate_text(text).map_err(RunError::Validation)?;

        let processed = engine.normalizer.normalize(text);
        let backend = Arc::clone(&engine.backend);

        let handle = engine
            .pool
            .submit(move |_| backend.score(&processed))
            .map_err(|e| self.pool_failure(e))?;

        let score = handle
            .wait(self.config.per_call_timeout)
            .await
            .map_err(|e| self.pool_failure(e))?
            .map_err(|e| {
                error!("Scoring failed: {}", e);
                RunError::Backend(e)
            })?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        debug!(label = %score.label(), elapsed_ms, "Scored text");
        Ok(PredictionRecord::new(score, elapsed_ms))
    }

    /// Score several raw texts as one unit of work.
    ///
    /// Either every item gets a record, in input order, or the whole call
    /// fails. Each record's time is the batch total split evenly.
    #[instrument(skip_all, fields(items = texts.len()))]
    pub async fn run_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<PredictionRecord>, RunError> {
        let started = Instant::now();

        let engine = self.ready_engine().inspect_err(|e| debug!("Rejected batch: {}", e))?;

        if texts.is_empty() {
            return Err(RunError::Validation("batch must not be empty".to_string()));
        }
        if texts.len() > self.config.max_batch_items {
            return Err(RunError::Validation(format!(
                "batch has {} items, limit is {}",
                texts.len(),
                self.config.max_batch_items
            )));
        }
        for (i, text) in texts.iter().enumerate() {
            self.validate_text(text.as_ref())
                .map_err(|e| RunError::Validation(format!("item {}: {}", i, e)))?;
        }

        let processed = engine.normalizer.normalize_batch(texts);
        let expected = processed.len();
        let backend = Arc::clone(&engine.backend);

        let handle = engine
            .pool
            .submit(move |token| backend.score_batch_cancellable(&processed, token))
            .map_err(|e| self.pool_failure(e))?;

        let scores = handle
            .wait(self.config.per_call_timeout.saturating_mul(2))
            .await
            .map_err(|e| self.pool_failure(e))?
            .map_err(|e| {
                error!("Batch scoring failed: {}", e);
                RunError::Backend(e)
            })?;

        if scores.len() != expected {
            error!("Backend returned {} results for {} texts", scores.len(), expected);
            return Err(RunError::Backend(ScoringError::InvalidInput(format!(
                "backend returned {} results for {} texts",
                scores.len(),
                expected
            ))));
        }

        let total_ms = started.elapsed().as_secs_f64() * 1000.0;
        let per_item_ms = total_ms / expected as f64;
        debug!(items = expected, total_ms, "Scored batch");

        Ok(scores
            .into_iter()
            .map(|score| PredictionRecord::new(score, per_item_ms))
            .collect())
    }

    fn pool_failure(&self, err: PoolError) -> RunError {
        match err {
            PoolError::Closed => RunError::NotReady { state: self.state() },
            PoolError::Timeout(limit) => {
                warn!("Inference timed out after {:?}", limit);
                RunError::Timeout(limit)
            }
            other => {
                error!("Worker pool failure: {}", other);
                RunError::Backend(ScoringError::Other(other.into()))
            }
        }
    }

    /// Stop accepting work, drain the pool and release the backend.
    /// Safe to call more than once and from any state.
    #[instrument(skip_all)]
    pub async fn cleanup(&self) {
        let mut current = self.state.load();
        loop {
            match current {
                ServiceState::ShuttingDown | ServiceState::Terminated => {
                    debug!("Cleanup already {}", current);
                    return;
                }
                _ => match self.state.transition(current, ServiceState::ShuttingDown) {
                    Ok(()) => break,
                    Err(found) => current = found,
                },
            }
        }

        info!("Shutting down inference service (was {})", current);
        if let Some(engine) = self.engine.get() {
            if let Err(e) = engine.pool.shutdown().await {
                warn!("Worker pool did not shut down cleanly: {}", e);
            }
        }

        self.state.store(ServiceState::Terminated);
        info!("Inference service terminated");
    }

    /// Normalize `raw` and describe it. Works in any lifecycle state.
    pub fn extract_features(&self, raw: &str) -> TextFeatures {
        match self.engine.get() {
            Some(engine) => engine.normalizer.extract_features(raw),
            None => TextNormalizer::new(self.config.max_sequence_length)
                .with_lowercase(self.config.lowercase)
                .extract_features(raw),
        }
    }

    pub fn model_info(&self) -> ModelInfo {
        let engine = self.engine.get();
        ModelInfo {
            model_name: engine
                .map(|e| e.model_name.clone())
                .unwrap_or_else(|| self.config.model_name.clone()),
            backend: engine.map(|e| e.backend.name().to_string()),
            fallback: engine.is_some_and(|e| e.fallback_reason.is_some()),
            fallback_reason: engine.and_then(|e| e.fallback_reason.clone()),
            state: self.state(),
            is_ready: self.is_ready(),
            max_sequence_length: engine
                .map(|e| e.normalizer.max_length())
                .unwrap_or(self.config.max_sequence_length),
            batch_size: self.config.batch_size,
            worker_pool_size: self.config.worker_pool_size,
        }
    }
}

impl std::fmt::Debug for InferenceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceOrchestrator")
            .field("state", &self.state())
            .field("model_name", &self.config.model_name)
            .field("backend", &self.engine.get().map(|e| e.backend.name().to_string()))
            .finish()
    }
}
