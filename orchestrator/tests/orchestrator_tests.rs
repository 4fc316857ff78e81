use sentiment_orchestrator::{
    InferenceOrchestrator, InitError, KeywordClassifier, OrchestratorConfig, RunError, ScoreResult,
    ScoringBackend, ScoringError, SentimentLabel, ServiceState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn test_config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_workers(2)
        .with_timeout(Duration::from_secs(5))
}

async fn ready_with(backend: Arc<dyn ScoringBackend>, config: OrchestratorConfig) -> InferenceOrchestrator {
    let orchestrator = InferenceOrchestrator::new(config);
    orchestrator.initialize_with(Ok(backend), 512).await.unwrap();
    orchestrator
}

struct SlowBackend {
    delay: Duration,
}

impl ScoringBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn score(&self, _text: &str) -> inference::Result<ScoreResult> {
        thread::sleep(self.delay);
        Ok(ScoreResult::neutral())
    }
}

struct FailingBackend;

impl ScoringBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn score(&self, _text: &str) -> inference::Result<ScoreResult> {
        Err(ScoringError::OnnxInference("session crashed".to_string()))
    }
}

/// Drops the last result of every batch.
struct ShortBatchBackend;

impl ScoringBackend for ShortBatchBackend {
    fn name(&self) -> &str {
        "short-batch"
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn score(&self, _text: &str) -> inference::Result<ScoreResult> {
        Ok(ScoreResult::neutral())
    }

    fn score_batch(&self, texts: &[String]) -> inference::Result<Vec<ScoreResult>> {
        Ok(texts.iter().skip(1).map(|_| ScoreResult::neutral()).collect())
    }
}

/// Records how many texts it has seen.
#[derive(Default)]
struct CountingBackend {
    seen: AtomicUsize,
}

impl ScoringBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn score(&self, text: &str) -> inference::Result<ScoreResult> {
        self.seen.fetch_add(1, Ordering::SeqCst);
        Ok(KeywordClassifier::new().classify(text))
    }
}

#[tokio::test]
async fn test_run_before_initialize_is_not_ready() {
    let orchestrator = InferenceOrchestrator::new(test_config());
    assert_eq!(orchestrator.state(), ServiceState::Uninitialized);
    assert!(!orchestrator.is_ready());

    let err = orchestrator.run("great").await.unwrap_err();
    assert!(matches!(err, RunError::NotReady { state: ServiceState::Uninitialized }));
    assert!(err.is_retryable());

    let err = orchestrator.run_batch(&["great"]).await.unwrap_err();
    assert!(matches!(err, RunError::NotReady { .. }));
}

#[tokio::test]
async fn test_initialize_falls_back_to_keyword_classifier() {
    let orchestrator = InferenceOrchestrator::new(test_config());
    orchestrator
        .initialize_with(Err(ScoringError::ModelLoad("no weights on disk".to_string())), 512)
        .await
        .unwrap();

    assert!(orchestrator.is_ready());
    let info = orchestrator.model_info();
    assert!(info.fallback);
    assert_eq!(info.backend.as_deref(), Some(KeywordClassifier::NAME));
    assert!(info.fallback_reason.unwrap().contains("no weights on disk"));

    let record = orchestrator.run("This is great and amazing!").await.unwrap();
    assert_eq!(record.label(), SentimentLabel::Positive);
    assert_eq!(record.confidence(), 1.0);
    assert_eq!(record.signed_score(), 1.0);
    assert!(record.processing_time_ms() >= 0.0);

    orchestrator.cleanup().await;
}

#[cfg(not(feature = "onnx"))]
#[tokio::test]
async fn test_initialize_by_name_without_runtime_uses_fallback() {
    let orchestrator = InferenceOrchestrator::new(test_config());
    orchestrator
        .initialize("distilbert-base-uncased-finetuned-sst-2-english", 256)
        .await
        .unwrap();

    let info = orchestrator.model_info();
    assert_eq!(info.state, ServiceState::Ready);
    assert!(info.fallback);
    assert_eq!(info.max_sequence_length, 256);

    let record = orchestrator.run("good bad").await.unwrap();
    assert_eq!(record.label(), SentimentLabel::Negative);
    assert_eq!(record.confidence(), 0.75);

    orchestrator.cleanup().await;
}

#[tokio::test]
async fn test_double_initialize_rejected() {
    let orchestrator = ready_with(Arc::new(KeywordClassifier::new()), test_config()).await;

    let err = orchestrator
        .initialize_with(Ok(Arc::new(KeywordClassifier::new())), 512)
        .await
        .unwrap_err();
    assert!(matches!(err, InitError::AlreadyInitialized(ServiceState::Ready)));
    assert!(orchestrator.is_ready());

    orchestrator.cleanup().await;
}

#[tokio::test]
async fn test_invalid_config_leaves_state_untouched() {
    let orchestrator = InferenceOrchestrator::new(test_config().with_workers(0));
    let err = orchestrator
        .initialize_with(Ok(Arc::new(KeywordClassifier::new())), 512)
        .await
        .unwrap_err();
    assert!(matches!(err, InitError::InvalidConfig(_)));
    assert_eq!(orchestrator.state(), ServiceState::Uninitialized);

    let orchestrator = InferenceOrchestrator::new(test_config());
    let err = orchestrator.initialize("   ", 512).await.unwrap_err();
    assert!(matches!(err, InitError::InvalidConfig(_)));

    let err = orchestrator
        .initialize_with(Ok(Arc::new(KeywordClassifier::new())), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, InitError::InvalidConfig(_)));
    assert_eq!(orchestrator.state(), ServiceState::Uninitialized);
}

#[tokio::test]
async fn test_input_validation() {
    let mut config = test_config();
    config.max_input_chars = 20;
    let orchestrator = ready_with(Arc::new(KeywordClassifier::new()), config).await;

    assert!(matches!(orchestrator.run("").await, Err(RunError::Validation(_))));
    assert!(matches!(orchestrator.run("  \n\t").await, Err(RunError::Validation(_))));
    assert!(matches!(
        orchestrator.run(&"x".repeat(21)).await,
        Err(RunError::Validation(_))
    ));
    assert!(orchestrator.run(&"x".repeat(20)).await.is_ok());

    // Text that normalizes to nothing is still scored.
    let record = orchestrator.run("@someone").await.unwrap();
    assert_eq!(record.label(), SentimentLabel::Neutral);

    orchestrator.cleanup().await;
}

#[tokio::test]
async fn test_timeout_returns_promptly() {
    let config = test_config().with_timeout(Duration::from_millis(50));
    let orchestrator = ready_with(
        Arc::new(SlowBackend {
            delay: Duration::from_millis(500),
        }),
        config,
    )
    .await;

    let started = Instant::now();
    let err = orchestrator.run("anything at all").await.unwrap_err();
    assert!(matches!(err, RunError::Timeout(limit) if limit == Duration::from_millis(50)));
    assert!(started.elapsed() < Duration::from_millis(400));

    // The service stays usable after a timeout.
    assert!(orchestrator.is_ready());
    orchestrator.cleanup().await;
}

#[tokio::test]
async fn test_batch_gets_double_timeout() {
    // Each item takes 30ms; two items fit in 2 x 50ms but not in 50ms.
    let config = test_config().with_timeout(Duration::from_millis(50));
    let orchestrator = ready_with(
        Arc::new(SlowBackend {
            delay: Duration::from_millis(30),
        }),
        config,
    )
    .await;

    let records = orchestrator.run_batch(&["one", "two"]).await.unwrap();
    assert_eq!(records.len(), 2);

    let err = orchestrator.run_batch(&["one", "two", "three", "four", "five"]).await.unwrap_err();
    assert!(matches!(err, RunError::Timeout(limit) if limit == Duration::from_millis(100)));

    orchestrator.cleanup().await;
}

#[tokio::test]
async fn test_backend_error_surfaces() {
    let orchestrator = ready_with(Arc::new(FailingBackend), test_config()).await;

    let err = orchestrator.run("hello").await.unwrap_err();
    assert!(matches!(err, RunError::Backend(ScoringError::OnnxInference(_))));
    assert!(!err.is_retryable());

    let err = orchestrator.run_batch(&["a", "b"]).await.unwrap_err();
    assert!(matches!(err, RunError::Backend(_)));

    orchestrator.cleanup().await;
}

#[tokio::test]
async fn test_batch_result_count_mismatch_is_backend_error() {
    let orchestrator = ready_with(Arc::new(ShortBatchBackend), test_config()).await;

    let err = orchestrator.run_batch(&["a", "b", "c"]).await.unwrap_err();
    assert!(matches!(err, RunError::Backend(_)));

    orchestrator.cleanup().await;
}

#[tokio::test]
async fn test_batch_preserves_order_and_amortizes_time() {
    let orchestrator = ready_with(Arc::new(KeywordClassifier::new()), test_config()).await;
    let texts = vec![
        "Terrible service, awful food".to_string(),
        "The sky is blue".to_string(),
        "What a wonderful day".to_string(),
    ];

    let records = orchestrator.run_batch(&texts).await.unwrap();
    let labels: Vec<_> = records.iter().map(|r| r.label()).collect();
    assert_eq!(
        labels,
        vec![SentimentLabel::Negative, SentimentLabel::Neutral, SentimentLabel::Positive]
    );

    let first = records[0].processing_time_ms();
    assert!(records.iter().all(|r| r.processing_time_ms() == first));

    // Batch results match individual runs.
    for (text, record) in texts.iter().zip(&records) {
        let single = orchestrator.run(text).await.unwrap();
        assert_eq!(single.label(), record.label());
        assert_eq!(single.signed_score(), record.signed_score());
    }

    orchestrator.cleanup().await;
}

#[tokio::test]
async fn test_batch_time_is_split_across_items() {
    let orchestrator = ready_with(
        Arc::new(SlowBackend {
            delay: Duration::from_millis(20),
        }),
        test_config(),
    )
    .await;

    let started = Instant::now();
    let records = orchestrator.run_batch(&["one", "two", "three", "four"]).await.unwrap();
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    assert_eq!(records.len(), 4);
    let per_item = records[0].processing_time_ms();
    assert!(records.iter().all(|r| r.processing_time_ms() == per_item));

    // Four sequential 20ms items: the shares add up to the batch wall time.
    assert!(4.0 * per_item >= 80.0, "per-item share too small: {}", per_item);
    assert!(
        4.0 * per_item <= elapsed_ms + 1e-6,
        "shares {} exceed measured batch time {}",
        4.0 * per_item,
        elapsed_ms
    );
    assert!(per_item < elapsed_ms / 2.0, "time was not divided: {} vs {}", per_item, elapsed_ms);

    orchestrator.cleanup().await;
}

#[tokio::test]
async fn test_batch_validation_is_all_or_nothing() {
    let backend = Arc::new(CountingBackend::default());
    let mut config = test_config();
    config.max_batch_items = 3;
    let orchestrator = ready_with(backend.clone(), config).await;

    let empty: Vec<String> = Vec::new();
    assert!(matches!(orchestrator.run_batch(&empty).await, Err(RunError::Validation(_))));
    assert!(matches!(
        orchestrator.run_batch(&["a", "b", "c", "d"]).await,
        Err(RunError::Validation(_))
    ));

    let err = orchestrator.run_batch(&["fine", " ", "also fine"]).await.unwrap_err();
    match err {
        RunError::Validation(message) => assert!(message.starts_with("item 1")),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(backend.seen.load(Ordering::SeqCst), 0);

    orchestrator.cleanup().await;
}

#[tokio::test]
async fn test_concurrent_runs() {
    let orchestrator = Arc::new(ready_with(Arc::new(KeywordClassifier::new()), test_config()).await);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let orchestrator = Arc::clone(&orchestrator);
        tasks.push(tokio::spawn(async move {
            let text = if i % 2 == 0 { "great stuff" } else { "awful stuff" };
            orchestrator.run(text).await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let record = task.await.unwrap().unwrap();
        let expected = if i % 2 == 0 { SentimentLabel::Positive } else { SentimentLabel::Negative };
        assert_eq!(record.label(), expected);
    }

    orchestrator.cleanup().await;
}

#[tokio::test]
async fn test_cleanup_is_idempotent_and_final() {
    let orchestrator = ready_with(Arc::new(KeywordClassifier::new()), test_config()).await;

    orchestrator.cleanup().await;
    assert_eq!(orchestrator.state(), ServiceState::Terminated);
    assert!(!orchestrator.is_ready());

    orchestrator.cleanup().await;
    assert_eq!(orchestrator.state(), ServiceState::Terminated);

    assert!(matches!(
        orchestrator.run("great").await,
        Err(RunError::NotReady { state: ServiceState::Terminated })
    ));
    assert!(matches!(
        orchestrator.initialize_with(Ok(Arc::new(KeywordClassifier::new())), 512).await,
        Err(InitError::Terminated)
    ));
}

#[tokio::test]
async fn test_cleanup_before_initialize() {
    let orchestrator = InferenceOrchestrator::new(test_config());
    orchestrator.cleanup().await;
    assert_eq!(orchestrator.state(), ServiceState::Terminated);
}

#[tokio::test]
async fn test_cleanup_waits_for_in_flight_work() {
    let orchestrator = Arc::new(
        ready_with(
            Arc::new(SlowBackend {
                delay: Duration::from_millis(100),
            }),
            test_config(),
        )
        .await,
    );

    let runner = Arc::clone(&orchestrator);
    let in_flight = tokio::spawn(async move { runner.run("slow one").await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    orchestrator.cleanup().await;
    assert_eq!(orchestrator.state(), ServiceState::Terminated);
    assert!(in_flight.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_extract_features_in_any_state() {
    let orchestrator = InferenceOrchestrator::new(test_config());
    let raw = "Loving it! https://t.co/x @friend #happy";

    let before = orchestrator.extract_features(raw);
    assert_eq!(before.word_count, 3);
    assert!(before.has_urls && before.has_mentions && before.has_hashtags);

    orchestrator
        .initialize_with(Ok(Arc::new(KeywordClassifier::new())), 512)
        .await
        .unwrap();
    assert_eq!(orchestrator.extract_features(raw), before);

    orchestrator.cleanup().await;
    assert_eq!(orchestrator.extract_features(raw), before);
}

#[tokio::test]
async fn test_model_info_reflects_lifecycle() {
    let orchestrator = InferenceOrchestrator::new(test_config());
    let info = orchestrator.model_info();
    assert_eq!(info.state, ServiceState::Uninitialized);
    assert!(!info.is_ready);
    assert!(info.backend.is_none());

    orchestrator
        .initialize_with(Ok(Arc::new(CountingBackend::default())), 128)
        .await
        .unwrap();
    let info = orchestrator.model_info();
    assert!(info.is_ready);
    assert!(!info.fallback);
    assert_eq!(info.backend.as_deref(), Some("counting"));
    assert_eq!(info.max_sequence_length, 128);
    assert_eq!(info.worker_pool_size, 2);

    orchestrator.cleanup().await;
    assert_eq!(orchestrator.model_info().state, ServiceState::Terminated);
}
