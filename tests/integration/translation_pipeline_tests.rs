/*!
 * Integration tests for the translation pipeline.
 *
 * Exercises ordering, caching, retry and cancellation behavior end to end
 * with mock backends.
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use titlewai::errors::{BackendError, PipelineError, SourceError};
use titlewai::providers::mock::MockBackend;
use titlewai::providers::{TranslationBackend, TranslationRequest, TranslationResponse};
use titlewai::record::{RecordStatus, SourceRecord, TranslatedTitle};
use titlewai::source::{RecordIter, RecordSource, VecSource};
use titlewai::translation::{
    PipelineCoordinator, PipelineOptions, RetryPolicy, RunOutcome, TranslationCache,
    TranslationClient, normalize_title,
};

use crate::common;

fn numbered_source(count: usize) -> (VecSource, Vec<String>) {
    let ids: Vec<String> = (0..count).map(|i| format!("W{:03}", i)).collect();
    let records = ids
        .iter()
        .enumerate()
        .map(|(i, id)| SourceRecord::new(id.clone(), format!("title-{}", i)))
        .collect();
    (VecSource::new(records), ids)
}

fn identifiers(output: &[TranslatedTitle]) -> Vec<String> {
    output.iter().map(|t| t.identifier.clone()).collect()
}

#[tokio::test]
async fn test_run_withTitleAndBlank_shouldTranslateAndSkip() {
    let backend = MockBackend::working().with_translations(&[("title-a", "Title A (EN)")]);
    let pipeline = common::mock_pipeline(&backend, TranslationCache::in_memory("en"), 4, 3);
    let source = VecSource::from_pairs(&[("W1", "title-a"), ("W2", "")]);
    let mut sink: Vec<TranslatedTitle> = Vec::new();

    let summary = pipeline.run(&source, &mut sink, CancellationToken::new()).await.unwrap();

    assert_eq!(sink.len(), 2);
    assert_eq!(sink[0].identifier, "W1");
    assert_eq!(sink[0].source_title, "title-a");
    assert_eq!(sink[0].translated_title.as_deref(), Some("Title A (EN)"));
    assert_eq!(sink[0].status, RecordStatus::Translated);
    assert_eq!(sink[1].identifier, "W2");
    assert_eq!(sink[1].source_title, "");
    assert_eq!(sink[1].translated_or_empty(), "");
    assert_eq!(sink[1].status, RecordStatus::Skipped);
    assert_eq!(summary.outcome(), RunOutcome::Completed);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_run_withWhitespaceTitle_shouldSkipWithoutCalls() {
    let backend = MockBackend::working();
    let pipeline = common::mock_pipeline(&backend, TranslationCache::in_memory("en"), 2, 0);
    let source = VecSource::from_pairs(&[("W1", " \t\n ")]);
    let mut sink: Vec<TranslatedTitle> = Vec::new();

    let summary = pipeline.run(&source, &mut sink, CancellationToken::new()).await.unwrap();

    assert_eq!(sink[0].status, RecordStatus::Skipped);
    assert!(sink[0].translated_title.is_none());
    assert_eq!(summary.skipped, 1);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_run_withCachedTitle_shouldMakeZeroBackendCalls() {
    let backend = MockBackend::working();
    let cache = TranslationCache::in_memory("en");
    cache.store(&normalize_title("title-a"), "Title A (cached)").await.unwrap();
    let pipeline = common::mock_pipeline(&backend, cache, 4, 3);
    let source = VecSource::from_pairs(&[("W1", "  title-a ")]);
    let mut sink: Vec<TranslatedTitle> = Vec::new();

    let summary = pipeline.run(&source, &mut sink, CancellationToken::new()).await.unwrap();

    assert_eq!(sink[0].status, RecordStatus::CacheHit);
    assert_eq!(sink[0].translated_title.as_deref(), Some("Title A (cached)"));
    assert_eq!(summary.cache_hits, 1);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_run_twiceWithPersistentCache_shouldBeIdempotent() {
    let dir = common::create_temp_dir().unwrap();
    let cache_path = dir.path().join("cache.db");
    let titles = common::sample_titles();
    let source = VecSource::from_pairs(&titles);

    let first_backend = MockBackend::working();
    let mut first: Vec<TranslatedTitle> = Vec::new();
    common::mock_pipeline(&first_backend, TranslationCache::open(&cache_path, "en"), 4, 0)
        .run(&source, &mut first, CancellationToken::new())
        .await
        .unwrap();

    let second_backend = MockBackend::working();
    let mut second: Vec<TranslatedTitle> = Vec::new();
    let summary = common::mock_pipeline(&second_backend, TranslationCache::open(&cache_path, "en"), 4, 0)
        .run(&source, &mut second, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first_backend.call_count(), 4);
    assert_eq!(second_backend.call_count(), 0);
    assert_eq!(summary.cache_hits, 4);
    assert_eq!(summary.skipped, 1);

    let pairs = |output: &[TranslatedTitle]| -> Vec<(String, String)> {
        output
            .iter()
            .map(|t| (t.identifier.clone(), t.translated_or_empty().to_string()))
            .collect()
    };
    assert_eq!(pairs(&first), pairs(&second));
}

#[tokio::test]
async fn test_run_withRandomLatency_shouldPreserveInputOrderForAnyPoolSize() {
    for workers in [1usize, 2, 3, 4, 7, 8, 16] {
        let backend = MockBackend::random_latency(15);
        let pipeline = common::mock_pipeline(&backend, TranslationCache::in_memory("en"), workers, 0);
        let (source, ids) = numbered_source(40);
        let mut sink: Vec<TranslatedTitle> = Vec::new();

        let summary = pipeline.run(&source, &mut sink, CancellationToken::new()).await.unwrap();

        assert_eq!(identifiers(&sink), ids, "order broken with {} workers", workers);
        for (i, item) in sink.iter().enumerate() {
            assert_eq!(item.translated_or_empty(), format!("[en] title-{}", i));
        }
        assert_eq!(summary.translated, 40);
    }
}

/// Backend that records the highest number of concurrent calls
#[derive(Debug, Default)]
struct ConcurrencyGauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl TranslationBackend for ConcurrencyGauge {
    async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResponse, BackendError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(TranslationResponse {
            text: request.text.to_uppercase(),
        })
    }

    fn name(&self) -> &str {
        "gauge"
    }
}

#[tokio::test]
async fn test_run_shouldNeverExceedWorkerPoolSize() {
    let gauge = Arc::new(ConcurrencyGauge::default());
    let client = TranslationClient::new(gauge.clone(), RetryPolicy::immediate(0), "bo");
    let pipeline = PipelineCoordinator::new(
        client,
        TranslationCache::in_memory("en"),
        PipelineOptions::new("en").with_workers(3),
    )
    .unwrap();
    let (source, _) = numbered_source(30);
    let mut sink: Vec<TranslatedTitle> = Vec::new();

    pipeline.run(&source, &mut sink, CancellationToken::new()).await.unwrap();

    let peak = gauge.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {} exceeds pool size", peak);
    assert!(peak >= 2, "calls never overlapped (peak {})", peak);
}

#[tokio::test]
async fn test_run_withTransientFailuresWithinBudget_shouldTranslateAfterNPlusOneCalls() {
    for retries in [1u32, 2, 3] {
        let backend = MockBackend::fail_first(retries as usize, BackendError::Transient("HTTP 503".to_string()));
        let pipeline = common::mock_pipeline(&backend, TranslationCache::in_memory("en"), 1, retries);
        let source = VecSource::from_pairs(&[("W1", "title")]);
        let mut sink: Vec<TranslatedTitle> = Vec::new();

        pipeline.run(&source, &mut sink, CancellationToken::new()).await.unwrap();

        assert_eq!(sink[0].status, RecordStatus::Translated);
        assert_eq!(backend.call_count(), retries as usize + 1);
    }
}

#[tokio::test]
async fn test_run_withDuplicateIdentifier_shouldAbortBeforeOutput() {
    let backend = MockBackend::working();
    let pipeline = common::mock_pipeline(&backend, TranslationCache::in_memory("en"), 4, 0);
    let source = VecSource::from_pairs(&[("W1", "a"), ("W2", "b"), ("W1", "c")]);
    let mut sink: Vec<TranslatedTitle> = Vec::new();

    let result = pipeline.run(&source, &mut sink, CancellationToken::new()).await;

    match result {
        Err(PipelineError::DuplicateRecord { identifier, first_position, position }) => {
            assert_eq!(identifier, "W1");
            assert_eq!(first_position, 0);
            assert_eq!(position, 2);
        }
        other => panic!("expected duplicate record error, got {:?}", other),
    }
    assert!(sink.is_empty());
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_run_withPermanentFailure_shouldContinueWithOtherRecords() {
    let backend = MockBackend::working()
        .with_failure_for("b", BackendError::Permanent("HTTP 400: unsupported script".to_string()));
    let pipeline = common::mock_pipeline(&backend, TranslationCache::in_memory("en"), 2, 3);
    let source = VecSource::from_pairs(&[("W1", "a"), ("W2", "b"), ("W3", "c")]);
    let mut sink: Vec<TranslatedTitle> = Vec::new();

    let summary = pipeline.run(&source, &mut sink, CancellationToken::new()).await.unwrap();

    let statuses: Vec<RecordStatus> = sink.iter().map(|t| t.status).collect();
    assert_eq!(statuses, vec![RecordStatus::Translated, RecordStatus::Failed, RecordStatus::Translated]);
    assert!(sink[1].failure_reason.as_deref().unwrap().contains("unsupported script"));
    assert_eq!(summary.outcome(), RunOutcome::CompletedWithFailures);
    // Permanent failures are not retried: one call per title
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn test_run_withFailedTranslation_shouldNotCacheIt() {
    let backend = MockBackend::failing(BackendError::Permanent("rejected".to_string()));
    let cache = TranslationCache::in_memory("en");
    let pipeline = common::mock_pipeline(&backend, cache.clone(), 1, 0);
    let mut sink: Vec<TranslatedTitle> = Vec::new();

    pipeline
        .run(&VecSource::from_pairs(&[("W1", "a")]), &mut sink, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(cache.lookup("a").await, None);
}

#[tokio::test]
async fn test_run_withCancellation_shouldEmitPrefixAndCountUnprocessed() {
    common::init_test_logging();
    let backend = MockBackend::slow(100);
    let pipeline = common::mock_pipeline(&backend, TranslationCache::in_memory("en"), 2, 0);
    let (source, ids) = numbered_source(20);
    let mut sink: Vec<TranslatedTitle> = Vec::new();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let summary = pipeline.run(&source, &mut sink, cancel).await.unwrap();

    assert!(summary.is_partial());
    assert_eq!(summary.outcome(), RunOutcome::Partial);
    assert!(!sink.is_empty() && sink.len() < 20, "emitted {}", sink.len());
    assert_eq!(identifiers(&sink), ids[..sink.len()].to_vec());
    assert_eq!(summary.processed(), sink.len());
    assert_eq!(summary.unprocessed, 20 - sink.len());
    assert_eq!(summary.translated, sink.len());
}

#[tokio::test]
async fn test_run_withExpiredGracePeriod_shouldAbandonInFlightRecords() {
    let backend = MockBackend::slow(10_000);
    let client = TranslationClient::new(
        Arc::new(backend.clone()),
        RetryPolicy::immediate(0).with_call_timeout(Duration::from_secs(30)),
        "bo",
    );
    let pipeline = PipelineCoordinator::new(
        client,
        TranslationCache::in_memory("en"),
        PipelineOptions::new("en")
            .with_workers(4)
            .with_grace_period(Duration::from_millis(50)),
    )
    .unwrap();
    let (source, _) = numbered_source(8);
    let mut sink: Vec<TranslatedTitle> = Vec::new();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let summary = pipeline.run(&source, &mut sink, cancel).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(sink.is_empty());
    assert_eq!(summary.unprocessed, 8);
    assert_eq!(summary.outcome(), RunOutcome::Partial);
}

#[tokio::test]
async fn test_run_withCancelledToken_shouldDispatchNothing() {
    let backend = MockBackend::working();
    let pipeline = common::mock_pipeline(&backend, TranslationCache::in_memory("en"), 4, 0);
    let (source, _) = numbered_source(5);
    let mut sink: Vec<TranslatedTitle> = Vec::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = pipeline.run(&source, &mut sink, cancel).await.unwrap();

    assert_eq!(backend.call_count(), 0);
    assert_eq!(summary.unprocessed, 5);
}

/// Source whose second record cannot be read
struct BrokenSource;

#[async_trait]
impl RecordSource for BrokenSource {
    async fn fetch(&self) -> Result<RecordIter, SourceError> {
        Ok(Box::new(
            vec![
                Ok(SourceRecord::new("W1", "a")),
                Err(SourceError::Parse("truncated row".to_string())),
            ]
            .into_iter(),
        ))
    }

    fn describe(&self) -> String {
        "broken source".to_string()
    }
}

#[tokio::test]
async fn test_run_withSourceError_shouldAbortWithoutOutput() {
    let backend = MockBackend::working();
    let pipeline = common::mock_pipeline(&backend, TranslationCache::in_memory("en"), 2, 0);
    let mut sink: Vec<TranslatedTitle> = Vec::new();

    let result = pipeline.run(&BrokenSource, &mut sink, CancellationToken::new()).await;

    assert!(matches!(result, Err(PipelineError::Source(SourceError::Parse(_)))));
    assert!(sink.is_empty());
}
