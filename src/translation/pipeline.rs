/*!
 * Pipeline coordinator.
 *
 * Drives records from a `RecordSource` through the translation cache and the
 * translation client into a `RecordSink`:
 *
 * 1. The source is drained and validated (identifiers must be unique) before
 *    anything is dispatched, so a duplicate aborts the run with no output.
 * 2. Records are dispatched in input order into an ordered buffer of
 *    `workers` slots. Translation calls complete in any order, but results
 *    leave the buffer strictly by input position.
 * 3. Per-record failures are recorded on the output item; only duplicate
 *    identifiers, source failures and sink failures abort the run.
 *
 * Cancellation stops dispatch immediately. In-flight records get a grace
 * period, then are abandoned and counted as unprocessed.
 */

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::cache::{TranslationCache, normalize_title};
use super::client::TranslationClient;
use crate::app_config::Config;
use crate::errors::PipelineError;
use crate::record::{RecordStatus, TitleRecord, TranslatedTitle};
use crate::sink::RecordSink;
use crate::source::RecordSource;

/// Progress callback receiving (processed, total)
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Options for one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Target language tag
    pub target_language: String,
    /// Maximum number of records in flight
    pub workers: usize,
    /// How long in-flight records may finish after cancellation
    pub grace_period: Duration,
    /// Process at most this many records
    pub limit: Option<usize>,
}

impl PipelineOptions {
    /// Create options with defaults for everything but the target language
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
            workers: 4,
            grace_period: Duration::from_secs(10),
            limit: None,
        }
    }

    /// Set the worker pool size
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the cancellation grace period
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Limit the number of records processed
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Build options from the application configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_language: config.target_language.clone(),
            workers: config.pipeline.workers,
            grace_period: Duration::from_secs(config.pipeline.grace_period_secs),
            limit: config.pipeline.limit,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every record reached a terminal state without failures
    Completed,
    /// Every record reached a terminal state, some failed
    CompletedWithFailures,
    /// Cancelled before every record was processed
    Partial,
}

/// Counts by status for a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Unique id of this run
    pub run_id: String,
    /// Records read from the source (after the limit)
    pub total: usize,
    /// Translated by the backend
    pub translated: usize,
    /// Filled from the cache
    pub cache_hits: usize,
    /// Blank titles
    pub skipped: usize,
    /// Failed translations
    pub failed: usize,
    /// Never emitted because of cancellation
    pub unprocessed: usize,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl RunSummary {
    fn new(total: usize) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            total,
            translated: 0,
            cache_hits: 0,
            skipped: 0,
            failed: 0,
            unprocessed: total,
            elapsed: Duration::ZERO,
        }
    }

    fn record(&mut self, item: &TranslatedTitle) {
        match item.status {
            RecordStatus::Translated => self.translated += 1,
            RecordStatus::CacheHit => self.cache_hits += 1,
            RecordStatus::Skipped => self.skipped += 1,
            RecordStatus::Failed => self.failed += 1,
        }
        self.unprocessed -= 1;
    }

    /// Records emitted to the sink
    pub fn processed(&self) -> usize {
        self.total - self.unprocessed
    }

    /// Records that ended with a translation
    pub fn completed(&self) -> usize {
        self.translated + self.cache_hits
    }

    /// Whether the output covers only a prefix of the input
    pub fn is_partial(&self) -> bool {
        self.unprocessed > 0
    }

    /// Classify the run for status reporting
    pub fn outcome(&self) -> RunOutcome {
        if self.is_partial() {
            RunOutcome::Partial
        } else if self.failed > 0 {
            RunOutcome::CompletedWithFailures
        } else {
            RunOutcome::Completed
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} records: {} translated, {} from cache, {} skipped, {} failed, {} unprocessed ({:.1}s)",
            self.total,
            self.translated,
            self.cache_hits,
            self.skipped,
            self.failed,
            self.unprocessed,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Coordinates cache, client and sink for a run
pub struct PipelineCoordinator {
    /// Retrying translation client
    client: TranslationClient,
    /// Persistent translation cache
    cache: TranslationCache,
    /// Run options
    options: PipelineOptions,
    /// Optional progress reporting
    progress: Option<ProgressCallback>,
}

impl PipelineCoordinator {
    /// Create a new coordinator
    pub fn new(
        client: TranslationClient,
        cache: TranslationCache,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        if options.workers == 0 {
            return Err(PipelineError::Config("worker pool size must be at least 1".to_string()));
        }
        if !cache.serves(&options.target_language) {
            return Err(PipelineError::Config(format!(
                "cache serves '{}' but the run targets '{}'",
                cache.target_language(),
                options.target_language
            )));
        }

        Ok(Self {
            client,
            cache,
            options,
            progress: None,
        })
    }

    /// Report progress after every emitted record
    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Run options
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run the pipeline until the source is exhausted or `cancel` fires
    pub async fn run(
        &self,
        source: &dyn RecordSource,
        sink: &mut dyn RecordSink,
        cancel: CancellationToken,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();

        info!("Fetching records from {}", source.describe());
        let records = self.collect_records(source).await?;
        let total = records.len();
        let mut summary = RunSummary::new(total);

        info!(
            "Translating {} titles into '{}' with {} workers via {}",
            total,
            self.options.target_language,
            self.options.workers,
            self.client.backend_name()
        );

        let dispatch_stop = cancel.clone();
        let mut outputs = pin!(
            stream::iter(records)
                .take_until(async move { dispatch_stop.cancelled().await })
                .map(|record| self.process_record(record))
                .buffered(self.options.workers)
        );

        let mut grace_deadline: Option<tokio::time::Instant> = None;

        loop {
            let next = match grace_deadline {
                None => tokio::select! {
                    item = outputs.next() => item,
                    _ = cancel.cancelled() => {
                        warn!(
                            "Cancellation requested; waiting up to {:?} for in-flight translations",
                            self.options.grace_period
                        );
                        grace_deadline = Some(tokio::time::Instant::now() + self.options.grace_period);
                        continue;
                    }
                },
                Some(deadline) => match tokio::time::timeout_at(deadline, outputs.next()).await {
                    Ok(item) => item,
                    Err(_) => {
                        warn!("Grace period expired; abandoning in-flight translations");
                        break;
                    }
                },
            };

            let Some(item) = next else {
                break;
            };

            summary.record(&item);
            sink.write(&item)
                .map_err(|e| PipelineError::Sink(format!("{:#}", e)))?;

            if let Some(progress) = &self.progress {
                progress(summary.processed(), total);
            }
        }

        summary.elapsed = started.elapsed();
        sink.finish(&summary)
            .map_err(|e| PipelineError::Sink(format!("{:#}", e)))?;

        match summary.outcome() {
            RunOutcome::Completed => info!("Run {} completed: {}", summary.run_id, summary),
            RunOutcome::CompletedWithFailures => {
                warn!("Run {} completed with failures: {}", summary.run_id, summary)
            }
            RunOutcome::Partial => warn!("Run {} cancelled, output is partial: {}", summary.run_id, summary),
        }

        Ok(summary)
    }

    /// Drain the source, apply the limit and reject duplicate identifiers
    async fn collect_records(&self, source: &dyn RecordSource) -> Result<Vec<TitleRecord>, PipelineError> {
        let records = source.fetch().await?;

        let mut first_seen: HashMap<String, usize> = HashMap::new();
        let mut collected = Vec::new();

        // The whole source is validated even when only a prefix is processed
        for (position, item) in records.enumerate() {
            let record = item?;

            if let Some(&first_position) = first_seen.get(&record.identifier) {
                return Err(PipelineError::DuplicateRecord {
                    identifier: record.identifier,
                    first_position,
                    position,
                });
            }
            first_seen.insert(record.identifier.clone(), position);
            collected.push(TitleRecord::new(position, record));
        }

        if let Some(limit) = self.options.limit {
            collected.truncate(limit);
        }

        Ok(collected)
    }

    /// Take one record to a terminal state
    async fn process_record(&self, record: TitleRecord) -> TranslatedTitle {
        if record.is_blank() {
            debug!("Skipping {}: empty title", record.identifier);
            return record.skip();
        }

        let normalized = normalize_title(&record.source_title);

        if let Some(translation) = self.cache.lookup(&normalized).await {
            return record.fill(translation, RecordStatus::CacheHit);
        }

        match self
            .client
            .translate(&normalized, &self.options.target_language)
            .await
        {
            Ok(translation) => {
                if let Err(e) = self.cache.store(&normalized, &translation).await {
                    warn!("Could not cache translation for {}: {}", record.identifier, e);
                }
                record.fill(translation, RecordStatus::Translated)
            }
            Err(e) => {
                warn!("Translation failed for {}: {}", record.identifier, e);
                record.fail(e.to_string())
            }
        }
    }
}
