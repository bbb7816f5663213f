use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::app_config::{Config, SourceConfig, TranslationProvider};
use crate::providers::TranslationBackend;
use crate::providers::anthropic::AnthropicBackend;
use crate::providers::mock::MockBackend;
use crate::providers::ollama::OllamaBackend;
use crate::sink::{CsvSink, RecordSink};
use crate::source::{CsvRecordSource, RecordSource, SparqlRecordSource};
use crate::translation::cache::CacheConflict;
use crate::translation::{
    CacheStats, PipelineCoordinator, PipelineOptions, RetryPolicy, RunSummary, TranslationCache,
    TranslationClient, normalize_title,
};

// @module: Application controller wiring configuration to the pipeline

/// Main application controller for title translation runs
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self { config })
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the backend selected by the configuration
    pub fn build_backend(&self) -> Result<Arc<dyn TranslationBackend>> {
        let translation = &self.config.translation;
        let backend: Arc<dyn TranslationBackend> = match translation.provider {
            TranslationProvider::Anthropic => Arc::new(
                AnthropicBackend::new(
                    translation.get_api_key()?,
                    translation.get_endpoint(),
                    translation.get_model(),
                )
                .with_temperature(translation.temperature),
            ),
            TranslationProvider::Ollama => Arc::new(
                OllamaBackend::new(translation.get_endpoint(), translation.get_model())
                    .with_temperature(translation.temperature),
            ),
            TranslationProvider::Mock => {
                warn!("Using the mock provider: titles get placeholder translations");
                Arc::new(MockBackend::working())
            }
        };

        Ok(backend)
    }

    /// Build the record source selected by the configuration
    pub fn build_source(&self) -> Box<dyn RecordSource> {
        match &self.config.source {
            SourceConfig::Csv { path, identifier_column, title_column } => Box::new(
                CsvRecordSource::new(path.clone()).with_columns(identifier_column, title_column),
            ),
            SourceConfig::Sparql {
                endpoint,
                query,
                identifier_variable,
                title_variable,
                strip_namespace,
            } => Box::new(
                SparqlRecordSource::new(endpoint, query)
                    .with_variables(identifier_variable, title_variable)
                    .with_strip_namespace(*strip_namespace),
            ),
        }
    }

    /// Open the translation cache for the configured target language
    pub fn open_cache(&self) -> Result<TranslationCache> {
        if self.config.cache.disabled {
            info!("Translation cache disabled; using an in-memory store for this run");
            return Ok(TranslationCache::in_memory(&self.config.target_language));
        }

        let path = self.config.cache_path()?;
        Ok(TranslationCache::open(path, &self.config.target_language))
    }

    /// Assemble a pipeline coordinator from the configuration
    pub fn build_pipeline(&self, cache: TranslationCache) -> Result<PipelineCoordinator> {
        let client = TranslationClient::new(
            self.build_backend()?,
            RetryPolicy::from_config(&self.config.retry),
            &self.config.source_language,
        );

        Ok(PipelineCoordinator::new(
            client,
            cache,
            PipelineOptions::from_config(&self.config),
        )?)
    }

    /// Run the configured pipeline into the configured CSV output
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary> {
        let mut sink = CsvSink::new(&self.config.output.base);
        self.run_into(&mut sink, cancel).await
    }

    /// Run the configured pipeline into any sink, with a progress bar
    pub async fn run_into(&self, sink: &mut dyn RecordSink, cancel: CancellationToken) -> Result<RunSummary> {
        let cache = self.open_cache()?;
        let source = self.build_source();

        let progress_bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} titles ({percent}%) {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%)"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));

        let bar = progress_bar.clone();
        let pipeline = self.build_pipeline(cache)?.with_progress(move |done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        });

        let result = pipeline.run(source.as_ref(), sink, cancel).await;
        progress_bar.finish_and_clear();

        Ok(result?)
    }

    /// Cache statistics
    pub async fn cache_stats(&self) -> Result<CacheStats> {
        self.open_cache()?.stats().await
    }

    /// Remove the cached translation of one title
    pub async fn cache_invalidate(&self, title: &str) -> Result<bool> {
        self.open_cache()?.invalidate(&normalize_title(title)).await
    }

    /// Remove every cached translation for the target language
    pub async fn cache_clear(&self) -> Result<usize> {
        self.open_cache()?.clear().await
    }

    /// Most recent overwritten translations
    pub async fn cache_conflicts(&self, limit: usize) -> Result<Vec<CacheConflict>> {
        self.open_cache()?.conflicts(limit).await
    }
}
