use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::database::DatabaseConnection;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Source language code of the catalogue titles (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Retry and timeout settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Worker pool and run settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Translation cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Where the title records come from
    #[serde(default)]
    pub source: SourceConfig,

    /// Where the results go
    #[serde(default)]
    pub output: OutputConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Anthropic
    #[default]
    Anthropic,
    // @provider: Ollama
    Ollama,
    // @provider: Canned answers, no network
    Mock,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Anthropic => "Anthropic",
            Self::Ollama => "Ollama",
            Self::Mock => "Mock",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Anthropic => "anthropic".to_string(),
            Self::Ollama => "ollama".to_string(),
            Self::Mock => "mock".to_string(),
        }
    }

    /// Whether the provider needs an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Anthropic)
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: File holding the API key, read when api_key is empty
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        match provider_type {
            TranslationProvider::Anthropic => Self {
                provider_type: "anthropic".to_string(),
                model: default_anthropic_model(),
                api_key: String::new(),
                api_key_file: Some(PathBuf::from(default_api_key_file())),
                endpoint: default_anthropic_endpoint(),
            },
            TranslationProvider::Ollama => Self {
                provider_type: "ollama".to_string(),
                model: default_ollama_model(),
                api_key: String::new(),
                api_key_file: None,
                endpoint: default_ollama_endpoint(),
            },
            TranslationProvider::Mock => Self {
                provider_type: "mock".to_string(),
                model: String::new(),
                api_key: String::new(),
                api_key_file: None,
                endpoint: String::new(),
            },
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Temperature parameter for text generation (0.0 to 1.0)
    /// Titles want deterministic output, so the default is 0.
    #[serde(default)]
    pub temperature: f32,
}

/// Retry, backoff and timeout settings for backend calls
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries for transient failures (calls = retries + 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retries for quota failures, counted separately
    #[serde(default = "default_quota_max_retries")]
    pub quota_max_retries: u32,

    /// First backoff delay in milliseconds, doubled on each retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff cap in milliseconds
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Wait after a quota failure, in seconds
    #[serde(default = "default_quota_cooldown_secs")]
    pub quota_cooldown_secs: u64,

    /// Hard timeout for a single backend call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            quota_max_retries: default_quota_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            quota_cooldown_secs: default_quota_cooldown_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Run settings for the pipeline coordinator
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Maximum number of titles translated concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seconds in-flight titles may finish after cancellation
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Process at most this many titles
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            grace_period_secs: default_grace_period_secs(),
            limit: None,
        }
    }
}

/// Translation cache settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct CacheConfig {
    /// Cache file; the platform data directory when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Skip the cache entirely (in-memory store for the run)
    #[serde(default)]
    pub disabled: bool,
}

/// Record source selection
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Pre-exported query results in a CSV file
    Csv {
        /// Input file
        #[serde(default = "default_input_file")]
        path: PathBuf,
        /// Column holding the record identifier
        #[serde(default = "default_identifier_column")]
        identifier_column: String,
        /// Column holding the source-script title
        #[serde(default = "default_title_column")]
        title_column: String,
    },
    /// SPARQL endpoint returning JSON results
    Sparql {
        /// Endpoint URL
        endpoint: String,
        /// Query text
        query: String,
        /// Variable bound to the record identifier
        #[serde(default = "default_identifier_variable")]
        identifier_variable: String,
        /// Variable bound to the title
        #[serde(default = "default_title_variable")]
        title_variable: String,
        /// Shorten identifier URIs to their local name
        #[serde(default = "default_true")]
        strip_namespace: bool,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Csv {
            path: default_input_file(),
            identifier_column: default_identifier_column(),
            title_column: default_title_column(),
        }
    }
}

/// Output settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OutputConfig {
    /// Base path; `_translations.csv` and `_failures.csv` are appended
    #[serde(default = "default_output_base")]
    pub base: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base: default_output_base(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching filter for the `log` facade
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Environment variable consulted for the Anthropic key
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Upper bound for the worker pool
pub const MAX_WORKERS: usize = 64;

fn default_source_language() -> String {
    "bo".to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_quota_max_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    500 // doubled on each retry
}

fn default_backoff_max_ms() -> u64 {
    8000
}

fn default_quota_cooldown_secs() -> u64 {
    60
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_workers() -> usize {
    4
}

fn default_grace_period_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_input_file() -> PathBuf {
    PathBuf::from("tibetan_titles.csv")
}

fn default_identifier_column() -> String {
    "book_id".to_string()
}

fn default_title_column() -> String {
    "tibetan_title".to_string()
}

fn default_identifier_variable() -> String {
    "id".to_string()
}

fn default_title_variable() -> String {
    "title".to_string()
}

fn default_output_base() -> String {
    "tibetan_titles".to_string()
}

fn default_api_key_file() -> String {
    "ankey.txt".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}

impl Config {
    /// Load the configuration, writing a default file when none exists
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let file = File::open(config_path)
                .with_context(|| format!("Failed to open config file: {}", config_path.display()))?;

            let reader = BufReader::new(file);
            serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
        } else {
            warn!(
                "Config file not found at '{}', creating default config.",
                config_path.display()
            );

            let config = Config::default();
            config.save(config_path)?;
            Ok(config)
        }
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, config_path: &Path) -> Result<()> {
        let config_json =
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;

        std::fs::write(config_path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", config_path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        crate::language_utils::validate_language_code(&self.source_language)
            .context("Invalid source language")?;
        crate::language_utils::validate_language_code(&self.target_language)
            .context("Invalid target language")?;

        if self.pipeline.workers == 0 || self.pipeline.workers > MAX_WORKERS {
            return Err(anyhow!(
                "Worker pool size must be between 1 and {}, got {}",
                MAX_WORKERS,
                self.pipeline.workers
            ));
        }

        if self.pipeline.limit == Some(0) {
            return Err(anyhow!("Record limit must be at least 1 when set"));
        }

        if self.retry.timeout_secs == 0 {
            return Err(anyhow!("Backend call timeout must be at least 1 second"));
        }

        if self.retry.backoff_base_ms > self.retry.backoff_max_ms {
            return Err(anyhow!(
                "Backoff base ({} ms) exceeds backoff cap ({} ms)",
                self.retry.backoff_base_ms,
                self.retry.backoff_max_ms
            ));
        }

        if !(0.0..=1.0).contains(&self.translation.temperature) {
            return Err(anyhow!(
                "Temperature must be between 0.0 and 1.0, got {}",
                self.translation.temperature
            ));
        }

        if let SourceConfig::Sparql { endpoint, query, .. } = &self.source {
            url::Url::parse(endpoint)
                .with_context(|| format!("Invalid SPARQL endpoint: {}", endpoint))?;
            if query.trim().is_empty() {
                return Err(anyhow!("SPARQL source requires a query"));
            }
        }

        if self.output.base.trim().is_empty() {
            return Err(anyhow!("Output base path must not be empty"));
        }

        if self.translation.provider.requires_api_key() && self.translation.get_api_key()?.is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider (config, key file or {})",
                self.translation.provider.display_name(),
                ANTHROPIC_API_KEY_ENV
            ));
        }

        Ok(())
    }

    /// Cache file location, falling back to the platform data directory
    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache.path {
            Some(path) => Ok(path.clone()),
            None => DatabaseConnection::default_database_path(),
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            retry: RetryConfig::default(),
            pipeline: PipelineConfig::default(),
            cache: CacheConfig::default(),
            source: SourceConfig::default(),
            output: OutputConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Mutable access to the active provider configuration, created on demand
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        match self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            Some(index) => &mut self.available_providers[index],
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider.clone()));
                let last = self.available_providers.len() - 1;
                &mut self.available_providers[last]
            }
        }
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        // Default fallback based on provider type
        match self.provider {
            TranslationProvider::Anthropic => default_anthropic_model(),
            TranslationProvider::Ollama => default_ollama_model(),
            TranslationProvider::Mock => String::new(),
        }
    }

    /// Get the API key for the active provider
    ///
    /// Looks at the configured key, then the key file, then the
    /// `ANTHROPIC_API_KEY` environment variable. A configured key file that
    /// cannot be read is an error; a missing key is an empty string.
    pub fn get_api_key(&self) -> Result<String> {
        if !self.provider.requires_api_key() {
            return Ok(String::new());
        }

        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.trim().is_empty() {
                return Ok(provider_config.api_key.trim().to_string());
            }

            if let Some(key_file) = &provider_config.api_key_file {
                if key_file.exists() {
                    let key = std::fs::read_to_string(key_file)
                        .with_context(|| format!("Failed to read API key file: {}", key_file.display()))?;
                    let key = key.trim();
                    if !key.is_empty() {
                        return Ok(key.to_string());
                    }
                }
            }
        }

        Ok(std::env::var(ANTHROPIC_API_KEY_ENV)
            .map(|key| key.trim().to_string())
            .unwrap_or_default())
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        // Default fallback based on provider type
        match self.provider {
            TranslationProvider::Anthropic => default_anthropic_endpoint(),
            TranslationProvider::Ollama => default_ollama_endpoint(),
            TranslationProvider::Mock => String::new(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Anthropic),
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::Mock),
            ],
            temperature: 0.0,
        }
    }
}
