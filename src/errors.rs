/*!
 * Error types for the titlewai application.
 *
 * This module contains custom error types for the different layers of the
 * pipeline, using the thiserror crate for ergonomic error definitions:
 *
 * - `BackendError`: a single failed call to a translation backend
 * - `TranslationError`: the final outcome of a translation after retries
 * - `SourceError`: failures while fetching records from the catalog
 * - `CacheError`: degraded cache conditions (never fatal)
 * - `PipelineError`: conditions that abort a whole run
 */

use thiserror::Error;

/// Errors returned by a single translation backend call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Network failure, timeout, server error or rate limit; worth retrying
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// Usage quota exhausted; retry only after a longer cool-down
    #[error("Backend quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Malformed input, unsupported language or explicit rejection
    #[error("Permanent backend error: {0}")]
    Permanent(String),
}

impl BackendError {
    /// Classify an HTTP error status and body the way the retry policy expects
    pub fn from_status(status_code: u16, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status_code, body);
        match status_code {
            429 => {
                let lower = body.to_lowercase();
                if lower.contains("quota") || lower.contains("credit") {
                    Self::QuotaExceeded(message)
                } else {
                    Self::Transient(message)
                }
            }
            408 | 529 => Self::Transient(message),
            500..=599 => Self::Transient(message),
            _ => Self::Permanent(message),
        }
    }

    /// Whether the retry policy should try again
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Final outcome of a failed translation, after the retry policy gave up
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// Transient failures exhausted the retry budget
    #[error("Transient error after {attempts} attempt(s): {message}")]
    Transient {
        /// Number of backend calls made
        attempts: u32,
        /// Last error message
        message: String,
    },

    /// Quota failures exhausted the quota retry budget
    #[error("Quota exceeded after {attempts} attempt(s): {message}")]
    QuotaExceeded {
        /// Number of backend calls made
        attempts: u32,
        /// Last error message
        message: String,
    },

    /// The backend rejected the request; not retried
    #[error("Permanent error after {attempts} attempt(s): {message}")]
    Permanent {
        /// Number of backend calls made
        attempts: u32,
        /// Error message
        message: String,
    },
}

impl TranslationError {
    /// Number of backend calls issued before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Transient { attempts, .. }
            | Self::QuotaExceeded { attempts, .. }
            | Self::Permanent { attempts, .. } => *attempts,
        }
    }
}

/// Errors raised by a record source
#[derive(Error, Debug)]
pub enum SourceError {
    /// Input file could not be read
    #[error("Failed to read records: {0}")]
    Io(#[from] std::io::Error),

    /// CSV input was malformed
    #[error("Malformed CSV input: {0}")]
    Csv(#[from] csv::Error),

    /// Required column or query variable is missing
    #[error("Missing field '{0}' in source records")]
    MissingField(String),

    /// Query endpoint failed
    #[error("Query endpoint error: {0}")]
    Endpoint(String),

    /// Query response could not be parsed
    #[error("Failed to parse query results: {0}")]
    Parse(String),
}

/// Degraded cache conditions; these never abort a run
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backing store is missing, corrupt or unreachable
    #[error("Translation cache unavailable: {0}")]
    Unavailable(String),

    /// Backing file was written by a newer release
    #[error("Cache schema v{found} is newer than supported v{supported}")]
    SchemaTooNew {
        /// Version recorded in the file
        found: i32,
        /// Highest version this build understands
        supported: i32,
    },
}

/// Errors that abort a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The same identifier appeared twice in one run
    #[error("Duplicate record identifier '{identifier}' at positions {first_position} and {position}")]
    DuplicateRecord {
        /// The duplicated identifier
        identifier: String,
        /// Position of the first occurrence
        first_position: usize,
        /// Position of the duplicate
        position: usize,
    },

    /// The record source failed
    #[error("Record source error: {0}")]
    Source(#[from] SourceError),

    /// The sink rejected output
    #[error("Sink error: {0}")]
    Sink(String),

    /// Invalid pipeline configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a pipeline run
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<PipelineError>() {
            Ok(pipeline) => Self::Pipeline(pipeline),
            Err(other) => Self::Unknown(format!("{:#}", other)),
        }
    }
}
