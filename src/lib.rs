/*!
 * # TitlewAI - catalogue title translation with AI
 *
 * A Rust library that enriches bibliographic title records with
 * machine-translated titles.
 *
 * ## Features
 *
 * - Read title records from a CSV export or a SPARQL endpoint
 * - Translate titles using AI providers:
 *   - Anthropic API
 *   - Ollama (local LLM)
 * - Persistent translation cache, so repeated titles and reruns cost nothing
 * - Retries with exponential backoff, quota cool-down and per-call timeouts
 * - Bounded concurrency with output in input order
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `app_controller`: Wires configuration to sources, backends and sinks
 * - `source`: Record sources (`RecordSource` trait, CSV, SPARQL)
 * - `translation`: The translation core:
 *   - `translation::cache`: Persistent translation cache
 *   - `translation::client`: Retrying translation client
 *   - `translation::retry`: Backoff policy
 *   - `translation::pipeline`: Pipeline coordinator
 * - `providers`: Backend implementations (Anthropic, Ollama, mock)
 * - `sink`: Output writers (`RecordSink` trait, CSV)
 * - `database`: SQLite connection and schema behind the cache
 * - `record`: Record types flowing through the pipeline
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod errors;
pub mod language_utils;
pub mod providers;
pub mod record;
pub mod sink;
pub mod source;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, BackendError, PipelineError, SourceError, TranslationError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use record::{RecordStatus, SourceRecord, TitleRecord, TranslatedTitle};
pub use sink::{CsvSink, RecordSink};
pub use source::{RecordSource, VecSource};
pub use translation::{PipelineCoordinator, PipelineOptions, RunOutcome, RunSummary};
