/*!
 * Backend implementations for the translation capability.
 *
 * This module contains client implementations for the AI backends:
 * - Anthropic: Anthropic Messages API
 * - Ollama: Local LLM server
 * - Mock: deterministic backend for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::BackendError;

/// A request to translate one title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    /// Title text in the source script
    pub text: String,
    /// Source language tag
    pub source_language: String,
    /// Target language tag
    pub target_language: String,
}

impl TranslationRequest {
    /// Create a new translation request
    pub fn new(
        text: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }
}

/// A successful backend answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResponse {
    /// Translated text, already cleaned of quotes and whitespace
    pub text: String,
}

/// Common trait for all translation backends
///
/// A backend performs exactly one network call per `translate` invocation.
/// Retry, timeout and caching live above this trait.
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Translate one title
    async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResponse, BackendError>;

    /// Short backend name for logs
    fn name(&self) -> &str;
}

/// Build the system prompt for a language pair
pub fn system_prompt(request: &TranslationRequest) -> String {
    let source = language_name_or_tag(&request.source_language);
    let target = language_name_or_tag(&request.target_language);
    format!(
        "You are an expert translator of {source} bibliographic titles. \
         Translate the title the user sends from {source} into {target}. \
         Reply with the translated title only: no quotes, no notes, no transliteration."
    )
}

fn language_name_or_tag(tag: &str) -> String {
    crate::language_utils::get_language_name(tag).unwrap_or_else(|_| tag.to_string())
}

/// Clean raw model output into a bare title
///
/// Returns a permanent error when nothing usable is left.
pub fn clean_translation(raw: &str) -> Result<String, BackendError> {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");

    let stripped = line
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”' | '«' | '»'))
        .trim();

    if stripped.is_empty() {
        return Err(BackendError::Permanent("Backend returned an empty translation".to_string()));
    }

    Ok(stripped.to_string())
}

/// Map a reqwest transport error onto the backend taxonomy
pub(crate) fn classify_transport_error(backend: &str, error: reqwest::Error) -> BackendError {
    if error.is_builder() {
        BackendError::Permanent(format!("Invalid {} request: {}", backend, error))
    } else {
        BackendError::Transient(format!("Failed to reach {}: {}", backend, error))
    }
}

pub mod anthropic;
pub mod mock;
pub mod ollama;
