use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{TranslationBackend, TranslationRequest, TranslationResponse};
use crate::errors::BackendError;

/// Ollama backend for a local LLM server
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    /// HTTP client for API requests
    client: Client,
    /// Base URL for the Ollama API
    base_url: String,
    /// Model name
    model: String,
    /// Sampling temperature
    temperature: f32,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize)]
pub struct GenerationRequest {
    /// Model name to use
    pub model: String,

    /// Prompt to generate from
    pub prompt: String,

    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Whether to stream the response
    pub stream: bool,

    /// Model options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerationOptions>,
}

/// Sampling options for a generate request
#[derive(Debug, Serialize)]
pub struct GenerationOptions {
    /// Temperature for generation
    pub temperature: f32,
}

/// Response from the generate endpoint
#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,

    /// Generated text
    pub response: String,

    /// Whether generation finished
    #[serde(default)]
    pub done: bool,
}

/// Error body returned by Ollama
#[derive(Debug, Deserialize)]
struct OllamaErrorBody {
    error: String,
}

impl GenerationRequest {
    /// Create a new non-streaming generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            stream: false,
            options: None,
        }
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options = Some(GenerationOptions { temperature });
        self
    }
}

impl OllamaBackend {
    /// Create a backend from a base URL such as `http://localhost:11434`
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            model: model.into(),
            temperature: 0.0,
        }
    }

    /// Override the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Ollama reports a missing model as 404 with a JSON error body
    fn status_error(status: u16, body: &str) -> BackendError {
        let message = serde_json::from_str::<OllamaErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.to_string());
        BackendError::from_status(status, &message)
    }
}

#[async_trait]
impl TranslationBackend for OllamaBackend {
    async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResponse, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerationRequest::new(&self.model, &request.text)
            .system(super::system_prompt(request))
            .temperature(self.temperature);

        debug!("Sending title to Ollama model {}", self.model);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| super::classify_transport_error("Ollama API", e))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| BackendError::Transient(format!("Failed to read Ollama API response: {}", e)))?;

        if !status.is_success() {
            error!("Ollama API error ({}): {}", status, response_text);
            return Err(Self::status_error(status.as_u16(), &response_text));
        }

        let parsed = serde_json::from_str::<GenerationResponse>(&response_text).map_err(|e| {
            BackendError::Permanent(format!("Failed to parse Ollama API response: {}", e))
        })?;

        let text = super::clean_translation(&parsed.response)?;
        Ok(TranslationResponse { text })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
