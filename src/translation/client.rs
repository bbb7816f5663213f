/*!
 * Translation client: one title in, one translation out.
 *
 * Wraps a `TranslationBackend` with the retry policy and a hard per-call
 * timeout. The client has no side effects besides backend calls; caching is
 * the pipeline's concern.
 */

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use super::retry::RetryPolicy;
use crate::errors::{BackendError, TranslationError};
use crate::providers::{TranslationBackend, TranslationRequest};

/// Retrying wrapper around a translation backend
#[derive(Debug, Clone)]
pub struct TranslationClient {
    /// Backend performing the actual calls
    backend: Arc<dyn TranslationBackend>,
    /// Retry, backoff and timeout settings
    policy: RetryPolicy,
    /// Source language tag sent with every request
    source_language: String,
}

impl TranslationClient {
    /// Create a new translation client
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        policy: RetryPolicy,
        source_language: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            policy,
            source_language: source_language.into(),
        }
    }

    /// Retry policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Name of the wrapped backend
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Translate one title into `target_language`
    ///
    /// Transient failures (including timeouts) are retried up to
    /// `max_retries` times with jittered exponential backoff; quota failures
    /// wait the quota cool-down and use their own budget; permanent failures
    /// return immediately.
    pub async fn translate(&self, title: &str, target_language: &str) -> Result<String, TranslationError> {
        let request = TranslationRequest::new(title, &self.source_language, target_language);

        let mut attempts: u32 = 0;
        let mut transient_retries: u32 = 0;
        let mut quota_retries: u32 = 0;

        loop {
            attempts += 1;

            let delay = match self.call_once(&request).await {
                Ok(text) => {
                    if attempts > 1 {
                        debug!("Translation succeeded after {} attempts", attempts);
                    }
                    return Ok(text);
                }
                Err(BackendError::Permanent(message)) => {
                    return Err(TranslationError::Permanent { attempts, message });
                }
                Err(BackendError::Transient(message)) => {
                    if transient_retries >= self.policy.max_retries {
                        return Err(TranslationError::Transient { attempts, message });
                    }
                    transient_retries += 1;
                    let delay = self.policy.backoff_delay(transient_retries);
                    warn!(
                        "Transient translation error: {} - retry {}/{} in {:?}",
                        message, transient_retries, self.policy.max_retries, delay
                    );
                    delay
                }
                Err(BackendError::QuotaExceeded(message)) => {
                    if quota_retries >= self.policy.quota_max_retries {
                        return Err(TranslationError::QuotaExceeded { attempts, message });
                    }
                    quota_retries += 1;
                    let delay = self.policy.quota_cooldown;
                    warn!(
                        "Translation quota exceeded: {} - retry {}/{} in {:?}",
                        message, quota_retries, self.policy.quota_max_retries, delay
                    );
                    delay
                }
            };

            tokio::time::sleep(delay).await;
        }
    }

    /// One backend call under the hard timeout
    async fn call_once(&self, request: &TranslationRequest) -> Result<String, BackendError> {
        let timeout: Duration = self.policy.call_timeout;
        match tokio::time::timeout(timeout, self.backend.translate(request)).await {
            Ok(result) => result.map(|response| response.text),
            Err(_) => Err(BackendError::Transient(format!(
                "{} call timed out after {:?}",
                self.backend.name(),
                timeout
            ))),
        }
    }
}
