/*!
 * Mock backend implementation for testing.
 *
 * This module provides a mock backend that simulates different behaviors:
 * - `MockBackend::working()` - Always succeeds with a translated text
 * - `MockBackend::failing(error)` - Always fails with the given error
 * - `MockBackend::fail_first(n, error)` - Fails n times, then succeeds
 * - `MockBackend::random_latency(max_ms)` - Succeeds after a random delay
 *
 * Every clone shares the same call counter, so tests can assert on the
 * exact number of backend calls made through the pipeline.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{TranslationBackend, TranslationRequest, TranslationResponse};
use crate::errors::BackendError;

/// Behavior mode for the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Always fails with the given error
    Failing(BackendError),
    /// Fails the first `failures` calls, then succeeds
    FailFirst {
        /// Number of failing calls
        failures: usize,
        /// Error returned by each failing call
        error: BackendError,
    },
    /// Succeeds after a fixed delay
    Slow {
        /// Delay in milliseconds
        delay_ms: u64,
    },
    /// Succeeds after a random delay in `0..=max_ms`
    RandomLatency {
        /// Upper bound of the delay in milliseconds
        max_ms: u64,
    },
}

/// Mock backend for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockBackend {
    /// Behavior mode
    behavior: MockBehavior,
    /// Fixed answers by source text
    translations: Arc<HashMap<String, String>>,
    /// Per-title failures that override the behavior
    title_failures: Arc<HashMap<String, BackendError>>,
    /// Number of calls received, shared across clones
    call_count: Arc<AtomicUsize>,
    /// Requests received, in arrival order
    requests: Arc<Mutex<Vec<TranslationRequest>>>,
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            translations: Arc::new(HashMap::new()),
            title_failures: Arc::new(HashMap::new()),
            call_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a working mock backend that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock backend that always fails
    pub fn failing(error: BackendError) -> Self {
        Self::new(MockBehavior::Failing(error))
    }

    /// Create a mock backend that fails `failures` times before succeeding
    pub fn fail_first(failures: usize, error: BackendError) -> Self {
        Self::new(MockBehavior::FailFirst { failures, error })
    }

    /// Create a slow mock backend
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Create a mock backend with random per-call latency
    pub fn random_latency(max_ms: u64) -> Self {
        Self::new(MockBehavior::RandomLatency { max_ms })
    }

    /// Answer specific titles with fixed translations
    pub fn with_translations<S: AsRef<str>>(mut self, pairs: &[(S, S)]) -> Self {
        self.translations = Arc::new(
            pairs
                .iter()
                .map(|(source, target)| (source.as_ref().to_string(), target.as_ref().to_string()))
                .collect(),
        );
        self
    }

    /// Fail every call for one specific title
    pub fn with_failure_for(mut self, title: impl Into<String>, error: BackendError) -> Self {
        let mut failures = (*self.title_failures).clone();
        failures.insert(title.into(), error);
        self.title_failures = Arc::new(failures);
        self
    }

    /// Number of calls received so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Copy of the requests received so far
    pub fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().clone()
    }

    /// The answer a working backend gives for a request
    pub fn expected_translation(&self, request: &TranslationRequest) -> String {
        self.translations
            .get(&request.text)
            .cloned()
            .unwrap_or_else(|| format!("[{}] {}", request.target_language, request.text))
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResponse, BackendError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        match &self.behavior {
            MockBehavior::Working => {}
            MockBehavior::Failing(error) => return Err(error.clone()),
            MockBehavior::FailFirst { failures, error } => {
                if count < *failures {
                    return Err(error.clone());
                }
            }
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
            }
            MockBehavior::RandomLatency { max_ms } => {
                let delay_ms = rand::rng().random_range(0..=*max_ms);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }

        if let Some(error) = self.title_failures.get(&request.text) {
            return Err(error.clone());
        }

        Ok(TranslationResponse {
            text: self.expected_translation(request),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
