/*!
 * Tests for the retrying translation client over real HTTP backends
 */

use std::sync::Arc;
use std::time::Duration;

use titlewai::errors::TranslationError;
use titlewai::providers::anthropic::AnthropicBackend;
use titlewai::providers::ollama::OllamaBackend;
use titlewai::translation::{RetryPolicy, TranslationClient};

use crate::common::mock_server::{CannedResponse, MockServer};

fn anthropic_client(server: &MockServer, policy: RetryPolicy) -> TranslationClient {
    let backend = AnthropicBackend::new("test-key", server.url(), "claude-3-5-haiku-latest");
    TranslationClient::new(Arc::new(backend), policy, "bo")
}

#[tokio::test]
async fn test_translate_withServerErrorThenSuccess_shouldRetry() {
    let server = MockServer::start(vec![
        CannedResponse::json(503, r#"{"type":"error","error":{"type":"api_error","message":"busy"}}"#),
        CannedResponse::json(529, r#"{"type":"error","error":{"type":"overloaded_error","message":"overloaded"}}"#),
        CannedResponse::anthropic_text("The Translated Words of the Buddha"),
    ])
    .await;
    let client = anthropic_client(&server, RetryPolicy::immediate(3));

    let result = client.translate("བཀའ་འགྱུར།", "en").await.unwrap();

    assert_eq!(result, "The Translated Words of the Buddha");
    assert_eq!(server.request_count(), 3);
}

#[tokio::test]
async fn test_translate_withUnauthorized_shouldFailWithoutRetry() {
    let server = MockServer::start(vec![CannedResponse::json(
        401,
        r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
    )])
    .await;
    let client = anthropic_client(&server, RetryPolicy::immediate(3));

    let error = client.translate("title", "en").await.unwrap_err();

    assert!(matches!(error, TranslationError::Permanent { attempts: 1, .. }));
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn test_translate_withQuotaExhausted_shouldUseQuotaBudget() {
    let server = MockServer::start(vec![CannedResponse::json(
        429,
        r#"{"type":"error","error":{"type":"rate_limit_error","message":"Your credit balance is too low"}}"#,
    )])
    .await;
    let mut policy = RetryPolicy::immediate(0);
    policy.quota_max_retries = 2;
    let client = anthropic_client(&server, policy);

    let error = client.translate("title", "en").await.unwrap_err();

    assert!(matches!(error, TranslationError::QuotaExceeded { attempts: 3, .. }));
    assert_eq!(server.request_count(), 3);
}

#[tokio::test]
async fn test_translate_withPlainRateLimit_shouldUseTransientBudget() {
    let server = MockServer::start(vec![CannedResponse::json(
        429,
        r#"{"type":"error","error":{"type":"rate_limit_error","message":"Number of requests exceeded"}}"#,
    )])
    .await;
    let client = anthropic_client(&server, RetryPolicy::immediate(1));

    let error = client.translate("title", "en").await.unwrap_err();

    assert!(matches!(error, TranslationError::Transient { attempts: 2, .. }));
}

#[tokio::test]
async fn test_translate_withEmptyModelOutput_shouldBePermanent() {
    let server = MockServer::start(vec![CannedResponse::ollama_text("  \n ")]).await;
    let backend = OllamaBackend::new(server.url(), "llama3.2:3b");
    let client = TranslationClient::new(Arc::new(backend), RetryPolicy::immediate(3), "bo");

    let error = client.translate("title", "en").await.unwrap_err();

    assert!(matches!(error, TranslationError::Permanent { .. }));
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn test_translate_withUnreachableBackend_shouldExhaustTransientRetries() {
    let backend = OllamaBackend::new("http://127.0.0.1:9", "llama3.2:3b");
    let policy = RetryPolicy::immediate(2).with_call_timeout(Duration::from_secs(2));
    let client = TranslationClient::new(Arc::new(backend), policy, "bo");

    let error = client.translate("title", "en").await.unwrap_err();

    assert_eq!(error.attempts(), 3);
    assert!(matches!(error, TranslationError::Transient { .. }));
}
