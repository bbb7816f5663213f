/*!
 * Provider tests against a local HTTP server
 */

use titlewai::errors::BackendError;
use titlewai::providers::anthropic::AnthropicBackend;
use titlewai::providers::ollama::OllamaBackend;
use titlewai::providers::{TranslationBackend, TranslationRequest};

use crate::common::mock_server::{CannedResponse, MockServer};

fn request(text: &str) -> TranslationRequest {
    TranslationRequest::new(text, "bo", "en")
}

#[tokio::test]
async fn test_anthropic_translate_shouldSendTitleAndLanguagePair() {
    let server = MockServer::start(vec![CannedResponse::anthropic_text("\"The Jewel Ornament of Liberation\"")]).await;
    let backend = AnthropicBackend::new("test-key", server.url(), "claude-3-5-haiku-latest");

    let response = backend.translate(&request("ཐར་པ་རིན་པོ་ཆེའི་རྒྱན།")).await.unwrap();

    assert_eq!(response.text, "The Jewel Ornament of Liberation");

    let body: serde_json::Value = serde_json::from_str(&server.request_bodies()[0]).unwrap();
    assert_eq!(body["model"], "claude-3-5-haiku-latest");
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "ཐར་པ་རིན་པོ་ཆེའི་རྒྱན།");
    let system = body["system"].as_str().unwrap();
    assert!(system.contains("Tibetan"));
    assert!(system.contains("English"));
}

#[tokio::test]
async fn test_anthropic_translate_withUnparsableBody_shouldBePermanent() {
    let server = MockServer::start(vec![CannedResponse::json(200, "not json")]).await;
    let backend = AnthropicBackend::new("test-key", server.url(), "claude-3-5-haiku-latest");

    let error = backend.translate(&request("title")).await.unwrap_err();

    assert!(matches!(error, BackendError::Permanent(_)));
}

#[tokio::test]
async fn test_anthropic_translate_withServerError_shouldBeTransient() {
    let server = MockServer::start(vec![CannedResponse::json(500, "{}")]).await;
    let backend = AnthropicBackend::new("test-key", server.url(), "claude-3-5-haiku-latest");

    let error = backend.translate(&request("title")).await.unwrap_err();

    assert!(error.is_retryable());
    assert!(matches!(error, BackendError::Transient(_)));
}

#[tokio::test]
async fn test_ollama_translate_shouldDisableStreamingAndCleanOutput() {
    let server = MockServer::start(vec![CannedResponse::ollama_text("\n  History of Tibet  \nNote: literal rendering")]).await;
    let backend = OllamaBackend::new(format!("{}/", server.url()), "llama3.2:3b");

    let response = backend.translate(&request("བོད་ཀྱི་ལོ་རྒྱུས།")).await.unwrap();

    assert_eq!(response.text, "History of Tibet");

    let body: serde_json::Value = serde_json::from_str(&server.request_bodies()[0]).unwrap();
    assert_eq!(body["stream"], false);
    assert_eq!(body["model"], "llama3.2:3b");
    assert_eq!(body["prompt"], "བོད་ཀྱི་ལོ་རྒྱུས།");
}

#[tokio::test]
async fn test_ollama_translate_withMissingModel_shouldBePermanent() {
    let server = MockServer::start(vec![CannedResponse::json(404, r#"{"error":"model 'nope' not found"}"#)]).await;
    let backend = OllamaBackend::new(server.url(), "nope");

    let error = backend.translate(&request("title")).await.unwrap_err();

    match error {
        BackendError::Permanent(message) => assert!(message.contains("not found")),
        other => panic!("unexpected error: {:?}", other),
    }
}
