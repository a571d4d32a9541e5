/*!
 * Tests for the provider client adapter
 */

use std::sync::Arc;
use std::time::Duration;

use doctrans::errors::ProviderError;
use doctrans::providers::mock::MockProvider;
use doctrans::translation::{ClientOptions, RequestContext, TranslationClient};

fn ctx() -> RequestContext<'static> {
    RequestContext {
        source_language: "en",
        target_language: "fr",
        model: "mock-model",
        instructions: Some("Keep it short."),
    }
}

fn client(provider: &MockProvider) -> TranslationClient {
    TranslationClient::new(Arc::new(provider.clone()), ClientOptions::default())
}

#[tokio::test]
async fn test_translateBatch_withWorkingProvider_shouldUseOneCall() {
    let provider = MockProvider::working();
    let texts = ["Hello", "Quarterly results", "Thank you"];

    let results = client(&provider).translate_batch(&texts, &ctx(), None).await.unwrap();

    assert_eq!(provider.call_count(), 1);
    assert_eq!(provider.batch_call_count(), 1);
    let translated: Vec<String> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(translated, texts.iter().map(|t| MockProvider::translate_text(t)).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_translateBatch_withMalformedAnswer_shouldFallBackToSingleCalls() {
    let provider = MockProvider::malformed_batches();
    let texts = ["one", "two", "three", "four", "five"];

    let results = client(&provider).translate_batch(&texts, &ctx(), None).await.unwrap();

    assert_eq!(provider.batch_call_count(), 1);
    assert_eq!(provider.single_call_count(), 5);
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(results[3].as_deref().unwrap(), MockProvider::translate_text("four"));
}

#[tokio::test]
async fn test_translateBatch_withOneRejectedItem_shouldIsolateIt() {
    let provider = MockProvider::working().with_failure("two", ProviderError::from_status(422, "unprocessable", None));
    let texts = ["one", "two", "three"];

    let results = client(&provider).translate_batch(&texts, &ctx(), None).await.unwrap();

    assert!(results[0].is_ok());
    assert_eq!(results[1].as_ref().unwrap_err().code(), "invalid_request");
    assert!(results[2].is_ok());
    // The failed batch call plus one call per item
    assert_eq!(provider.call_count(), 4);
}

#[tokio::test]
async fn test_translateBatch_withTransientBatchError_shouldNotIsolateImmediately() {
    let provider = MockProvider::working().with_failure("two", ProviderError::from_status(503, "busy", None));
    let texts = ["one", "two", "three"];

    let result = client(&provider).translate_batch(&texts, &ctx(), None).await;

    assert_eq!(result.unwrap_err().code(), "server_error");
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_translateIndividually_shouldSendOneCallPerText() {
    let provider = MockProvider::working().with_failure("two", ProviderError::from_status(503, "busy", None));
    let texts = ["one", "two", "three"];

    let results = client(&provider).translate_individually(&texts, &ctx(), None).await.unwrap();

    assert_eq!(provider.single_call_count(), 3);
    assert!(results[0].is_ok() && results[2].is_ok());
    assert!(results[1].as_ref().unwrap_err().is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_translateOne_withSlowProvider_shouldTimeOut() {
    let provider = MockProvider::slow(Duration::from_secs(30));
    let client = TranslationClient::new(
        Arc::new(provider.clone()),
        ClientOptions {
            request_timeout: Duration::from_secs(2),
            ..ClientOptions::default()
        },
    );

    let error = client.translate_one("Hello", &ctx()).await.unwrap_err();

    assert_eq!(error, ProviderError::Timeout(Duration::from_secs(2)));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_translateBatch_withEmptyInput_shouldNotCallProvider() {
    let provider = MockProvider::working();
    let texts: [&str; 0] = [];

    let results = client(&provider).translate_batch(&texts, &ctx(), None).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_testConnection_withMock_shouldSucceed() {
    let provider = MockProvider::working();
    assert!(client(&provider).test_connection().await.is_ok());
}
