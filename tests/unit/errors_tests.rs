/*!
 * Tests for error classification
 */

use std::time::Duration;

use doctrans::errors::{AppError, ProviderError, TranslationError};
use doctrans::translation::{FailureKind, UnitError, UnitOutcome};

#[test]
fn test_fromStatus_withRateLimit_shouldBeRetryableWithHint() {
    let error = ProviderError::from_status(429, "slow down", Some(7));

    assert!(error.is_retryable());
    assert_eq!(error.code(), "rate_limited");
    assert_eq!(error.retry_after(), Some(Duration::from_secs(7)));
}

#[test]
fn test_fromStatus_withServerErrors_shouldBeRetryable() {
    for status in [500, 502, 503, 504] {
        let error = ProviderError::from_status(status, "boom", None);
        assert!(error.is_retryable(), "status {} should be retryable", status);
        assert_eq!(error.code(), "server_error");
    }
}

#[test]
fn test_fromStatus_withAuthErrors_shouldBeFatal() {
    for status in [401, 403] {
        let error = ProviderError::from_status(status, "no", None);
        assert!(!error.is_retryable());
        assert!(error.affects_whole_batch());
        assert_eq!(error.code(), "auth");
    }
}

#[test]
fn test_fromStatus_withBadRequest_shouldBeFatalPerItem() {
    let error = ProviderError::from_status(400, "bad", None);
    assert!(!error.is_retryable());
    assert!(!error.affects_whole_batch());
    assert_eq!(error.code(), "invalid_request");
}

#[test]
fn test_timeoutAndConnection_shouldBeRetryable() {
    assert!(ProviderError::Timeout(Duration::from_secs(1)).is_retryable());
    assert!(ProviderError::ConnectionError("reset".to_string()).is_retryable());
    assert!(ProviderError::ParseError("garbage".to_string()).is_retryable());
}

#[test]
fn test_unitError_fromProviderError_shouldCarryKindAndCode() {
    let transient = UnitError::from(&ProviderError::from_status(503, "down", None));
    assert_eq!(transient.kind, FailureKind::Transient);
    assert_eq!(transient.code, "server_error");

    let fatal = UnitError::from(&ProviderError::EmptyResponse);
    assert_eq!(fatal.kind, FailureKind::Fatal);
    assert_eq!(fatal.code, "empty_response");

    let cancelled = UnitError::from(&ProviderError::Cancelled);
    assert!(cancelled.is_cancelled());
    assert_eq!(cancelled.code, "cancelled");
}

#[test]
fn test_unitOutcome_withBlankAnswer_shouldBeFatalEmptyResponse() {
    let outcome = UnitOutcome::from_provider_result(Ok("   ".to_string()));
    match outcome {
        UnitOutcome::Failed { error, retryable } => {
            assert!(!retryable);
            assert_eq!(error.code, "empty_response");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_appError_fromTranslationError_shouldKeepMessage() {
    let error: AppError = TranslationError::Validation("duplicate id 'a'".to_string()).into();
    assert!(error.to_string().contains("duplicate id 'a'"));
}

#[test]
fn test_appError_fromIoError_shouldBeFileError() {
    let error: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
    assert!(matches!(error, AppError::File(_)));
}
