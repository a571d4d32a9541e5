/*!
 * End-to-end tests of the translation pipeline against the mock provider
 */

use std::time::Duration;

use doctrans::errors::{ProviderError, TranslationError};
use doctrans::providers::mock::MockProvider;
use doctrans::translation::{
    ClientOptions, FailureKind, JobOptions, JobStatus, PipelineOptions, RetryPolicy, TranslationUnit, UnitStatus,
};

use crate::common::{self, fragment_text, numbered_units, service_with, test_options};

fn rate_limited() -> ProviderError {
    ProviderError::from_status(429, "Too many requests", None)
}

#[tokio::test(start_paused = true)]
async fn test_translateJob_withOneRateLimitedUnit_shouldReturnPartialSuccess() {
    common::init_logging();
    let provider = MockProvider::working().with_failure(fragment_text(7), rate_limited());
    let (service, cache) = service_with(&provider, test_options(5, 2));

    let result = service
        .translate_job(numbered_units(12), &JobOptions::new("en"))
        .await
        .unwrap();

    // Planned as 5/5/2
    let mut batch_sizes: Vec<usize> = provider
        .calls()
        .iter()
        .filter(|c| c.is_batch)
        .map(|c| c.entries.len())
        .collect();
    batch_sizes.sort_unstable();
    assert_eq!(batch_sizes, vec![2, 5, 5]);

    assert_eq!(result.status(), JobStatus::PartialSuccess);
    assert_eq!(result.completed_units().len(), 11);
    assert_eq!(result.failed_units().len(), 1);

    let failed = result.unit("u7").unwrap();
    assert_eq!(failed.status, UnitStatus::Failed);
    assert_eq!(failed.attempt_count, 3);
    let error = failed.last_error.as_ref().unwrap();
    assert_eq!(error.kind, FailureKind::Transient);
    assert_eq!(error.code, "rate_limited");

    // Three batch calls, five isolated calls after the first backoff, one last retry
    assert_eq!(provider.call_count(), 9);
    assert_eq!(cache.len(), 11);
    // Siblings of u7 spend a second attempt once their batch is isolated
    assert_eq!(result.unit("u6").unwrap().attempt_count, 2);
    assert_eq!(result.unit("u1").unwrap().attempt_count, 1);
    assert_eq!(result.total_attempts(), 18);
    assert_eq!(result.cache_hits(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_translateJob_withRetries_shouldBackOffExponentially() {
    let provider = MockProvider::working().with_failure(fragment_text(7), rate_limited());
    let (service, _cache) = service_with(&provider, test_options(5, 2));

    service
        .translate_job(numbered_units(12), &JobOptions::new("en"))
        .await
        .unwrap();

    let calls = provider.calls_with(&fragment_text(7));
    assert_eq!(calls.len(), 3);
    assert!(calls[0].is_batch);

    let first_gap = calls[1].at - calls[0].at;
    let second_gap = calls[2].at - calls[1].at;
    assert!(first_gap >= Duration::from_millis(1000) && first_gap < Duration::from_millis(1100));
    assert!(second_gap >= Duration::from_millis(2000) && second_gap < Duration::from_millis(2100));
}

#[tokio::test(start_paused = true)]
async fn test_translateJob_withRateLimitedBatch_shouldBackOffBeforeIsolating() {
    let provider = MockProvider::working().with_failure(fragment_text(7), rate_limited());
    let (service, _cache) = service_with(&provider, test_options(5, 2));

    service
        .translate_job(numbered_units(12), &JobOptions::new("en"))
        .await
        .unwrap();

    let calls = provider.calls();
    let failed_batch = calls
        .iter()
        .find(|c| c.is_batch && c.entries.contains(&fragment_text(7)))
        .unwrap();
    let singles: Vec<_> = calls.iter().filter(|c| !c.is_batch).collect();

    assert_eq!(singles.len(), 6);
    assert!(singles.iter().all(|c| c.at - failed_batch.at >= Duration::from_millis(1000)));
}

#[tokio::test(start_paused = true)]
async fn test_translateJob_withHugeRetryAfterHint_shouldCapWait() {
    let provider = MockProvider::working().with_failure_times(
        fragment_text(1),
        ProviderError::from_status(429, "come back tomorrow", Some(86_400)),
        1,
    );
    let (service, _cache) = service_with(&provider, test_options(5, 1));

    let result = service
        .translate_job(numbered_units(1), &JobOptions::new("en"))
        .await
        .unwrap();

    assert_eq!(result.status(), JobStatus::Success);
    let calls = provider.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].at - calls[0].at, RetryPolicy::default().max_delay);
}

#[tokio::test(start_paused = true)]
async fn test_translateJob_withRetryAfterHint_shouldWaitAtLeastThatLong() {
    let provider = MockProvider::working().with_failure_times(
        fragment_text(1),
        ProviderError::from_status(429, "slow down", Some(5)),
        1,
    );
    let (service, _cache) = service_with(&provider, test_options(5, 1));

    let result = service
        .translate_job(numbered_units(1), &JobOptions::new("en"))
        .await
        .unwrap();

    assert_eq!(result.status(), JobStatus::Success);
    let calls = provider.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].at - calls[0].at >= Duration::from_secs(5));
}

#[tokio::test]
async fn test_translateJob_runTwice_shouldServeSecondRunFromCache() {
    let provider = MockProvider::working();
    let (service, _cache) = service_with(&provider, test_options(5, 2));

    let first = service
        .translate_job(numbered_units(12), &JobOptions::new("en"))
        .await
        .unwrap();
    let calls_after_first = provider.call_count();

    let second = service
        .translate_job(numbered_units(12), &JobOptions::new("en"))
        .await
        .unwrap();

    assert_eq!(provider.call_count(), calls_after_first);
    assert_eq!(second.cache_hits(), 12);
    assert_eq!(second.total_attempts(), 0);
    assert_eq!(first.translations(), second.translations());
    assert_ne!(first.job_id(), second.job_id());
}

#[tokio::test(start_paused = true)]
async fn test_translateJob_withRandomLatency_shouldPreserveInputOrder() {
    let provider = MockProvider::random_latency(1, 250);
    let (service, _cache) = service_with(&provider, test_options(3, 4));
    let units = numbered_units(25);
    let expected_ids: Vec<String> = units.iter().map(|u| u.id.clone()).collect();

    let result = service.translate_job(units, &JobOptions::new("en")).await.unwrap();

    let ids: Vec<String> = result.units().iter().map(|u| u.id.clone()).collect();
    assert_eq!(ids, expected_ids);
    for (index, unit) in result.units().iter().enumerate() {
        assert_eq!(
            unit.translated_text.as_deref(),
            Some(MockProvider::translate_text(&fragment_text(index + 1)).as_str())
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_translateJob_withSlowProvider_shouldNeverExceedConcurrency() {
    let provider = MockProvider::slow(Duration::from_millis(100));
    let (service, _cache) = service_with(&provider, test_options(2, 3));

    let result = service
        .translate_job(numbered_units(30), &JobOptions::new("en"))
        .await
        .unwrap();

    assert_eq!(result.status(), JobStatus::Success);
    assert_eq!(provider.call_count(), 15);
    assert_eq!(provider.max_in_flight(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_translateJob_withGroupDelay_shouldPauseLaterBatches() {
    let provider = MockProvider::working();
    let (service, _cache) = service_with(&provider, test_options(1, 2));

    service
        .translate_job(numbered_units(3), &JobOptions::new("en"))
        .await
        .unwrap();

    let calls = provider.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].at, calls[0].at);
    assert!(calls[2].at - calls[0].at >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_translateJob_withHangingProvider_shouldTimeOutAndRetry() {
    let provider = MockProvider::slow(Duration::from_secs(600));
    let options = PipelineOptions {
        client: ClientOptions {
            request_timeout: Duration::from_secs(1),
            ..ClientOptions::default()
        },
        ..test_options(5, 1)
    };
    let (service, _cache) = service_with(&provider, options);

    let result = service
        .translate_job(numbered_units(1), &JobOptions::new("en"))
        .await
        .unwrap();

    let unit = result.unit("u1").unwrap();
    assert_eq!(result.status(), JobStatus::Failure);
    assert_eq!(unit.attempt_count, 3);
    assert_eq!(unit.last_error.as_ref().unwrap().code, "timeout");
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn test_translateJob_withFatalError_shouldNotRetry() {
    let provider = MockProvider::working().with_failure(
        fragment_text(2),
        ProviderError::from_status(400, "content rejected", None),
    );
    let (service, _cache) = service_with(&provider, test_options(5, 1));

    let result = service
        .translate_job(numbered_units(3), &JobOptions::new("en"))
        .await
        .unwrap();

    let unit = result.unit("u2").unwrap();
    assert_eq!(unit.attempt_count, 1);
    assert_eq!(unit.last_error.as_ref().unwrap().kind, FailureKind::Fatal);
    assert_eq!(result.completed_units().len(), 2);
    // The failed batch call plus three isolated calls
    assert_eq!(provider.call_count(), 4);
}

#[tokio::test]
async fn test_translateJob_withAuthFailure_shouldFailEveryUnitOnce() {
    let provider = MockProvider::failing_with(ProviderError::AuthenticationError("bad key".to_string()));
    let (service, _cache) = service_with(&provider, test_options(5, 1));

    let result = service
        .translate_job(numbered_units(4), &JobOptions::new("en"))
        .await
        .unwrap();

    assert_eq!(result.status(), JobStatus::Failure);
    assert_eq!(provider.call_count(), 1);
    assert!(result.units().iter().all(|u| u.last_error.as_ref().unwrap().code == "auth"));
}

#[tokio::test]
async fn test_translateJob_withMalformedBatch_shouldTranslateIndividually() {
    let provider = MockProvider::malformed_batches();
    let (service, cache) = service_with(&provider, test_options(5, 1));

    let result = service
        .translate_job(numbered_units(5), &JobOptions::new("en"))
        .await
        .unwrap();

    assert_eq!(result.status(), JobStatus::Success);
    assert_eq!(provider.batch_call_count(), 1);
    assert_eq!(provider.single_call_count(), 5);
    assert_eq!(result.total_attempts(), 5);
    assert_eq!(cache.len(), 5);
}

#[tokio::test]
async fn test_translateJob_withDuplicateTexts_shouldTranslateOnce() {
    let provider = MockProvider::working();
    let (service, cache) = service_with(&provider, test_options(10, 1));
    let units = vec![
        TranslationUnit::new("title", "Agenda", "fr"),
        TranslationUnit::new("footer-1", "Confidential", "fr"),
        TranslationUnit::new("footer-2", "Confidential", "fr"),
        TranslationUnit::new("footer-3", "  confidential ", "fr"),
    ];

    let result = service.translate_job(units, &JobOptions::new("en")).await.unwrap();

    assert_eq!(result.status(), JobStatus::Success);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(provider.calls()[0].entries.len(), 2);
    assert_eq!(cache.len(), 2);
    let expected = MockProvider::translate_text("Confidential");
    for id in ["footer-1", "footer-2", "footer-3"] {
        assert_eq!(result.unit(id).unwrap().translated_text.as_deref(), Some(expected.as_str()));
    }
    assert_eq!(result.unit("footer-3").unwrap().attempt_count, 0);
}

#[tokio::test]
async fn test_translateJob_withMixedTargets_shouldBatchPerLanguage() {
    let provider = MockProvider::working();
    let (service, _cache) = service_with(&provider, test_options(10, 2));
    let units = vec![
        TranslationUnit::new("1", "Welcome", "fr"),
        TranslationUnit::new("2", "Welcome", "de"),
        TranslationUnit::new("3", "Goodbye", "fr"),
    ];

    let result = service.translate_job(units, &JobOptions::new("en")).await.unwrap();

    assert_eq!(result.status(), JobStatus::Success);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retryFailedOnly_shouldOnlyPayForFailedUnits() {
    let provider = MockProvider::working().with_failure_times(
        fragment_text(3),
        ProviderError::from_status(503, "overloaded", None),
        3,
    );
    let (service, _cache) = service_with(&provider, test_options(5, 1));
    let options = JobOptions::new("en");

    let first = service.translate_job(numbered_units(5), &options).await.unwrap();
    assert_eq!(first.status(), JobStatus::PartialSuccess);
    assert_eq!(first.unit("u3").unwrap().attempt_count, 3);
    let calls_before = provider.call_count();

    let retried = service.retry_failed_only(&first, &options).await.unwrap();

    assert_eq!(provider.call_count(), calls_before + 1);
    assert_eq!(provider.calls().last().unwrap().entries, vec![fragment_text(3)]);
    assert_eq!(retried.job_id(), first.job_id());
    assert_eq!(retried.status(), JobStatus::Success);
    assert_eq!(retried.total_attempts(), first.total_attempts() + 1);
    assert_eq!(retried.unit("u1"), first.unit("u1"));
    let ids: Vec<&str> = retried.units().iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2", "u3", "u4", "u5"]);
}

#[tokio::test]
async fn test_translateJob_withInvalidInput_shouldFailBeforeAnyCall() {
    let provider = MockProvider::working();
    let (service, _cache) = service_with(
        &provider,
        PipelineOptions {
            max_text_length: 20,
            ..test_options(5, 1)
        },
    );

    let duplicate = vec![TranslationUnit::new("a", "one", "fr"), TranslationUnit::new("a", "two", "fr")];
    let result = service.translate_job(duplicate, &JobOptions::new("en")).await;
    assert!(matches!(result, Err(TranslationError::Validation(_))));

    let too_long = vec![TranslationUnit::new("a", "x".repeat(21), "fr")];
    let result = service.translate_job(too_long, &JobOptions::new("en")).await;
    assert!(matches!(result, Err(TranslationError::Validation(_))));

    let bad_target = vec![TranslationUnit::new("a", "one", "elvish")];
    let result = service.translate_job(bad_target, &JobOptions::new("en")).await;
    assert!(matches!(result, Err(TranslationError::Validation(_))));

    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_translateJob_withEmptyJob_shouldSucceedWithoutCalls() {
    let provider = MockProvider::working();
    let (service, _cache) = service_with(&provider, test_options(5, 1));

    let result = service.translate_job(Vec::new(), &JobOptions::new("en")).await.unwrap();

    assert_eq!(result.status(), JobStatus::Success);
    assert!(result.units().is_empty());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_translateJob_withCustomRetryBudget_shouldStopAtBudget() {
    let provider = MockProvider::failing();
    let options = PipelineOptions {
        retry: RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            multiplier: 1.0,
            max_delay: Duration::from_millis(1),
        },
        ..test_options(5, 1)
    };
    let (service, _cache) = service_with(&provider, options);

    let result = service
        .translate_job(numbered_units(1), &JobOptions::new("en"))
        .await
        .unwrap();

    assert_eq!(result.unit("u1").unwrap().attempt_count, 2);
    assert_eq!(provider.call_count(), 2);
}
