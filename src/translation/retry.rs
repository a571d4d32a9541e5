/*!
 * Retry orchestration for one batch of units.
 *
 * Each round sends every still-pending unit of the batch in one request,
 * classifies the per-unit answers and either settles the unit or queues it
 * for another round after an exponential backoff. Units that still need
 * retrying travel together as a smaller batch. When the batch call itself
 * fails transiently, every unit is charged the attempt and, once the backoff
 * has elapsed, the leftovers are sent one request each so a poisoned item
 * cannot keep failing its siblings.
 */

use log::{debug, error, warn};
use std::sync::Arc;
use std::time::Duration;

use super::cache::TranslationCache;
use super::cancellation::CancellationHandle;
use super::client::{RequestContext, TranslationClient};
use super::progress::ProgressReporter;
use super::quality;
use super::unit::{TranslationUnit, UnitError, UnitOutcome};
use crate::errors::ProviderError;

/// Backoff and budget settings
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts per unit, the first one included
    pub max_retries: u32,
    /// Wait after the first failed attempt
    pub base_delay: Duration,
    pub multiplier: f64,
    /// Upper bound for a single wait
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failed attempt number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Wait after failed attempt `attempt`, honoring a provider hint up to `max_delay`
    pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        match retry_after {
            Some(hint) if hint > self.max_delay => {
                warn!("Provider asked to wait {:?}, capping at {:?}", hint, self.max_delay);
                delay.max(self.max_delay)
            }
            Some(hint) => delay.max(hint),
            None => delay,
        }
    }
}

/// Job-wide inputs shared by every batch
#[derive(Debug, Clone, Copy)]
pub struct JobContext<'a> {
    pub source_language: &'a str,
    /// Model for units without a `model_variant`
    pub default_model: &'a str,
    pub instructions: Option<&'a str>,
    pub cancellation: &'a CancellationHandle,
    pub progress: &'a ProgressReporter,
}

/// Drives units through the client until each is completed or failed
#[derive(Debug, Clone)]
pub struct RetryOrchestrator {
    client: TranslationClient,
    cache: Arc<TranslationCache>,
    policy: RetryPolicy,
}

impl RetryOrchestrator {
    pub fn new(client: TranslationClient, cache: Arc<TranslationCache>, policy: RetryPolicy) -> Self {
        Self { client, cache, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn client(&self) -> &TranslationClient {
        &self.client
    }

    /// Resolve every unit of a batch sharing one target language and model
    pub async fn run_batch(&self, mut units: Vec<TranslationUnit>, ctx: &JobContext<'_>) -> Vec<TranslationUnit> {
        let Some(first) = units.first() else {
            return units;
        };
        let target_language = first.target_language.clone();
        let model = first.effective_model(ctx.default_model).to_string();
        let request = RequestContext {
            source_language: ctx.source_language,
            target_language: &target_language,
            model: &model,
            instructions: ctx.instructions,
        };

        let mut isolate = false;

        loop {
            let pending: Vec<usize> = (0..units.len()).filter(|&i| units[i].is_pending()).collect();
            if pending.is_empty() {
                break;
            }

            if ctx.cancellation.is_cancelled() {
                for &i in &pending {
                    units[i].fail(UnitError::cancelled());
                    ctx.progress.unit_resolved(&units[i]);
                }
                break;
            }

            let texts: Vec<String> = pending
                .iter()
                .map(|&i| {
                    units[i].begin_attempt();
                    units[i].source_text.clone()
                })
                .collect();

            let outcome = if isolate {
                self.client
                    .translate_individually(&texts, &request, Some(ctx.cancellation))
                    .await
            } else {
                self.client.translate_batch(&texts, &request, Some(ctx.cancellation)).await
            };
            let results = match outcome {
                Ok(results) => results,
                Err(e) => {
                    if e.is_retryable() && texts.len() > 1 && self.client.options().isolate_batch_failures {
                        debug!("Batch of {} failed ({}), isolating entries after backoff", texts.len(), e);
                        isolate = true;
                    }
                    vec![Err(e); texts.len()]
                }
            };

            let translated: Vec<(String, String)> = texts
                .iter()
                .zip(&results)
                .filter_map(|(source, result)| result.as_ref().ok().map(|t| (source.clone(), t.clone())))
                .collect();
            self.cache.set_batch(&translated, &target_language, &model);

            // Answers that arrive after a cancel are cached but not reported
            let cancelled = ctx.cancellation.is_cancelled();
            let mut backoff: Option<Duration> = None;

            for (&i, result) in pending.iter().zip(results) {
                let unit = &mut units[i];
                if cancelled {
                    unit.fail(UnitError::cancelled());
                    ctx.progress.unit_resolved(unit);
                    continue;
                }

                let retry_after = result.as_ref().err().and_then(ProviderError::retry_after);
                match UnitOutcome::from_provider_result(result) {
                    UnitOutcome::Completed(text) => {
                        if let Some(warning) = quality::assess(&unit.source_text, &text) {
                            warn!("Unit {}: {}", unit.id, warning);
                        }
                        unit.complete(text);
                        ctx.progress.unit_resolved(unit);
                    }
                    UnitOutcome::Failed { error, retryable: true } if unit.attempt_count < self.policy.max_retries => {
                        let delay = self.policy.backoff(unit.attempt_count, retry_after);
                        warn!(
                            "Unit {} attempt {}/{} failed: {}; retrying in {:?}",
                            unit.id, unit.attempt_count, self.policy.max_retries, error, delay
                        );
                        backoff = backoff.max(Some(delay));
                        unit.requeue(error);
                    }
                    UnitOutcome::Failed { error, .. } => {
                        error!("Unit {} failed after {} attempt(s): {}", unit.id, unit.attempt_count, error);
                        unit.fail(error);
                        ctx.progress.unit_resolved(unit);
                    }
                }
            }

            if let Some(delay) = backoff {
                if !ctx.cancellation.sleep(delay).await {
                    debug!("Backoff interrupted by cancellation");
                }
            }
        }

        units
    }
}
