/*!
 * Core translation service implementation.
 *
 * `TranslationService` validates a job, answers what it can from the cache,
 * sends the rest through the batch manager and merges everything back into
 * input order. It also re-runs only the failed units of a previous result.
 */

use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use uuid::Uuid;

use super::batch::{self, BatchManager, plan_batches};
use super::cache::{CacheKey, TranslationCache};
use super::cancellation::CancellationHandle;
use super::client::{ClientOptions, TranslationClient};
use super::progress::{ProgressEvent, ProgressReporter};
use super::prompts::PromptTemplate;
use super::retry::{JobContext, RetryOrchestrator, RetryPolicy};
use super::unit::{JobResult, TranslationUnit, UnitStatus};
use crate::app_config::{Config, TranslationProvider};
use crate::errors::TranslationError;
use crate::language_utils;
use crate::providers::Provider;
use crate::providers::anthropic::Anthropic;
use crate::providers::ollama::Ollama;
use crate::providers::openai::OpenAI;

/// Default longest accepted source text, in characters
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 10_000;

/// Settings of a `TranslationService`
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Model for units and jobs that do not name one
    pub default_model: String,
    pub batch_size: usize,
    pub max_chars_per_batch: usize,
    pub concurrency: usize,
    pub group_delay: Duration,
    pub max_text_length: usize,
    pub retry: RetryPolicy,
    pub client: ClientOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            default_model: String::new(),
            batch_size: batch::DEFAULT_BATCH_SIZE,
            max_chars_per_batch: batch::DEFAULT_MAX_CHARS_PER_BATCH,
            concurrency: batch::DEFAULT_CONCURRENCY,
            group_delay: batch::DEFAULT_GROUP_DELAY,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            retry: RetryPolicy::default(),
            client: ClientOptions::default(),
        }
    }
}

impl PipelineOptions {
    /// Options derived from the application configuration
    pub fn from_config(config: &Config) -> Self {
        let translation = &config.translation;
        Self {
            default_model: translation.get_model(),
            batch_size: config.batch_size(),
            max_chars_per_batch: translation.get_max_chars_per_request(),
            concurrency: translation.optimal_concurrent_requests(),
            group_delay: translation.get_group_delay(),
            max_text_length: config.pipeline.max_text_length,
            retry: config.retry_policy(),
            client: ClientOptions {
                prompt_template: PromptTemplate::new(&translation.common.system_prompt),
                temperature: translation.common.temperature,
                max_tokens: translation.common.max_tokens,
                request_timeout: translation.get_timeout(),
                isolate_batch_failures: config.pipeline.isolate_batch_failures,
            },
        }
    }
}

/// Per-job inputs
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Source language code, or `auto`
    pub source_language: String,
    /// Overrides the service default model
    pub model: Option<String>,
    /// Extra instructions appended to the system prompt
    pub instructions: Option<String>,
    pub cancellation: CancellationHandle,
    pub progress: Option<UnboundedSender<ProgressEvent>>,
}

impl JobOptions {
    pub fn new(source_language: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            model: None,
            instructions: None,
            cancellation: CancellationHandle::new(),
            progress: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationHandle) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }
}

/// Main translation service
#[derive(Debug, Clone)]
pub struct TranslationService {
    cache: Arc<TranslationCache>,
    manager: BatchManager,
    options: PipelineOptions,
}

impl TranslationService {
    /// Create a service over an explicit provider
    pub fn new(provider: Arc<dyn Provider>, cache: Arc<TranslationCache>, options: PipelineOptions) -> Self {
        let client = TranslationClient::new(provider, options.client.clone());
        let orchestrator = RetryOrchestrator::new(client, Arc::clone(&cache), options.retry.clone());
        let manager = BatchManager::new(orchestrator, options.concurrency, options.group_delay);

        Self { cache, manager, options }
    }

    /// Create a service for the provider selected in the configuration
    pub fn from_config(config: &Config, cache: Arc<TranslationCache>) -> Result<Self, TranslationError> {
        let provider = build_provider(config)?;
        Ok(Self::new(provider, cache, PipelineOptions::from_config(config)))
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Check that the provider is reachable
    pub async fn test_connection(&self) -> Result<(), TranslationError> {
        Ok(self.manager.orchestrator().client().test_connection().await?)
    }

    /// Translate a job's units
    ///
    /// Only validation problems return `Err`; provider failures are recorded
    /// on the affected units.
    pub async fn translate_job(
        &self,
        units: Vec<TranslationUnit>,
        options: &JobOptions,
    ) -> Result<JobResult, TranslationError> {
        self.run_job(Uuid::new_v4(), units, options).await
    }

    /// Re-run the failed units of `prior`, keeping its completed units
    pub async fn retry_failed_only(
        &self,
        prior: &JobResult,
        options: &JobOptions,
    ) -> Result<JobResult, TranslationError> {
        let failed: Vec<TranslationUnit> = prior
            .failed_units()
            .into_iter()
            .map(|unit| {
                let mut unit = unit.clone();
                unit.reset();
                unit
            })
            .collect();

        info!("Retrying {} failed unit(s) of job {}", failed.len(), prior.job_id());
        let retried = self.run_job(prior.job_id(), failed, options).await?;

        let total_attempts = prior.total_attempts() + retried.total_attempts();
        let cache_hits = prior.cache_hits() + retried.cache_hits();
        let duration = prior.duration() + retried.duration();

        let mut replacements: HashMap<String, TranslationUnit> =
            retried.into_units().into_iter().map(|u| (u.id.clone(), u)).collect();
        let units = prior
            .units()
            .iter()
            .map(|unit| replacements.remove(&unit.id).unwrap_or_else(|| unit.clone()))
            .collect();

        Ok(JobResult::new(prior.job_id(), units, total_attempts, cache_hits, duration))
    }

    async fn run_job(
        &self,
        job_id: Uuid,
        mut units: Vec<TranslationUnit>,
        options: &JobOptions,
    ) -> Result<JobResult, TranslationError> {
        self.validate(&units, options)?;

        let start = Instant::now();
        let default_model = options.model.as_deref().unwrap_or(&self.options.default_model);
        info!("Job {}: translating {} unit(s)", job_id, units.len());

        // Blank fragments keep their text and never reach the provider
        let mut upfront: Vec<String> = Vec::new();
        let mut candidates = Vec::new();
        for (index, unit) in units.iter_mut().enumerate() {
            if unit.source_text.trim().is_empty() {
                unit.complete(unit.source_text.clone());
                upfront.push(unit.id.clone());
            } else {
                candidates.push(index);
            }
        }

        let candidate_units: Vec<TranslationUnit> = candidates.iter().map(|&i| units[i].clone()).collect();
        let (hits, misses) = self.cache.get_batch(&candidate_units, default_model);
        let cache_hits = hits.len();
        for (position, translated) in hits {
            let unit = &mut units[candidates[position]];
            unit.complete(translated);
            upfront.push(unit.id.clone());
        }

        // Identical texts within the job are translated once
        let mut representatives: HashMap<CacheKey, usize> = HashMap::new();
        let mut followers: Vec<(usize, usize)> = Vec::new();
        let mut to_translate = Vec::new();
        for position in misses {
            let index = candidates[position];
            let unit = &units[index];
            let key = CacheKey::new(&unit.source_text, &unit.target_language, unit.effective_model(default_model));
            match representatives.get(&key) {
                Some(&representative) => followers.push((index, representative)),
                None => {
                    representatives.insert(key, index);
                    to_translate.push(unit.clone());
                }
            }
        }

        let mut follower_ids: HashMap<String, Vec<String>> = HashMap::new();
        for &(follower, representative) in &followers {
            follower_ids
                .entry(units[representative].id.clone())
                .or_default()
                .push(units[follower].id.clone());
        }

        debug!(
            "Job {}: {} cache hit(s), {} duplicate(s), {} unit(s) to translate",
            job_id,
            cache_hits,
            followers.len(),
            to_translate.len()
        );

        let reporter = ProgressReporter::new(options.progress.clone(), units.len()).with_followers(follower_ids);
        reporter.job_started(job_id);
        reporter.resolved_upfront(&upfront);

        let ctx = JobContext {
            source_language: &options.source_language,
            default_model,
            instructions: options.instructions.as_deref(),
            cancellation: &options.cancellation,
            progress: &reporter,
        };

        let batches = plan_batches(
            to_translate,
            default_model,
            self.options.batch_size,
            self.options.max_chars_per_batch,
        );
        let translated = self.manager.run(batches, &ctx).await;

        let positions: HashMap<String, usize> = units.iter().enumerate().map(|(i, u)| (u.id.clone(), i)).collect();
        for unit in translated {
            if let Some(&index) = positions.get(&unit.id) {
                units[index] = unit;
            }
        }

        for (follower, representative) in followers {
            let source = units[representative].clone();
            let unit = &mut units[follower];
            match (source.status, source.translated_text, source.last_error) {
                (UnitStatus::Completed, Some(text), _) => unit.complete(text),
                (_, _, Some(error)) => unit.fail(error),
                (status, _, _) => debug!("Duplicate {} left {:?}", unit.id, status),
            }
        }

        let total_attempts: u32 = units.iter().map(|u| u.attempt_count).sum();
        let result = JobResult::new(job_id, units, total_attempts, cache_hits, start.elapsed());

        info!(
            "Job {} finished with {}: {} completed, {} failed, {} attempt(s), {} cache hit(s) in {:?}",
            job_id,
            result.status(),
            result.completed_units().len(),
            result.failed_units().len(),
            result.total_attempts(),
            result.cache_hits(),
            result.duration()
        );
        reporter.job_finished(job_id, result.status());

        Ok(result)
    }

    /// Reject a job before any provider call
    pub fn validate(&self, units: &[TranslationUnit], options: &JobOptions) -> Result<(), TranslationError> {
        if !language_utils::is_auto_detect(&options.source_language) {
            language_utils::validate_language_tag(&options.source_language).map_err(|e| {
                TranslationError::Validation(format!("source language '{}': {}", options.source_language, e))
            })?;
        }

        let mut seen = HashMap::with_capacity(units.len());
        for (index, unit) in units.iter().enumerate() {
            if unit.id.trim().is_empty() {
                return Err(TranslationError::Validation(format!("unit at position {} has an empty id", index)));
            }
            if let Some(previous) = seen.insert(unit.id.as_str(), index) {
                return Err(TranslationError::Validation(format!(
                    "duplicate unit id '{}' at positions {} and {}",
                    unit.id, previous, index
                )));
            }
            if !unit.is_pending() {
                return Err(TranslationError::Validation(format!(
                    "unit '{}' is {:?}, expected Pending",
                    unit.id, unit.status
                )));
            }
            language_utils::validate_language_tag(&unit.target_language).map_err(|e| {
                TranslationError::Validation(format!("unit '{}' target language: {}", unit.id, e))
            })?;

            let length = unit.source_text.chars().count();
            if length > self.options.max_text_length {
                return Err(TranslationError::Validation(format!(
                    "unit '{}' has {} characters, the limit is {}",
                    unit.id, length, self.options.max_text_length
                )));
            }
        }

        Ok(())
    }
}

/// Build the configured provider, failing on missing credentials
fn build_provider(config: &Config) -> Result<Arc<dyn Provider>, TranslationError> {
    let translation = &config.translation;
    let model = translation.get_model();
    let endpoint = translation.get_endpoint();

    let api_key = translation.get_api_key();
    if translation.provider.requires_api_key() && api_key.is_empty() {
        return Err(TranslationError::Configuration(format!(
            "no API key configured for {}",
            translation.provider.display_name()
        )));
    }

    let provider: Arc<dyn Provider> = match translation.provider {
        TranslationProvider::Ollama => Arc::new(
            Ollama::new(&endpoint)
                .map_err(|e| TranslationError::Configuration(format!("invalid Ollama endpoint: {}", e)))?,
        ),
        TranslationProvider::OpenAI => Arc::new(OpenAI::new(api_key, endpoint, model)),
        TranslationProvider::Anthropic => Arc::new(Anthropic::new(api_key, endpoint, model)),
    };

    debug!("Using {} provider", provider.name());
    Ok(provider)
}
