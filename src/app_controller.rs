use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app_config::Config;
use crate::file_utils::FileManager;
use crate::translation::{
    CancellationHandle, JobOptions, JobResult, JobStatus, ProgressEvent, TranslationCache, TranslationService,
    TranslationUnit,
};

// @module: Application controller for document translation jobs

enum Job {
    Translate(Vec<TranslationUnit>),
    Retry(JobResult),
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Cache shared by every job of this controller
    cache: Arc<TranslationCache>,

    // @field: Translation pipeline
    service: TranslationService,

    // @field: Background expiry sweep
    cleanup_task: Option<JoinHandle<()>>,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let cache = Arc::new(Self::build_cache(&config));
        Self::with_cache(config, cache)
    }

    /// Create a controller around an existing cache
    pub fn with_cache(config: Config, cache: Arc<TranslationCache>) -> Result<Self> {
        config.validate()?;

        let service = TranslationService::from_config(&config, Arc::clone(&cache))
            .context("Failed to create translation service")?;

        let cleanup_task = match config.cache.cleanup_interval_secs {
            0 => None,
            _ if !cache.is_enabled() => None,
            secs => Some(TranslationCache::spawn_cleanup_task(&cache, Duration::from_secs(secs))),
        };

        Ok(Self {
            config,
            cache,
            service,
            cleanup_task,
        })
    }

    fn build_cache(config: &Config) -> TranslationCache {
        if config.cache.enabled {
            TranslationCache::new(config.cache.capacity, Duration::from_secs(config.cache.ttl_secs))
        } else {
            TranslationCache::disabled()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    /// Translate the fragments of `input_file` and write the job result
    pub async fn run(&self, input_file: PathBuf, output_file: Option<PathBuf>, force_overwrite: bool) -> Result<()> {
        if !FileManager::file_exists(&input_file) {
            return Err(anyhow::anyhow!("Input file does not exist: {:?}", input_file));
        }

        let output_path = output_file
            .unwrap_or_else(|| FileManager::generate_output_path(&input_file, &self.config.target_language));
        if output_path.exists() && !force_overwrite {
            warn!("Skipping file, translation already exists (use -f to force overwrite)");
            return Ok(());
        }

        let fragments = FileManager::read_fragments(&input_file)?;
        let units: Vec<TranslationUnit> = fragments
            .into_iter()
            .map(|fragment| TranslationUnit::from_fragment(fragment, &self.config.target_language))
            .collect();

        info!(
            "Translating {} fragment(s) from {} to {} with {}",
            units.len(),
            self.config.source_language,
            self.config.target_language,
            self.config.translation.provider
        );

        let result = self.execute(Job::Translate(units)).await?;

        self.finish(&result, &output_path)
    }

    /// Re-run the failed units of a previously written job result
    pub async fn retry(&self, result_file: PathBuf, output_file: Option<PathBuf>) -> Result<()> {
        let prior = FileManager::read_job_result(&result_file)?;
        let failed = prior.failed_units().len();
        if failed == 0 {
            info!("Job {} has no failed units, nothing to retry", prior.job_id());
            return Ok(());
        }

        let output_path = output_file.unwrap_or(result_file);
        let result = self.execute(Job::Retry(prior)).await?;

        self.finish(&result, &output_path)
    }

    // Runs a job with a progress bar and Ctrl-C cancellation wired in
    async fn execute(&self, job: Job) -> Result<JobResult> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancellation = CancellationHandle::new();

        let mut options = JobOptions::new(&self.config.source_language)
            .with_model(self.config.translation.get_model())
            .with_cancellation(cancellation.clone())
            .with_progress(sender);
        if let Some(instructions) = &self.config.translation.common.instructions {
            options = options.with_instructions(instructions);
        }

        let total = match &job {
            Job::Translate(units) => units.len(),
            Job::Retry(prior) => prior.failed_units().len(),
        };
        let progress_task = tokio::spawn(Self::render_progress(receiver, total as u64));
        let signal_task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling translation job");
                cancellation.cancel();
            }
        });

        let result = match job {
            Job::Translate(units) => self.service.translate_job(units, &options).await,
            Job::Retry(prior) => self.service.retry_failed_only(&prior, &options).await,
        };
        signal_task.abort();

        // Dropping the options closes the progress channel
        drop(options);
        if let Err(e) = progress_task.await {
            debug!("Progress task ended abnormally: {}", e);
        }

        Ok(result?)
    }

    async fn render_progress(mut receiver: mpsc::UnboundedReceiver<ProgressEvent>, total: u64) {
        let progress_bar = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} fragments ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));

        while let Some(event) = receiver.recv().await {
            match event {
                ProgressEvent::JobStarted { progress, .. } => {
                    progress_bar.set_length(progress.total as u64);
                    progress_bar.set_position(progress.completed as u64);
                }
                ProgressEvent::BatchStarted { index, size } => {
                    progress_bar.set_message(format!("batch {} ({} items)", index + 1, size));
                }
                ProgressEvent::UnitCompleted { progress, .. } => {
                    progress_bar.set_position(progress.completed as u64);
                }
                ProgressEvent::UnitFailed { unit_id, error, progress } => {
                    progress_bar.set_position(progress.completed as u64);
                    progress_bar.println(format!("Fragment {} failed: {}", unit_id, error));
                }
                ProgressEvent::BatchFinished { .. } => {}
                ProgressEvent::JobFinished { status, .. } => {
                    progress_bar.finish_with_message(status.to_string());
                }
            }
        }

        if !progress_bar.is_finished() {
            progress_bar.abandon();
        }
    }

    fn finish(&self, result: &JobResult, output_path: &Path) -> Result<()> {
        FileManager::write_job_result(output_path, result)?;

        let completed = result.completed_units().len();
        let failed = result.failed_units();
        match result.status() {
            JobStatus::Success => info!(
                "Translated {} fragment(s) in {} ({} from cache)",
                completed,
                Self::format_duration(result.duration()),
                result.cache_hits()
            ),
            JobStatus::PartialSuccess => warn!(
                "Translated {} fragment(s), {} failed (run `retry` on {:?} to re-run them)",
                completed,
                failed.len(),
                output_path
            ),
            JobStatus::Failure => error!("All {} fragment(s) failed", failed.len()),
        }

        let stats = self.cache.stats();
        debug!(
            "Cache: {} entries, {} hits, {} misses, hit rate {:.1}%",
            stats.entries,
            stats.hits,
            stats.misses,
            stats.hit_rate() * 100.0
        );
        info!("Result written to {:?}", output_path);

        if result.status() == JobStatus::Failure {
            return Err(anyhow::anyhow!("Translation job {} failed", result.job_id()));
        }
        Ok(())
    }

    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup_task.take() {
            task.abort();
        }
    }
}
