/*!
 * Batch planning and bounded-concurrency execution.
 *
 * Units are grouped by target language and model, chunked into batches by
 * item count and text length, and run through the retry orchestrator with
 * at most `concurrency` batches in flight.
 */

use futures::stream::{self, StreamExt};
use log::debug;
use std::time::Duration;
use tokio::time::Instant;

use super::retry::{JobContext, RetryOrchestrator};
use super::unit::TranslationUnit;

/// Default units per batch
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default aggregate characters per batch
pub const DEFAULT_MAX_CHARS_PER_BATCH: usize = 6000;

/// Default number of batches in flight
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default pause for batches admitted after the first window
pub const DEFAULT_GROUP_DELAY: Duration = Duration::from_millis(500);

/// Split units into ordered batches
///
/// Each batch holds units of a single (target language, model) group, at
/// most `batch_size` of them and at most `max_chars` characters in total.
/// A text longer than `max_chars` gets a batch of its own.
pub fn plan_batches(
    units: Vec<TranslationUnit>,
    default_model: &str,
    batch_size: usize,
    max_chars: usize,
) -> Vec<Vec<TranslationUnit>> {
    let batch_size = batch_size.max(1);
    let mut groups: Vec<((String, String), Vec<TranslationUnit>)> = Vec::new();

    for unit in units {
        let key = (unit.target_language.clone(), unit.effective_model(default_model).to_string());
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(unit),
            None => groups.push((key, vec![unit])),
        }
    }

    let mut batches = Vec::new();
    for (_, members) in groups {
        let mut current: Vec<TranslationUnit> = Vec::new();
        let mut current_chars = 0;

        for unit in members {
            let chars = unit.source_text.chars().count();
            let full = current.len() >= batch_size || (!current.is_empty() && current_chars + chars > max_chars);
            if full {
                batches.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            current_chars += chars;
            current.push(unit);
        }

        if !current.is_empty() {
            batches.push(current);
        }
    }

    batches
}

/// Runs batches with a bounded concurrency window
#[derive(Debug, Clone)]
pub struct BatchManager {
    orchestrator: RetryOrchestrator,
    concurrency: usize,
    group_delay: Duration,
}

impl BatchManager {
    pub fn new(orchestrator: RetryOrchestrator, concurrency: usize, group_delay: Duration) -> Self {
        Self {
            orchestrator,
            concurrency: concurrency.max(1),
            group_delay,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn orchestrator(&self) -> &RetryOrchestrator {
        &self.orchestrator
    }

    /// Run every batch and return the resolved units in completion order
    pub async fn run(&self, batches: Vec<Vec<TranslationUnit>>, ctx: &JobContext<'_>) -> Vec<TranslationUnit> {
        let total_batches = batches.len();
        debug!(
            "Running {} batch(es) with up to {} in flight",
            total_batches, self.concurrency
        );

        stream::iter(batches.into_iter().enumerate())
            .map(|(index, batch)| async move {
                if index >= self.concurrency && !self.group_delay.is_zero() {
                    ctx.cancellation.sleep(self.group_delay).await;
                }

                ctx.progress.batch_started(index, batch.len());
                let start = Instant::now();
                let units = self.orchestrator.run_batch(batch, ctx).await;
                debug!(
                    "Batch {}/{} finished in {:?}",
                    index + 1,
                    total_batches,
                    start.elapsed()
                );
                ctx.progress.batch_finished(index, &units);
                units
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}
