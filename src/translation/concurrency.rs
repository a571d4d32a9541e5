/*!
 * Provider-specific throughput defaults.
 *
 * Hosted APIs rate-limit per account while a local Ollama server is bound
 * by its GPU, so each provider gets its own concurrency window, batch shape
 * and pacing unless the configuration overrides them.
 */

use std::time::Duration;

use crate::app_config::TranslationProvider;

/// Provider-specific profile with tuned defaults
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    /// Batches in flight at once
    pub concurrent_requests: usize,
    /// Units per batch
    pub batch_size: usize,
    /// Aggregate source characters per batch
    pub max_chars_per_batch: usize,
    /// Per-call timeout
    pub request_timeout: Duration,
    /// Pause before each batch admitted after the first window
    pub group_delay: Duration,
}

impl ProviderProfile {
    /// Get the profile for a given provider
    pub fn for_provider(provider: TranslationProvider) -> Self {
        match provider {
            TranslationProvider::Ollama => Self {
                // A single local model serializes requests anyway
                concurrent_requests: 2,
                batch_size: 5,
                max_chars_per_batch: 2000,
                request_timeout: Duration::from_secs(120),
                group_delay: Duration::ZERO,
            },
            TranslationProvider::OpenAI => Self {
                concurrent_requests: 3,
                batch_size: 10,
                max_chars_per_batch: 6000,
                request_timeout: Duration::from_secs(60),
                group_delay: Duration::from_millis(500),
            },
            TranslationProvider::Anthropic => Self {
                concurrent_requests: 3,
                batch_size: 10,
                max_chars_per_batch: 8000,
                request_timeout: Duration::from_secs(60),
                group_delay: Duration::from_millis(500),
            },
        }
    }

    /// Concurrency window, respecting a positive user override
    pub fn effective_concurrent_requests(&self, user_override: Option<usize>) -> usize {
        user_override.filter(|n| *n > 0).unwrap_or(self.concurrent_requests)
    }
}
