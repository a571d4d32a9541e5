/*!
 * Mock provider implementation for testing.
 *
 * The mock understands the batch marker format, so it answers a marked
 * request with a marked response and a plain request with plain text.
 * On top of that it can simulate:
 * - malformed batch answers (markers dropped)
 * - scripted failures for specific texts, optionally a limited number of times
 * - fixed or random latency
 * - empty answers
 *
 * Every call is logged with its (tokio) timestamp so tests can assert on
 * call counts, batch sizes, backoff gaps and peak concurrency.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, CompletionResponse, Provider};
use crate::translation::prompts::{END_MARKER, split_marked};

/// Prefix the mock puts in front of every "translated" text
pub const TRANSLATED_PREFIX: &str = "[TRANSLATED] ";

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Multi-entry requests get an answer without markers; single requests work
    MalformedBatch,
    /// Every entry comes back empty
    Empty,
    /// Fixed delay before answering
    Slow { delay_ms: u64 },
    /// Uniformly random delay before answering
    RandomLatency { min_ms: u64, max_ms: u64 },
}

/// One recorded provider call
#[derive(Debug, Clone)]
pub struct MockCall {
    /// When the call started
    pub at: Instant,
    /// Entry texts carried by the call (one for a plain request)
    pub entries: Vec<String>,
    /// Whether the request used batch markers
    pub is_batch: bool,
}

#[derive(Debug)]
struct FailureRule {
    /// Entry text that triggers the failure; `None` matches every call
    text: Option<String>,
    error: ProviderError,
    /// Remaining failures, `None` for unlimited
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Mutex<Vec<MockCall>>,
    rules: Mutex<Vec<FailureRule>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

type CallHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Mock provider for testing translation behavior
#[derive(Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    state: Arc<MockState>,
    on_call: Option<CallHook>,
}

struct InFlightGuard<'a>(&'a MockState);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            state: Arc::new(MockState::default()),
            on_call: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that drops markers from batch answers
    pub fn malformed_batches() -> Self {
        Self::new(MockBehavior::MalformedBatch)
    }

    /// Create a mock that returns empty answers
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that answers after `delay`
    pub fn slow(delay: Duration) -> Self {
        Self::new(MockBehavior::Slow {
            delay_ms: delay.as_millis() as u64,
        })
    }

    /// Create a mock with random latency in `[min_ms, max_ms]`
    pub fn random_latency(min_ms: u64, max_ms: u64) -> Self {
        Self::new(MockBehavior::RandomLatency { min_ms, max_ms })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::failing_with(ProviderError::ApiError {
            status_code: 500,
            message: "Simulated provider failure".to_string(),
        })
    }

    /// Create a mock whose every call fails with `error`
    pub fn failing_with(error: ProviderError) -> Self {
        let provider = Self::working();
        provider.state.rules.lock().push(FailureRule {
            text: None,
            error,
            remaining: None,
        });
        provider
    }

    /// Fail every call that carries `text` as one of its entries
    pub fn with_failure(self, text: impl Into<String>, error: ProviderError) -> Self {
        self.push_rule(text.into(), error, None)
    }

    /// Fail the first `times` calls that carry `text`
    pub fn with_failure_times(self, text: impl Into<String>, error: ProviderError, times: usize) -> Self {
        self.push_rule(text.into(), error, Some(times))
    }

    /// Run `hook` with the 1-based call number at the start of every call
    pub fn with_call_hook(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Arc::new(hook));
        self
    }

    fn push_rule(self, text: String, error: ProviderError, remaining: Option<usize>) -> Self {
        self.state.rules.lock().push(FailureRule {
            text: Some(text.trim().to_string()),
            error,
            remaining,
        });
        self
    }

    /// Generate a properly formatted batch response with markers
    pub fn generate_batch_response<S: AsRef<str>>(entries: &[S]) -> String {
        let mut response = String::new();
        for (i, entry) in entries.iter().enumerate() {
            response.push_str(&format!("<<ENTRY_{}>>\n", i));
            response.push_str(entry.as_ref());
            response.push('\n');
        }
        response.push_str(END_MARKER);
        response
    }

    /// The text the mock returns for `source`
    pub fn translate_text(source: &str) -> String {
        format!("{}{}", TRANSLATED_PREFIX, source.trim())
    }

    /// Total number of calls received
    pub fn call_count(&self) -> usize {
        self.state.calls.lock().len()
    }

    /// Number of calls that used batch markers
    pub fn batch_call_count(&self) -> usize {
        self.state.calls.lock().iter().filter(|c| c.is_batch).count()
    }

    /// Number of plain single-text calls
    pub fn single_call_count(&self) -> usize {
        self.state.calls.lock().iter().filter(|c| !c.is_batch).count()
    }

    /// Snapshot of the call log
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.calls.lock().clone()
    }

    /// Calls that carried `text` as one of their entries
    pub fn calls_with(&self, text: &str) -> Vec<MockCall> {
        let text = text.trim();
        self.state
            .calls
            .lock()
            .iter()
            .filter(|c| c.entries.iter().any(|e| e == text))
            .cloned()
            .collect()
    }

    /// Highest number of calls that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    fn record_call(&self, request: &CompletionRequest) -> (usize, Vec<String>, bool) {
        let (entries, is_batch) = match request
            .user_content
            .contains(END_MARKER)
            .then(|| split_marked(&request.user_content))
            .flatten()
        {
            Some(segments) => (segments.into_iter().map(|(_, s)| s.to_string()).collect(), true),
            None => (vec![request.user_content.trim().to_string()], false),
        };

        let mut calls = self.state.calls.lock();
        calls.push(MockCall {
            at: Instant::now(),
            entries: entries.clone(),
            is_batch,
        });
        (calls.len(), entries, is_batch)
    }

    fn scripted_failure(&self, entries: &[String]) -> Option<ProviderError> {
        let mut rules = self.state.rules.lock();
        let rule = rules.iter_mut().find(|rule| {
            let matches = match &rule.text {
                Some(text) => entries.iter().any(|e| e == text),
                None => true,
            };
            matches && rule.remaining != Some(0)
        })?;

        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(rule.error.clone())
    }

    fn latency(&self) -> Option<Duration> {
        match self.behavior {
            MockBehavior::Slow { delay_ms } => Some(Duration::from_millis(delay_ms)),
            MockBehavior::RandomLatency { min_ms, max_ms } => {
                let delay = rand::rng().random_range(min_ms..=max_ms.max(min_ms));
                Some(Duration::from_millis(delay))
            }
            _ => None,
        }
    }

    fn respond(&self, entries: &[String], is_batch: bool) -> String {
        let translate = |text: &String| match self.behavior {
            MockBehavior::Empty => String::new(),
            _ => Self::translate_text(text),
        };

        if !is_batch {
            return entries.first().map(translate).unwrap_or_default();
        }

        if self.behavior == MockBehavior::MalformedBatch && entries.len() > 1 {
            return entries.iter().map(translate).collect::<Vec<_>>().join("\n");
        }

        let translated: Vec<String> = entries.iter().map(translate).collect();
        Self::generate_batch_response(&translated)
    }
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("behavior", &self.behavior)
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let (call_number, entries, is_batch) = self.record_call(&request);

        let in_flight = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.state);

        if let Some(hook) = &self.on_call {
            hook(call_number);
        }

        if let Some(delay) = self.latency() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.scripted_failure(&entries) {
            return Err(error);
        }

        let text = self.respond(&entries, is_batch);
        Ok(CompletionResponse {
            prompt_tokens: Some((request.user_content.len() / 4) as u64),
            completion_tokens: Some((text.len() / 4) as u64),
            text,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let rules = self.state.rules.lock();
        match rules.iter().find(|rule| rule.text.is_none()) {
            Some(rule) => Err(rule.error.clone()),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
