/*!
 * Provider client adapter.
 *
 * Turns fragments into provider calls and provider answers back into
 * per-item results. Batches are sent as one marked request; when the answer
 * cannot be split back into aligned items, or when the batch call is
 * rejected outright and failure isolation is on, every item is sent again on
 * its own. Transient batch failures are returned to the caller, which backs
 * off before isolating the items.
 */

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use super::cancellation::CancellationHandle;
use super::prompts::{self, PromptTemplate};
use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, Provider};

/// Default per-call timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings shared by every call the client makes
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub prompt_template: PromptTemplate,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound for one provider call, independent of retries
    pub request_timeout: Duration,
    /// Re-send items individually when a batch call fails
    pub isolate_batch_failures: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            prompt_template: PromptTemplate::default(),
            temperature: 0.3,
            max_tokens: 4096,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            isolate_batch_failures: true,
        }
    }
}

/// What a request translates between, and with which model
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub source_language: &'a str,
    pub target_language: &'a str,
    pub model: &'a str,
    pub instructions: Option<&'a str>,
}

/// Client adapter over a provider
#[derive(Debug, Clone)]
pub struct TranslationClient {
    provider: Arc<dyn Provider>,
    options: ClientOptions,
}

impl TranslationClient {
    pub fn new(provider: Arc<dyn Provider>, options: ClientOptions) -> Self {
        Self { provider, options }
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Translate a single text
    pub async fn translate_one(&self, text: &str, ctx: &RequestContext<'_>) -> Result<String, ProviderError> {
        let translated = self.call(text.to_string(), ctx).await?;
        let translated = translated.trim();
        if translated.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(translated.to_string())
    }

    /// Translate several texts, returning one result per text in order
    ///
    /// Returns `Err` when the failure applies to the whole batch:
    /// authentication, a retryable batch error, or any batch error with
    /// isolation turned off.
    pub async fn translate_batch<S: AsRef<str>>(
        &self,
        texts: &[S],
        ctx: &RequestContext<'_>,
        cancellation: Option<&CancellationHandle>,
    ) -> Result<Vec<Result<String, ProviderError>>, ProviderError> {
        match texts {
            [] => return Ok(Vec::new()),
            [text] => {
                return match self.translate_one(text.as_ref(), ctx).await {
                    Err(e) if e.affects_whole_batch() => Err(e),
                    result => Ok(vec![result]),
                };
            }
            _ => {}
        }

        let content = prompts::build_batch_content(texts);
        match self.call(content, ctx).await {
            Ok(response) => match prompts::parse_batch_response(&response, texts.len()) {
                Ok(items) => Ok(items.into_iter().map(Ok).collect()),
                Err(e) => {
                    warn!(
                        "Batch of {} could not be split ({}), translating entries individually",
                        texts.len(),
                        e
                    );
                    self.translate_individually(texts, ctx, cancellation).await
                }
            },
            Err(e) if e.affects_whole_batch() || e.is_retryable() || !self.options.isolate_batch_failures => Err(e),
            Err(e) => {
                debug!("Batch of {} rejected ({}), isolating entries", texts.len(), e);
                self.translate_individually(texts, ctx, cancellation).await
            }
        }
    }

    /// Check that the provider is reachable
    pub async fn test_connection(&self) -> Result<(), ProviderError> {
        self.provider.test_connection().await
    }

    /// Send every text as its own request, stopping once cancelled
    pub async fn translate_individually<S: AsRef<str>>(
        &self,
        texts: &[S],
        ctx: &RequestContext<'_>,
        cancellation: Option<&CancellationHandle>,
    ) -> Result<Vec<Result<String, ProviderError>>, ProviderError> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            if cancellation.is_some_and(CancellationHandle::is_cancelled) {
                results.push(Err(ProviderError::Cancelled));
                continue;
            }

            match self.translate_one(text.as_ref(), ctx).await {
                Err(e @ ProviderError::AuthenticationError(_)) => return Err(e),
                result => results.push(result),
            }
        }
        Ok(results)
    }

    async fn call(&self, user_content: String, ctx: &RequestContext<'_>) -> Result<String, ProviderError> {
        let request = CompletionRequest {
            model: ctx.model.to_string(),
            system_prompt: prompts::build_system_prompt(
                &self.options.prompt_template,
                ctx.source_language,
                ctx.target_language,
                ctx.instructions,
            ),
            user_content,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        };

        let timeout = self.options.request_timeout;
        match tokio::time::timeout(timeout, self.provider.complete(request)).await {
            Ok(result) => result.map(|response| response.text),
            Err(_) => Err(ProviderError::Timeout(timeout)),
        }
    }
}
