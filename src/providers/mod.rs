/*!
 * Provider implementations for different translation services.
 *
 * This module contains client implementations for various LLM providers:
 * - Ollama: Local LLM server
 * - OpenAI: OpenAI-compatible chat completions
 * - Anthropic: Anthropic Messages API
 * - Mock: in-process provider for tests and benchmarks
 *
 * Every provider speaks the same request/response pair so the translation
 * client can hold any of them behind `Arc<dyn Provider>`.
 */

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Provider-neutral completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier understood by the provider
    pub model: String,
    /// Instructions sent as the system message
    pub system_prompt: String,
    /// Text to complete (a single fragment or a marked batch)
    pub user_content: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Provider-neutral completion response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably in the translation service.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Short provider name used in logs
    fn name(&self) -> &str;
}

/// Seconds from a `retry-after` header, if present and numeric
pub(crate) fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

/// Turn a non-success HTTP response into a `ProviderError`
pub(crate) async fn error_from_response(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let retry_after = retry_after_secs(response.headers());
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());

    log::debug!("{} API error ({}): {}", provider, status, body);
    ProviderError::from_status(status, body, retry_after)
}

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;
