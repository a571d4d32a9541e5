/*!
 * Error types for the doctrans pipeline.
 *
 * This module contains custom error types for the different layers of the
 * pipeline, using the thiserror crate for ergonomic error definitions.
 *
 * Provider errors are classified here once (`is_retryable`, `code`) so the
 * retry orchestrator never has to inspect vendor-specific details.
 */

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// Error message from the API
        message: String,
        /// Value of the retry-after header, if the provider sent one
        retry_after_secs: Option<u64>,
    },

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The provider rejected the request itself (bad parameters, too large)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The call did not resolve within the per-call timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered with an empty translation
    #[error("Provider returned an empty translation")]
    EmptyResponse,

    /// The job was cancelled before this call was dispatched
    #[error("cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Map an HTTP status code and response body to an error.
    pub fn from_status(status_code: u16, message: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        let message = message.into();
        match status_code {
            429 => Self::RateLimitExceeded { message, retry_after_secs },
            401 | 403 => Self::AuthenticationError(message),
            400 | 404 | 413 | 422 => Self::InvalidRequest(message),
            _ => Self::ApiError { status_code, message },
        }
    }

    /// Whether the failure is transient and the call may be attempted again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_)
            | Self::ParseError(_)
            | Self::ConnectionError(_)
            | Self::RateLimitExceeded { .. }
            | Self::Timeout(_) => true,
            Self::ApiError { status_code, .. } => *status_code == 408 || *status_code >= 500,
            Self::AuthenticationError(_)
            | Self::InvalidRequest(_)
            | Self::EmptyResponse
            | Self::Cancelled => false,
        }
    }

    /// Stable machine-readable code recorded on failed units
    pub fn code(&self) -> &'static str {
        match self {
            Self::RequestFailed(_) => "request_failed",
            Self::ParseError(_) => "parse_error",
            Self::ApiError { status_code, .. } if *status_code >= 500 => "server_error",
            Self::ApiError { .. } => "api_error",
            Self::ConnectionError(_) => "connection_error",
            Self::RateLimitExceeded { .. } => "rate_limited",
            Self::AuthenticationError(_) => "auth",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Timeout(_) => "timeout",
            Self::EmptyResponse => "empty_response",
            Self::Cancelled => "cancelled",
        }
    }

    /// Minimum wait requested by the provider before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after_secs: Some(secs), .. } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// Authentication problems apply to every item of a request alike
    pub fn affects_whole_batch(&self) -> bool {
        matches!(self, Self::AuthenticationError(_) | Self::Cancelled)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(Duration::ZERO)
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else if let Some(status) = error.status() {
            Self::from_status(status.as_u16(), error.to_string(), None)
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors that abort a whole translation job
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The job was rejected before any provider call
    #[error("Validation error: {0}")]
    Validation(String),

    /// The pipeline is misconfigured (missing credentials, bad endpoint)
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::File(format!("invalid JSON: {}", error))
    }
}
