/*!
 * # doctrans - resilient batch translation for document fragments
 *
 * A Rust library that translates the text fragments extracted from a
 * document (slides, pages, cells) through rate-limited LLM providers.
 *
 * ## Features
 *
 * - Translate through various AI providers:
 *   - Ollama (local LLM)
 *   - OpenAI-compatible APIs
 *   - Anthropic API
 * - Batch requests with per-item markers and single-item fallback
 * - Bounded concurrency with inter-group pacing
 * - Per-unit retry with exponential backoff and a retry budget
 * - Shared LRU + TTL translation cache
 * - Partial results, cancellation and "retry failed only"
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `translation`: The translation pipeline:
 *   - `translation::core`: Job-level service (validation, cache, merge)
 *   - `translation::batch`: Batch planning and concurrency window
 *   - `translation::retry`: Per-unit retry orchestration
 *   - `translation::client`: Provider client adapter
 *   - `translation::cache`: Translation cache
 * - `providers`: Client implementations for various LLM providers
 * - `file_utils`: JSON job file handling
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, ProviderError, TranslationError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use translation::{JobOptions, JobResult, TranslationCache, TranslationService, TranslationUnit};
