/*!
 * Resilient batch translation of document fragments.
 *
 * This module contains the translation pipeline, split into several submodules:
 *
 * - `unit`: Translation units, their lifecycle and job results
 * - `cache`: Shared LRU + TTL translation cache
 * - `prompts`: Prompt templates and batch marker handling
 * - `client`: Provider client adapter (batch calls, fallback, timeouts)
 * - `retry`: Per-unit retry state machine with exponential backoff
 * - `batch`: Batch planning and bounded-concurrency execution
 * - `core`: The job-level service merging cache hits and fresh translations
 * - `progress`, `cancellation`, `quality`, `concurrency`: supporting pieces
 */

// Re-export main types for easier usage
pub use self::batch::{BatchManager, plan_batches};
pub use self::cache::{CacheStats, TranslationCache};
pub use self::cancellation::CancellationHandle;
pub use self::client::{ClientOptions, RequestContext, TranslationClient};
pub use self::core::{JobOptions, PipelineOptions, TranslationService};
pub use self::progress::{Progress, ProgressEvent, ProgressReporter};
pub use self::retry::{JobContext, RetryOrchestrator, RetryPolicy};
pub use self::unit::{
    FailureKind, JobResult, JobStatus, SourceFragment, TranslationUnit, UnitError, UnitOutcome, UnitStatus,
};

// Submodules
pub mod batch;
pub mod cache;
pub mod cancellation;
pub mod client;
pub mod concurrency;
pub mod core;
pub mod progress;
pub mod prompts;
pub mod quality;
pub mod retry;
pub mod unit;
