/*!
 * Common test utilities for the doctrans test suite
 */

#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use doctrans::providers::mock::MockProvider;
use doctrans::translation::{
    ClientOptions, PipelineOptions, RetryPolicy, TranslationCache, TranslationService, TranslationUnit,
};

/// Model name used by every test pipeline
pub const TEST_MODEL: &str = "mock-model";

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a fragments file with `count` numbered fragments
pub fn create_fragments_file(dir: &Path, filename: &str, count: usize) -> Result<PathBuf> {
    let fragments: Vec<serde_json::Value> = (1..=count)
        .map(|i| serde_json::json!({ "id": format!("s{}", i), "text": fragment_text(i) }))
        .collect();
    create_test_file(dir, filename, &serde_json::to_string_pretty(&fragments)?)
}

/// Source text of the numbered test fragment
pub fn fragment_text(index: usize) -> String {
    format!("Slide text number {}", index)
}

/// `count` pending units with ids `u1..=count`, all targeting French
pub fn numbered_units(count: usize) -> Vec<TranslationUnit> {
    (1..=count)
        .map(|i| TranslationUnit::new(format!("u{}", i), fragment_text(i), "fr"))
        .collect()
}

/// Pipeline options with small, deterministic settings
pub fn test_options(batch_size: usize, concurrency: usize) -> PipelineOptions {
    PipelineOptions {
        default_model: TEST_MODEL.to_string(),
        batch_size,
        max_chars_per_batch: 100_000,
        concurrency,
        group_delay: Duration::from_millis(500),
        retry: RetryPolicy::default(),
        client: ClientOptions::default(),
        ..PipelineOptions::default()
    }
}

/// Service over `provider` with a fresh cache
pub fn service_with(provider: &MockProvider, options: PipelineOptions) -> (TranslationService, Arc<TranslationCache>) {
    let cache = Arc::new(TranslationCache::default());
    let service = TranslationService::new(Arc::new(provider.clone()), Arc::clone(&cache), options);
    (service, cache)
}

/// Initialize env_logger once for tests that want log output
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
