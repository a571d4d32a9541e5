/*!
 * Translation units and job results.
 *
 * A `TranslationUnit` is one text fragment tracked independently through
 * its lifecycle. Units are owned by the job that translates them and only
 * change state through the transition methods below, which the retry
 * orchestrator drives.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::ProviderError;

/// Fragment supplied by the document text extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFragment {
    /// Stable identifier used by the reassembler
    pub id: String,
    /// Text to translate
    pub text: String,
}

/// Lifecycle state of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Failure class recorded on a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Transient provider failure (the retry budget ran out)
    Transient,
    /// Non-retryable provider failure
    Fatal,
    /// The job was cancelled before the unit resolved
    Cancelled,
}

/// Last error recorded on a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitError {
    pub kind: FailureKind,
    pub code: String,
    pub message: String,
}

impl UnitError {
    /// Error recorded on units that a cancellation cut short
    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            code: "cancelled".to_string(),
            message: "cancelled".to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureKind::Cancelled
    }
}

impl From<&ProviderError> for UnitError {
    fn from(error: &ProviderError) -> Self {
        if matches!(error, ProviderError::Cancelled) {
            return Self::cancelled();
        }

        let kind = if error.is_retryable() {
            FailureKind::Transient
        } else {
            FailureKind::Fatal
        };

        Self {
            kind,
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_cancelled() {
            write!(f, "cancelled")
        } else {
            write!(f, "{} ({})", self.message, self.code)
        }
    }
}

/// Result of one attempt at a unit
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Completed(String),
    Failed { error: UnitError, retryable: bool },
}

impl UnitOutcome {
    /// Classify the adapter's answer for a single item
    pub fn from_provider_result(result: Result<String, ProviderError>) -> Self {
        match result {
            Ok(text) if !text.trim().is_empty() => Self::Completed(text),
            Ok(_) => Self::from_provider_result(Err(ProviderError::EmptyResponse)),
            Err(error) => Self::Failed {
                retryable: error.is_retryable(),
                error: UnitError::from(&error),
            },
        }
    }
}

/// One text fragment tracked through translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub id: String,
    pub source_text: String,
    pub target_language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_variant: Option<String>,
    pub status: UnitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<UnitError>,
}

impl TranslationUnit {
    /// Create a pending unit
    pub fn new(id: impl Into<String>, source_text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_text: source_text.into(),
            target_language: target_language.into(),
            model_variant: None,
            status: UnitStatus::Pending,
            translated_text: None,
            attempt_count: 0,
            last_error: None,
        }
    }

    /// Create a pending unit from an extracted fragment
    pub fn from_fragment(fragment: SourceFragment, target_language: &str) -> Self {
        Self::new(fragment.id, fragment.text, target_language)
    }

    /// Pin the unit to a specific model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_variant = Some(model.into());
        self
    }

    /// Model used for this unit, given the job default
    pub fn effective_model<'a>(&'a self, default_model: &'a str) -> &'a str {
        self.model_variant.as_deref().unwrap_or(default_model)
    }

    pub fn is_pending(&self) -> bool {
        self.status == UnitStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == UnitStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == UnitStatus::Failed
    }

    /// `Pending -> Processing`
    pub(crate) fn begin_attempt(&mut self) {
        debug_assert!(self.is_pending());
        self.status = UnitStatus::Processing;
        self.attempt_count += 1;
    }

    /// `Processing -> Pending` ahead of another attempt
    pub(crate) fn requeue(&mut self, error: UnitError) {
        self.status = UnitStatus::Pending;
        self.last_error = Some(error);
    }

    /// Terminal success
    pub(crate) fn complete(&mut self, translated_text: String) {
        self.status = UnitStatus::Completed;
        self.translated_text = Some(translated_text);
        self.last_error = None;
    }

    /// Terminal failure
    pub(crate) fn fail(&mut self, error: UnitError) {
        self.status = UnitStatus::Failed;
        self.translated_text = None;
        self.last_error = Some(error);
    }

    /// Back to a fresh pending unit, keeping identity and text
    pub(crate) fn reset(&mut self) {
        self.status = UnitStatus::Pending;
        self.translated_text = None;
        self.attempt_count = 0;
        self.last_error = None;
    }
}

/// Overall outcome of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    PartialSuccess,
    Failure,
}

impl JobStatus {
    /// Derive the job status from its resolved units
    pub fn from_units(units: &[TranslationUnit]) -> Self {
        let completed = units.iter().filter(|u| u.is_completed()).count();
        let failed = units.iter().filter(|u| u.is_failed()).count();

        match (completed, failed) {
            (_, 0) => Self::Success,
            (0, _) => Self::Failure,
            _ => Self::PartialSuccess,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial success",
            Self::Failure => "failure",
        };
        write!(f, "{}", label)
    }
}

/// Immutable result of a translation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    job_id: Uuid,
    status: JobStatus,
    total_attempts: u32,
    cache_hits: usize,
    duration_ms: u64,
    units: Vec<TranslationUnit>,
}

impl JobResult {
    pub(crate) fn new(
        job_id: Uuid,
        units: Vec<TranslationUnit>,
        total_attempts: u32,
        cache_hits: usize,
        duration: Duration,
    ) -> Self {
        Self {
            job_id,
            status: JobStatus::from_units(&units),
            total_attempts,
            cache_hits,
            duration_ms: duration.as_millis() as u64,
            units,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Provider attempts spent across all units
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    /// Units answered from the cache without a provider call
    pub fn cache_hits(&self) -> usize {
        self.cache_hits
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// All units in input order
    pub fn units(&self) -> &[TranslationUnit] {
        &self.units
    }

    pub fn completed_units(&self) -> Vec<&TranslationUnit> {
        self.units.iter().filter(|u| u.is_completed()).collect()
    }

    pub fn failed_units(&self) -> Vec<&TranslationUnit> {
        self.units.iter().filter(|u| u.is_failed()).collect()
    }

    pub fn unit(&self, id: &str) -> Option<&TranslationUnit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// `(id, translated text)` pairs in input order for the reassembler
    pub fn translations(&self) -> Vec<(&str, &str)> {
        self.units
            .iter()
            .filter_map(|u| u.translated_text.as_deref().map(|t| (u.id.as_str(), t)))
            .collect()
    }

    pub(crate) fn into_units(self) -> Vec<TranslationUnit> {
        self.units
    }
}
