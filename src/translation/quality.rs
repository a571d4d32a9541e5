//! Advisory quality checks on completed translations.
//!
//! These never change a unit's outcome; the orchestrator only logs them.

use std::fmt;

/// Translations shorter than this share of the source length are flagged
const MIN_LENGTH_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityWarning {
    /// The translation is the source text unchanged
    IdenticalToSource,
    /// The translation is much shorter than the source
    SuspiciouslyShort { source_chars: usize, translated_chars: usize },
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdenticalToSource => write!(f, "translation is identical to the source"),
            Self::SuspiciouslyShort {
                source_chars,
                translated_chars,
            } => write!(
                f,
                "translation has {} chars for a {} char source",
                translated_chars, source_chars
            ),
        }
    }
}

/// Check a translation against its source
pub fn assess(source: &str, translated: &str) -> Option<QualityWarning> {
    let source = source.trim();
    let translated = translated.trim();

    if source == translated {
        return Some(QualityWarning::IdenticalToSource);
    }

    let source_chars = source.chars().count();
    let translated_chars = translated.chars().count();
    if (translated_chars as f64) < source_chars as f64 * MIN_LENGTH_RATIO {
        return Some(QualityWarning::SuspiciouslyShort {
            source_chars,
            translated_chars,
        });
    }

    None
}
