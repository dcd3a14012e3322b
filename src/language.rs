//! English-only acceptance filter over `whatlang`.
//!
//! The detector is restricted to a small candidate set so that English is not confused
//! with unrelated languages on short headlines. A `LanguageFilter` is built once at
//! startup and shared read-only (`Arc<LanguageFilter>`) between all fetch workers.

use tracing::debug;
use whatlang::{Detector, Lang};

use crate::TARGET_PIPELINE;

pub const CANDIDATE_LANGUAGES: [Lang; 6] = [
    Lang::Eng,
    Lang::Deu,
    Lang::Fra,
    Lang::Spa,
    Lang::Rus,
    Lang::Cmn,
];

/// whatlang's confidence is poorly calibrated on headline-length text, so by default any
/// English label is accepted. A positive floor makes the filter stricter.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.0;

pub struct LanguageFilter {
    detector: Detector,
    min_confidence: f64,
}

impl Default for LanguageFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

impl LanguageFilter {
    pub fn new(min_confidence: f64) -> Self {
        Self {
            detector: Detector::with_allowlist(CANDIDATE_LANGUAGES.to_vec()),
            min_confidence,
        }
    }

    /// True iff the text is detected as English with at least the configured confidence.
    ///
    /// No detection is a rejection.
    pub fn is_accepted(&self, text: &str) -> bool {
        match self.detector.detect(text) {
            Some(info) if info.lang() == Lang::Eng => {
                if info.confidence() >= self.min_confidence {
                    true
                } else {
                    debug!(target: TARGET_PIPELINE, "Low confidence English detection ({:.2}), rejecting", info.confidence());
                    false
                }
            }
            Some(_) => false,
            None => false,
        }
    }
}
