use std::path::Path;
use std::time::Instant;

use crate::model::{DocumentType, ExtractionConfig, ExtractionResult};
use crate::quality::QualityThresholds;

/// An interchangeable PDF extraction backend.
///
/// Implementors are constructed through a fallible probe (the backend
/// library may be missing); once constructed, [`extract`](Self::extract)
/// never fails. Sub-step failures go into [`ExtractionResult::errors`] and
/// the score reflects whatever was actually obtained.
pub trait ExtractionProvider: Send + Sync {
    /// Stable identifier: key into `provider_params` and result provenance.
    fn provider_name(&self) -> &str;

    /// Static affinity. No I/O.
    fn supports_document_type(&self, doc_type: DocumentType) -> bool;

    /// Run one extraction attempt.
    fn extract(&self, path: &Path, config: &ExtractionConfig) -> ExtractionResult;

    /// Score a finished result in [0, 1]. Pure: reads only `result`.
    fn estimate_quality(&self, result: &ExtractionResult) -> f64;

    /// Thresholds this provider buckets its own scores with.
    fn quality_thresholds(&self) -> QualityThresholds;
}

/// Stamp the elapsed time, score the result with the provider's own
/// heuristic and bucket it with the provider's own thresholds.
pub fn finish<P>(provider: &P, mut result: ExtractionResult, started: Instant) -> ExtractionResult
where
    P: ExtractionProvider + ?Sized,
{
    result.extraction_time = started.elapsed();
    let score = provider.estimate_quality(&result);
    result.set_quality(score, provider.quality_thresholds());
    tracing::debug!(
        provider = provider.provider_name(),
        score,
        level = %result.quality_level(),
        errors = result.errors.len(),
        "extraction finished"
    );
    result
}
