//! Score → level bucketing.
//!
//! Every provider buckets its own score with its own thresholds; the values
//! below are part of each provider's contract, not global constants.

use crate::model::ExtractionQuality;

/// Cut-offs for [`ExtractionQuality::High`] and [`ExtractionQuality::Medium`].
///
/// Any positive score below `medium` is `Low`; exactly zero is `Failed`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    pub high: f64,
    pub medium: f64,
}

/// Table-oriented provider.
pub const TABLE_FOCUSED_THRESHOLDS: QualityThresholds = QualityThresholds::new(0.7, 0.4);
/// Layout-oriented provider.
pub const LAYOUT_THRESHOLDS: QualityThresholds = QualityThresholds::new(0.8, 0.5);
/// Speed-oriented provider.
pub const SPEED_THRESHOLDS: QualityThresholds = QualityThresholds::new(0.7, 0.4);

impl QualityThresholds {
    pub const fn new(high: f64, medium: f64) -> Self {
        Self { high, medium }
    }

    pub fn level(&self, score: f64) -> ExtractionQuality {
        if score >= self.high {
            ExtractionQuality::High
        } else if score >= self.medium {
            ExtractionQuality::Medium
        } else if score > 0.0 {
            ExtractionQuality::Low
        } else {
            ExtractionQuality::Failed
        }
    }
}
