use std::path::Path;
use std::time::Instant;

use pdfarbiter_core::{
    DetectedTable, DocumentType, ExtractionConfig, ExtractionProvider, ExtractionResult,
    ProviderInitError, QualityThresholds, TABLE_FOCUSED_THRESHOLDS, Table, TableDetectionStrategy,
    TableDetector, TableDetectorConfig, finish, score_table_focused,
};

use crate::MupdfError;
use crate::document;

const AFFINITY: [DocumentType; 3] = [
    DocumentType::FinancialReport,
    DocumentType::Invoice,
    DocumentType::Form,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Lattice,
    Stream,
}

impl Pass {
    fn for_strategy(strategy: TableDetectionStrategy) -> &'static [Pass] {
        match strategy {
            TableDetectionStrategy::Auto => &[Pass::Lattice, Pass::Stream],
            TableDetectionStrategy::Lines => &[Pass::Lattice],
            TableDetectionStrategy::Text => &[Pass::Stream],
        }
    }

    fn label(self) -> &'static str {
        match self {
            Pass::Lattice => "Lattice",
            Pass::Stream => "Stream",
        }
    }

    fn detector_config(self) -> TableDetectorConfig {
        match self {
            Pass::Lattice => TableDetectorConfig::lattice(),
            Pass::Stream => TableDetectorConfig::stream(),
        }
    }
}

/// Table-oriented provider: runs the lattice and stream detectors as
/// separate passes over the document and keeps only confident grids.
/// Text is a by-product.
pub struct TableProvider;

impl TableProvider {
    pub const NAME: &'static str = "tables";

    /// Probe MuPDF and build the provider.
    pub fn try_new() -> Result<Self, ProviderInitError> {
        crate::probe(Self::NAME)?;
        Ok(Self)
    }

    /// One detection pass. Each pass reads the document on its own so a
    /// failure in one does not take the other down.
    fn run_pass(
        path: &Path,
        detector: &TableDetector,
    ) -> Result<Vec<(usize, DetectedTable)>, MupdfError> {
        let document = document::open(path)?;
        let mut found = Vec::new();
        for scan in document::scan_all(&document)? {
            let page = scan.layout.page_number;
            found.extend(detector.detect(&scan.layout).into_iter().map(|t| (page, t)));
        }
        Ok(found)
    }

    fn extract_tables(&self, path: &Path, config: &ExtractionConfig, result: &mut ExtractionResult) {
        let mut next_id = 0;
        for &pass in Pass::for_strategy(config.table_detection_strategy) {
            let detector =
                TableDetector::new(pass.detector_config().with_overrides(config, Self::NAME));
            let found = match Self::run_pass(path, &detector) {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(provider = Self::NAME, pass = pass.label(), error = %e, "table pass failed");
                    result.push_error(format!("{} extraction failed: {e}", pass.label()));
                    continue;
                }
            };

            let total = found.len();
            let mut kept = 0;
            for (page, detected) in found {
                if detected.accuracy <= config.table_accuracy_threshold {
                    continue;
                }
                let mut table = Table::from_positional_grid(detected.rows)
                    .with_page(page)
                    .with_method(Self::NAME)
                    .with_accuracy(detected.accuracy);
                table.attrs.table_id = Some(next_id);
                next_id += 1;
                kept += 1;
                result.tables.push(table);
            }
            tracing::debug!(provider = Self::NAME, pass = pass.label(), total, kept, "table pass finished");
        }
    }

    /// Page count and plain MuPDF text.
    fn extract_text(&self, path: &Path, config: &ExtractionConfig, result: &mut ExtractionResult) {
        let document = match document::open(path) {
            Ok(d) => d,
            Err(e) => {
                result.push_error(format!("Text extraction failed: {e}"));
                return;
            }
        };
        match document::page_count(&document) {
            Ok(n) => result.page_count = n,
            Err(e) => result.push_error(format!("Failed to count pages: {e}")),
        }
        if !config.extract_text {
            return;
        }
        match document::scan_all(&document) {
            Ok(scans) => {
                result.text = scans
                    .into_iter()
                    .map(|s| s.text)
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            Err(e) => result.push_error(format!("Text extraction failed: {e}")),
        }
    }
}

impl ExtractionProvider for TableProvider {
    fn provider_name(&self) -> &str {
        Self::NAME
    }

    fn supports_document_type(&self, doc_type: DocumentType) -> bool {
        AFFINITY.contains(&doc_type)
    }

    fn extract(&self, path: &Path, config: &ExtractionConfig) -> ExtractionResult {
        let started = Instant::now();
        let mut result = ExtractionResult::new(Self::NAME);

        if config.extract_tables {
            self.extract_tables(path, config, &mut result);
        }
        self.extract_text(path, config, &mut result);

        finish(self, result, started)
    }

    fn estimate_quality(&self, result: &ExtractionResult) -> f64 {
        score_table_focused(result)
    }

    fn quality_thresholds(&self) -> QualityThresholds {
        TABLE_FOCUSED_THRESHOLDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_selects_passes() {
        assert_eq!(
            Pass::for_strategy(TableDetectionStrategy::Auto),
            &[Pass::Lattice, Pass::Stream]
        );
        assert_eq!(Pass::for_strategy(TableDetectionStrategy::Lines), &[Pass::Lattice]);
        assert_eq!(Pass::for_strategy(TableDetectionStrategy::Text), &[Pass::Stream]);
    }

    #[test]
    fn test_affinity() {
        let provider = TableProvider;
        assert!(provider.supports_document_type(DocumentType::Invoice));
        assert!(provider.supports_document_type(DocumentType::FinancialReport));
        assert!(provider.supports_document_type(DocumentType::Form));
        assert!(!provider.supports_document_type(DocumentType::ScientificPaper));
        assert!(!provider.supports_document_type(DocumentType::SimpleText));
    }
}
