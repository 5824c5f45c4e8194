use std::path::Path;
use std::time::Instant;

use pdfarbiter_core::layout::render_layout_text;
use pdfarbiter_core::{
    DocumentType, ExtractionConfig, ExtractionProvider, ExtractionResult, ProviderInitError,
    QualityThresholds, SPEED_THRESHOLDS, TEXT_EVIDENCE_MIN_CHARS, Table, TableDetector,
    TableDetectorConfig, finish, score_speed,
};

use crate::MupdfError;
use crate::document::{self, PageScan};

/// Speed-oriented provider: MuPDF text plus stream-detected tables in one
/// pass over the pages. Affine to every document type.
pub struct MupdfProvider {
    text_evidence_min_chars: usize,
}

impl MupdfProvider {
    pub const NAME: &'static str = "mupdf";

    /// Probe MuPDF and build the provider.
    pub fn try_new() -> Result<Self, ProviderInitError> {
        crate::probe(Self::NAME)?;
        Ok(Self {
            text_evidence_min_chars: TEXT_EVIDENCE_MIN_CHARS,
        })
    }

    /// Text must exceed this many characters to count toward the score.
    pub fn with_text_evidence_min_chars(mut self, chars: usize) -> Self {
        self.text_evidence_min_chars = chars;
        self
    }

    fn collect_tables(
        &self,
        detector: &TableDetector,
        scan: &PageScan,
        config: &ExtractionConfig,
        result: &mut ExtractionResult,
    ) {
        for detected in detector.detect(&scan.layout) {
            let accuracy = detected.accuracy;
            let Some(table) = Table::from_header_grid(detected.rows) else {
                continue;
            };
            if table.num_rows() < config.min_table_rows {
                continue;
            }
            result.tables.push(
                table
                    .with_page(scan.layout.page_number)
                    .with_method(Self::NAME)
                    .with_accuracy(accuracy),
            );
        }
    }
}

impl ExtractionProvider for MupdfProvider {
    fn provider_name(&self) -> &str {
        Self::NAME
    }

    fn supports_document_type(&self, _doc_type: DocumentType) -> bool {
        true
    }

    fn extract(&self, path: &Path, config: &ExtractionConfig) -> ExtractionResult {
        let started = Instant::now();
        let mut result = ExtractionResult::new(Self::NAME);

        let document = match document::open(path) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(provider = Self::NAME, path = %path.display(), error = %e, "failed to open document");
                result.push_error(format!("Failed to open document: {e}"));
                return finish(self, result, started);
            }
        };

        match document::page_count(&document) {
            Ok(n) => result.page_count = n,
            Err(e) => result.push_error(format!("Failed to count pages: {e}")),
        }

        if config.extract_text || config.extract_tables {
            let detector =
                TableDetector::new(TableDetectorConfig::stream().with_overrides(config, Self::NAME));
            let mut page_texts = Vec::new();

            match document.pages() {
                Ok(pages) => {
                    for (index, page) in pages.enumerate() {
                        let number = index + 1;
                        let scan = page
                            .map_err(MupdfError::from)
                            .and_then(|p| document::scan_page(&p, number));
                        let scan = match scan {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!(provider = Self::NAME, page = number, error = %e, "page scan failed");
                                if config.extract_text {
                                    result.push_error(format!(
                                        "Text extraction failed on page {number}: {e}"
                                    ));
                                }
                                if config.extract_tables {
                                    result.push_error(format!(
                                        "Table extraction failed on page {number}: {e}"
                                    ));
                                }
                                continue;
                            }
                        };
                        tracing::debug!(provider = Self::NAME, page = number, cells = scan.layout.cells.len(), "scanned page");

                        if config.extract_tables {
                            self.collect_tables(&detector, &scan, config, &mut result);
                        }
                        if config.extract_text {
                            if config.preserve_layout {
                                page_texts.push(render_layout_text(&scan.layout));
                            } else {
                                page_texts.push(scan.text);
                            }
                        }
                    }
                }
                Err(e) => result.push_error(format!("Failed to read pages: {e}")),
            }

            result.text = page_texts.join("\n");
        }

        result.metadata = document::metadata(&document);
        finish(self, result, started)
    }

    fn estimate_quality(&self, result: &ExtractionResult) -> f64 {
        score_speed(result, self.text_evidence_min_chars)
    }

    fn quality_thresholds(&self) -> QualityThresholds {
        SPEED_THRESHOLDS
    }
}
