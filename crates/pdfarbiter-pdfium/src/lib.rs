//! PDFium-backed layout-oriented provider.
//!
//! The PDFium shared library is located and bound once at construction
//! ([`PdfiumProvider::probe`]). PDFium is not thread-safe, so the bound
//! handle lives behind a mutex and extractions through one provider run one
//! at a time. Documents are opened and closed within a single call.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use pdfium_render::prelude::*;
use serde_json::Value;

use pdfarbiter_core::layout::render_layout_text;
use pdfarbiter_core::{
    DocumentType, ExtractionConfig, ExtractionProvider, ExtractionResult, LAYOUT_THRESHOLDS,
    PageLayout, ProviderInitError, QualityThresholds, TEXT_EVIDENCE_MIN_CHARS, Table,
    TableDetector, TableDetectorConfig, TextCell, finish, score_layout,
};

/// Environment variable naming the PDFium library file or its directory.
pub const LIBRARY_PATH_ENV: &str = "PDFIUM_LIBRARY_PATH";

/// Document types this provider is suited for.
pub const LAYOUT_AFFINITY: [DocumentType; 4] = [
    DocumentType::ScientificPaper,
    DocumentType::FinancialReport,
    DocumentType::Form,
    DocumentType::MixedLayout,
];

const METADATA_FIELDS: [(PdfDocumentMetadataTagType, &str); 5] = [
    (PdfDocumentMetadataTagType::Creator, "creator"),
    (PdfDocumentMetadataTagType::Producer, "producer"),
    (PdfDocumentMetadataTagType::CreationDate, "creation_date"),
    (PdfDocumentMetadataTagType::Title, "title"),
    (PdfDocumentMetadataTagType::Author, "author"),
];

/// Where to find the PDFium shared library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PdfiumLibrary {
    /// The platform library name in the working directory, then the system
    /// library search path.
    #[default]
    LocalOrSystem,
    /// The system library search path only.
    System,
    /// An explicit library file.
    File(PathBuf),
    /// A directory holding the platform library name.
    Directory(PathBuf),
}

impl PdfiumLibrary {
    /// Read [`LIBRARY_PATH_ENV`].
    pub fn from_env() -> Self {
        Self::from_setting(std::env::var_os(LIBRARY_PATH_ENV).as_deref())
    }

    /// Interpret a configured location: a directory, a file, or nothing.
    pub fn from_setting(setting: Option<&OsStr>) -> Self {
        match setting {
            Some(s) if !s.is_empty() => {
                let path = PathBuf::from(s);
                if path.is_dir() {
                    PdfiumLibrary::Directory(path)
                } else {
                    PdfiumLibrary::File(path)
                }
            }
            _ => PdfiumLibrary::LocalOrSystem,
        }
    }

    fn bind(&self) -> Result<Pdfium, PdfiumError> {
        let bindings = match self {
            PdfiumLibrary::LocalOrSystem => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| Pdfium::bind_to_system_library())
            }
            PdfiumLibrary::System => Pdfium::bind_to_system_library(),
            PdfiumLibrary::File(path) => {
                Pdfium::bind_to_library(path.to_string_lossy().into_owned())
            }
            PdfiumLibrary::Directory(dir) => Pdfium::bind_to_library(
                Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref()),
            ),
        }?;
        Ok(Pdfium::new(bindings))
    }
}

/// A bound PDFium instance.
struct BoundPdfium(Pdfium);

// SAFETY: the handle is only reached through `PdfiumProvider::pdfium`, a
// mutex, so PDFium is never entered from two threads at once.
unsafe impl Send for BoundPdfium {}

/// Layout-oriented provider: text reconstructed from PDFium text segments
/// with their positions, plus lattice-detected tables.
pub struct PdfiumProvider {
    library: PdfiumLibrary,
    pdfium: Mutex<BoundPdfium>,
    text_evidence_min_chars: usize,
}

impl PdfiumProvider {
    pub const NAME: &'static str = "pdfium";

    /// Bind the library. Failure means the provider cannot exist.
    pub fn probe(library: PdfiumLibrary) -> Result<Self, ProviderInitError> {
        let pdfium = library
            .bind()
            .map_err(|e| ProviderInitError::LibraryUnavailable {
                provider: Self::NAME.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(provider = Self::NAME, library = ?library, "pdfium probe succeeded");
        Ok(Self {
            library,
            pdfium: Mutex::new(BoundPdfium(pdfium)),
            text_evidence_min_chars: TEXT_EVIDENCE_MIN_CHARS,
        })
    }

    /// Text must exceed this many characters to count toward the score.
    pub fn with_text_evidence_min_chars(mut self, chars: usize) -> Self {
        self.text_evidence_min_chars = chars;
        self
    }

    pub fn library(&self) -> &PdfiumLibrary {
        &self.library
    }

    fn extract_with(
        &self,
        pdfium: &Pdfium,
        path: &Path,
        config: &ExtractionConfig,
        result: &mut ExtractionResult,
    ) {
        let password = config.param_str(Self::NAME, "password");
        let document = match pdfium.load_pdf_from_file(path, password) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(provider = Self::NAME, path = %path.display(), error = %e, "failed to open document");
                result.push_error(format!("Failed to open document: {e}"));
                return;
            }
        };

        result.page_count = document.pages().len() as usize;
        let detector =
            TableDetector::new(TableDetectorConfig::lattice().with_overrides(config, Self::NAME));
        let mut page_texts = Vec::new();

        for (index, page) in document.pages().iter().enumerate() {
            let number = index + 1;
            let text = match page.text() {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(provider = Self::NAME, page = number, error = %e, "page text failed");
                    result.push_error(format!("Text extraction failed on page {number}: {e}"));
                    continue;
                }
            };
            let layout = page_layout(&page, &text, number);
            tracing::debug!(provider = Self::NAME, page = number, cells = layout.cells.len(), "read page");

            if config.extract_text {
                if config.preserve_layout {
                    page_texts.push(render_layout_text(&layout));
                } else {
                    page_texts.push(text.all());
                }
            }

            if config.extract_tables {
                for detected in detector.detect(&layout) {
                    if detected.rows.len() < config.min_table_rows {
                        continue;
                    }
                    let accuracy = detected.accuracy;
                    if let Some(table) = Table::from_header_grid(detected.rows) {
                        result.tables.push(
                            table
                                .with_page(number)
                                .with_method(Self::NAME)
                                .with_accuracy(accuracy),
                        );
                    }
                }
            }
        }

        result.text = page_texts.join("\n");
        result.metadata = metadata(&document);
    }
}

/// Convert PDFium text segments to cells, top-left origin.
fn page_layout(page: &PdfPage<'_>, text: &PdfPageText<'_>, page_number: usize) -> PageLayout {
    let width = page.width().value;
    let height = page.height().value;
    let mut layout = PageLayout::new(page_number, width, height);

    for segment in text.segments().iter() {
        let content = segment.text();
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        let bounds = segment.bounds();
        layout.cells.push(TextCell::new(
            content,
            bounds.left().value,
            height - bounds.top().value,
            bounds.right().value - bounds.left().value,
            bounds.top().value - bounds.bottom().value,
        ));
    }

    layout
}

fn metadata(document: &PdfDocument<'_>) -> BTreeMap<String, Value> {
    let info = document.metadata();
    let mut out = BTreeMap::new();
    for (tag, key) in METADATA_FIELDS {
        if let Some(value) = info.get(tag) {
            let value = value.value().trim();
            if !value.is_empty() {
                out.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
    }
    out
}

impl ExtractionProvider for PdfiumProvider {
    fn provider_name(&self) -> &str {
        Self::NAME
    }

    fn supports_document_type(&self, doc_type: DocumentType) -> bool {
        LAYOUT_AFFINITY.contains(&doc_type)
    }

    fn extract(&self, path: &Path, config: &ExtractionConfig) -> ExtractionResult {
        let started = Instant::now();
        let mut result = ExtractionResult::new(Self::NAME);
        {
            let bound = self.pdfium.lock().unwrap_or_else(PoisonError::into_inner);
            self.extract_with(&bound.0, path, config, &mut result);
        }
        finish(self, result, started)
    }

    fn estimate_quality(&self, result: &ExtractionResult) -> f64 {
        score_layout(result, self.text_evidence_min_chars)
    }

    fn quality_thresholds(&self) -> QualityThresholds {
        LAYOUT_THRESHOLDS
    }
}
