//! Mock provider for testing.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::model::{DocumentType, ExtractionConfig, ExtractionResult, Table};
use crate::provider::{ExtractionProvider, finish};
use crate::quality::{QualityThresholds, SPEED_THRESHOLDS};
use crate::scoring::{TEXT_EVIDENCE_MIN_CHARS, score_speed};

/// What a [`MockProvider`] produces on every call.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Nothing extracted, no errors.
    Empty,
    /// Text plus `tables` copies of a 3×3 grid.
    Content { text: String, tables: usize },
    /// Every sub-step failed with this message.
    Failure(String),
    /// Panic inside `extract`.
    Panic,
}

/// A hand-rolled mock implementing [`ExtractionProvider`] for tests.
///
/// Scores with the speed heuristic and thresholds; supports per-call latency
/// and call counting via [`call_count()`](MockProvider::call_count).
pub struct MockProvider {
    name: &'static str,
    response: MockResponse,
    affinity: Vec<DocumentType>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
}

impl MockProvider {
    /// A mock with affinity for every document type.
    pub fn new(name: &'static str, response: MockResponse) -> Self {
        Self {
            name,
            response,
            affinity: DocumentType::ALL.to_vec(),
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_affinity(mut self, types: &[DocumentType]) -> Self {
        self.affinity = types.to_vec();
        self
    }

    /// Block the calling thread this long inside `extract`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

fn sample_table(id: usize) -> Table {
    let mut table = Table::new(
        vec!["a".into(), "b".into(), "c".into()],
        (0..3)
            .map(|r| (0..3).map(|c| format!("{r}{c}")).collect())
            .collect(),
    )
    .with_page(1)
    .with_method("mock");
    table.attrs.table_id = Some(id);
    table
}

impl ExtractionProvider for MockProvider {
    fn provider_name(&self) -> &str {
        self.name
    }

    fn supports_document_type(&self, doc_type: DocumentType) -> bool {
        self.affinity.contains(&doc_type)
    }

    fn extract(&self, _path: &Path, _config: &ExtractionConfig) -> ExtractionResult {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }

        let mut result = ExtractionResult::new(self.name);
        match &self.response {
            MockResponse::Empty => {}
            MockResponse::Content { text, tables } => {
                result.text = text.clone();
                result.tables = (0..*tables).map(sample_table).collect();
                result.page_count = 1;
            }
            MockResponse::Failure(msg) => result.push_error(msg.clone()),
            MockResponse::Panic => panic!("mock provider {} panicked", self.name),
        }
        finish(self, result, started)
    }

    fn estimate_quality(&self, result: &ExtractionResult) -> f64 {
        score_speed(result, TEXT_EVIDENCE_MIN_CHARS)
    }

    fn quality_thresholds(&self) -> QualityThresholds {
        SPEED_THRESHOLDS
    }
}
