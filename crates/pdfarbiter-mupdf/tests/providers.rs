use std::path::{Path, PathBuf};

use pdfarbiter_core::fixture::{Placed, placed, text_pdf};
use pdfarbiter_core::{
    DocumentType, ExtractionConfig, ExtractionProvider, ExtractionQuality, TableDetectionStrategy,
};
use pdfarbiter_mupdf::{MupdfProvider, TableProvider};

fn invoice_page() -> Vec<Placed<'static>> {
    let mut runs = vec![placed(50.0, 60.0, "ACME Hardware Supplies - Invoice 2024-117")];
    let rows = [
        ["Item", "Qty", "Price"],
        ["Bolts", "12", "3.50"],
        ["Nuts", "40", "1.20"],
        ["Washers", "100", "0.05"],
    ];
    for (r, row) in rows.iter().enumerate() {
        let y = 100.0 + r as f32 * 14.0;
        for (x, text) in [50.0, 200.0, 300.0].into_iter().zip(row.iter()) {
            runs.push(placed(x, y, text));
        }
    }
    runs.push(placed(
        50.0,
        300.0,
        "Payment is due within thirty days of the invoice date.",
    ));
    runs
}

fn write_invoice(dir: &Path) -> PathBuf {
    let path = dir.join("invoice.pdf");
    let page = invoice_page();
    std::fs::write(&path, text_pdf(&[page.as_slice()])).unwrap();
    path
}

#[test]
fn probes_succeed() {
    assert!(MupdfProvider::try_new().is_ok());
    assert!(TableProvider::try_new().is_ok());
}

#[test]
fn names_and_affinity() {
    let mupdf = MupdfProvider::try_new().unwrap();
    let tables = TableProvider::try_new().unwrap();
    assert_eq!(mupdf.provider_name(), "mupdf");
    assert_eq!(tables.provider_name(), "tables");
    for t in DocumentType::ALL {
        assert!(mupdf.supports_document_type(t));
    }
    assert!(tables.supports_document_type(DocumentType::Invoice));
    assert!(!tables.supports_document_type(DocumentType::Scanned));
}

#[test]
fn missing_file_yields_failed_result() {
    let missing = Path::new("/nonexistent/definitely-missing.pdf");
    let config = ExtractionConfig::default();

    let mupdf = MupdfProvider::try_new().unwrap().extract(missing, &config);
    assert_eq!(mupdf.provider_used, "mupdf");
    assert_eq!(mupdf.quality_level(), ExtractionQuality::Failed);
    assert_eq!(mupdf.quality_score(), 0.0);
    assert!(mupdf.errors[0].starts_with("Failed to open document"));

    let tables = TableProvider::try_new().unwrap().extract(missing, &config);
    assert_eq!(tables.quality_level(), ExtractionQuality::Failed);
    assert!(tables.errors.iter().any(|e| e.starts_with("Lattice extraction failed")));
    assert!(tables.errors.iter().any(|e| e.starts_with("Stream extraction failed")));
}

#[test]
fn mupdf_extracts_text_and_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_invoice(dir.path());
    let provider = MupdfProvider::try_new().unwrap();

    let result = provider.extract(&path, &ExtractionConfig::default());
    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(result.page_count, 1);
    assert!(result.text.contains("Bolts"));
    assert!(result.text.contains("Payment is due"));
    assert!(!result.tables.is_empty());

    let table = &result.tables[0];
    assert_eq!(table.attrs.page, Some(1));
    assert_eq!(table.attrs.extraction_method.as_deref(), Some("mupdf"));
    assert_eq!(table.num_columns(), 3);
    assert!(table.num_rows() >= 2);

    assert!(result.metadata.values().all(|v| v.as_str().is_some_and(|s| !s.is_empty())));
    assert_eq!(result.quality_score(), provider.estimate_quality(&result));
    assert_eq!(result.quality_level(), ExtractionQuality::High);
}

#[test]
fn mupdf_respects_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_invoice(dir.path());
    let provider = MupdfProvider::try_new().unwrap();

    let config = ExtractionConfig::builder()
        .extract_tables(false)
        .preserve_layout(false)
        .build()
        .unwrap();
    let result = provider.extract(&path, &config);
    assert!(result.tables.is_empty());
    assert!(result.text.contains("Washers"));

    let config = ExtractionConfig::builder()
        .extract_text(false)
        .min_table_rows(50)
        .build()
        .unwrap();
    let result = provider.extract(&path, &config);
    assert!(result.text.is_empty());
    assert!(result.tables.is_empty());
    assert_eq!(result.page_count, 1);
}

#[test]
fn table_provider_keeps_confident_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_invoice(dir.path());
    let provider = TableProvider::try_new().unwrap();

    let result = provider.extract(&path, &ExtractionConfig::default());
    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(result.page_count, 1);
    assert!(!result.tables.is_empty());
    assert!(result.text.contains("Invoice"));

    for (i, table) in result.tables.iter().enumerate() {
        assert_eq!(table.attrs.table_id, Some(i));
        assert_eq!(table.attrs.extraction_method.as_deref(), Some("tables"));
        assert!(table.attrs.accuracy.unwrap() > 0.8);
        assert_eq!(table.columns().to_vec(), ["0", "1", "2"]);
    }
    assert!(result.quality_level() >= ExtractionQuality::Medium);
}

#[test]
fn table_provider_strategy_and_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_invoice(dir.path());
    let provider = TableProvider::try_new().unwrap();

    let auto = provider.extract(&path, &ExtractionConfig::default());
    let lines = provider.extract(
        &path,
        &ExtractionConfig::builder()
            .table_detection_strategy(TableDetectionStrategy::Lines)
            .build()
            .unwrap(),
    );
    assert!(lines.tables.len() <= auto.tables.len());

    let strict = provider.extract(
        &path,
        &ExtractionConfig::builder()
            .table_accuracy_threshold(1.0)
            .build()
            .unwrap(),
    );
    assert!(strict.tables.is_empty());
    assert!(!strict.text.is_empty());
}
