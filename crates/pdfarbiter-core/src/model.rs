//! Shared types: document categories, quality levels, extraction config and
//! the per-attempt result accumulator.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::ConfigError;
use crate::quality::QualityThresholds;

/// Document categories used to match provider affinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    ScientificPaper,
    FinancialReport,
    Invoice,
    Form,
    MixedLayout,
    Scanned,
    SimpleText,
}

impl DocumentType {
    pub const ALL: [DocumentType; 7] = [
        DocumentType::ScientificPaper,
        DocumentType::FinancialReport,
        DocumentType::Invoice,
        DocumentType::Form,
        DocumentType::MixedLayout,
        DocumentType::Scanned,
        DocumentType::SimpleText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::ScientificPaper => "scientific_paper",
            DocumentType::FinancialReport => "financial_report",
            DocumentType::Invoice => "invoice",
            DocumentType::Form => "form",
            DocumentType::MixedLayout => "mixed_layout",
            DocumentType::Scanned => "scanned",
            DocumentType::SimpleText => "simple_text",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| ConfigError::UnknownDocumentType(s.to_string()))
    }
}

/// Ordinal quality bucket. Only ever derived from a score through
/// [`QualityThresholds::level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionQuality {
    Failed,
    Low,
    Medium,
    High,
}

impl ExtractionQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionQuality::Failed => "failed",
            ExtractionQuality::Low => "low",
            ExtractionQuality::Medium => "medium",
            ExtractionQuality::High => "high",
        }
    }
}

impl fmt::Display for ExtractionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionQuality {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "failed" => Ok(ExtractionQuality::Failed),
            "low" => Ok(ExtractionQuality::Low),
            "medium" => Ok(ExtractionQuality::Medium),
            "high" => Ok(ExtractionQuality::High),
            _ => Err(ConfigError::UnknownQualityLevel(s.to_string())),
        }
    }
}

/// Which table detection passes a provider should run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableDetectionStrategy {
    #[default]
    Auto,
    /// Ruled/strictly aligned grids only.
    Lines,
    /// Whitespace-separated columns only.
    Text,
}

impl FromStr for TableDetectionStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(TableDetectionStrategy::Auto),
            "lines" => Ok(TableDetectionStrategy::Lines),
            "text" => Ok(TableDetectionStrategy::Text),
            _ => Err(ConfigError::UnknownTableStrategy(s.to_string())),
        }
    }
}

/// Backend-specific options, kept verbatim.
pub type ProviderOptions = serde_json::Map<String, Value>;

/// What to extract and how. Use [`ExtractionConfigBuilder`] to construct a
/// validated instance; [`Default`] is always valid.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    pub extract_text: bool,
    pub extract_tables: bool,
    pub extract_images: bool,
    pub preserve_layout: bool,

    pub table_detection_strategy: TableDetectionStrategy,
    /// Minimum accuracy (0.0–1.0) a detected table needs to be kept.
    pub table_accuracy_threshold: f64,
    pub merge_similar_tables: bool,

    pub min_text_length: usize,
    pub min_table_rows: usize,

    /// Upper bound for a single provider invocation.
    pub timeout: Duration,
    pub use_parallel: bool,

    /// Per-provider options keyed by provider name.
    pub provider_params: BTreeMap<String, ProviderOptions>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            extract_text: true,
            extract_tables: true,
            extract_images: false,
            preserve_layout: true,
            table_detection_strategy: TableDetectionStrategy::Auto,
            table_accuracy_threshold: 0.8,
            merge_similar_tables: false,
            min_text_length: 50,
            min_table_rows: 2,
            timeout: Duration::from_secs(300),
            use_parallel: false,
            provider_params: BTreeMap::new(),
        }
    }
}

impl ExtractionConfig {
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder::new()
    }

    /// Check the range invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.table_accuracy_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::ThresholdOutOfRange {
                field: "table_accuracy_threshold",
                value: t,
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Options for `provider`, if any were configured.
    pub fn provider_options(&self, provider: &str) -> Option<&ProviderOptions> {
        self.provider_params.get(provider)
    }

    pub fn param(&self, provider: &str, key: &str) -> Option<&Value> {
        self.provider_options(provider)?.get(key)
    }

    pub fn param_f64(&self, provider: &str, key: &str) -> Option<f64> {
        self.param(provider, key)?.as_f64()
    }

    pub fn param_u64(&self, provider: &str, key: &str) -> Option<u64> {
        self.param(provider, key)?.as_u64()
    }

    pub fn param_bool(&self, provider: &str, key: &str) -> Option<bool> {
        self.param(provider, key)?.as_bool()
    }

    pub fn param_str(&self, provider: &str, key: &str) -> Option<&str> {
        self.param(provider, key)?.as_str()
    }
}

/// Builder for [`ExtractionConfig`]. Range checks run in
/// [`build()`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract_text(mut self, on: bool) -> Self {
        self.config.extract_text = on;
        self
    }

    pub fn extract_tables(mut self, on: bool) -> Self {
        self.config.extract_tables = on;
        self
    }

    pub fn extract_images(mut self, on: bool) -> Self {
        self.config.extract_images = on;
        self
    }

    pub fn preserve_layout(mut self, on: bool) -> Self {
        self.config.preserve_layout = on;
        self
    }

    pub fn table_detection_strategy(mut self, strategy: TableDetectionStrategy) -> Self {
        self.config.table_detection_strategy = strategy;
        self
    }

    pub fn table_accuracy_threshold(mut self, threshold: f64) -> Self {
        self.config.table_accuracy_threshold = threshold;
        self
    }

    pub fn merge_similar_tables(mut self, on: bool) -> Self {
        self.config.merge_similar_tables = on;
        self
    }

    pub fn min_text_length(mut self, n: usize) -> Self {
        self.config.min_text_length = n;
        self
    }

    pub fn min_table_rows(mut self, n: usize) -> Self {
        self.config.min_table_rows = n;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn use_parallel(mut self, on: bool) -> Self {
        self.config.use_parallel = on;
        self
    }

    /// Replace the options for one provider.
    pub fn provider_params(mut self, provider: impl Into<String>, options: ProviderOptions) -> Self {
        self.config.provider_params.insert(provider.into(), options);
        self
    }

    /// Set a single option for one provider, keeping its other options.
    pub fn provider_param(
        mut self,
        provider: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.config
            .provider_params
            .entry(provider.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<ExtractionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Provenance attached to an extracted table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableAttrs {
    /// 1-based source page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<String>,
    /// Position among the provider's tables, from 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<usize>,
    /// Fraction of filled grid cells, when the detector reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// A rectangular grid with named columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    pub attrs: TableAttrs,
}

impl Table {
    /// Build a table; every row is padded or truncated to the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self {
            columns,
            rows,
            attrs: TableAttrs::default(),
        }
    }

    /// First row becomes the header. `None` for an empty grid.
    pub fn from_header_grid(mut grid: Vec<Vec<String>>) -> Option<Self> {
        if grid.is_empty() {
            return None;
        }
        let header = grid.remove(0);
        let width = grid.iter().map(Vec::len).max().unwrap_or(0).max(header.len());
        let mut columns = header;
        let mut n = columns.len();
        while columns.len() < width {
            columns.push(n.to_string());
            n += 1;
        }
        Some(Self::new(columns, grid))
    }

    /// Every row is data; columns are named by position ("0", "1", ...).
    pub fn from_positional_grid(grid: Vec<Vec<String>>) -> Self {
        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        let columns = (0..width).map(|i| i.to_string()).collect();
        Self::new(columns, grid)
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.attrs.page = Some(page);
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.attrs.extraction_method = Some(method.into());
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.attrs.accuracy = Some(accuracy);
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of data rows (header excluded).
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    pub fn to_markdown(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count().max(3)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let line = |cells: &[String]| -> String {
            let mut out = String::from("|");
            for (cell, width) in cells.iter().zip(&widths) {
                out.push_str(&format!(" {cell:width$} |"));
            }
            out
        };

        let mut md = line(&self.columns);
        md.push('\n');
        md.push('|');
        for width in &widths {
            md.push_str(&format!(" {} |", "-".repeat(*width)));
        }
        for row in &self.rows {
            md.push('\n');
            md.push_str(&line(row));
        }
        md
    }
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Everything one extraction attempt produced.
///
/// `quality_score` and `quality_level` are private: they can only be set
/// together through [`set_quality`](Self::set_quality), which keeps the
/// level the bucketing of the score.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub tables: Vec<Table>,
    pub metadata: BTreeMap<String, Value>,
    quality_score: f64,
    quality_level: ExtractionQuality,
    #[serde(rename = "extraction_time_secs", serialize_with = "serialize_secs")]
    pub extraction_time: Duration,
    pub provider_used: String,
    pub page_count: usize,
    /// Non-fatal errors collected along the way.
    pub errors: Vec<String>,
}

impl ExtractionResult {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            tables: Vec::new(),
            metadata: BTreeMap::new(),
            quality_score: 0.0,
            quality_level: ExtractionQuality::Failed,
            extraction_time: Duration::ZERO,
            provider_used: provider.into(),
            page_count: 0,
            errors: Vec::new(),
        }
    }

    /// An attempt that produced nothing, with a single error entry.
    pub fn failed(provider: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::new(provider);
        result.errors.push(error.into());
        result
    }

    pub fn quality_score(&self) -> f64 {
        self.quality_score
    }

    pub fn quality_level(&self) -> ExtractionQuality {
        self.quality_level
    }

    /// Clamp `score` into [0, 1] and bucket it with `thresholds`.
    pub fn set_quality(&mut self, score: f64, thresholds: QualityThresholds) {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        self.quality_score = score;
        self.quality_level = thresholds.level(score);
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Length of the extracted text in characters.
    pub fn text_chars(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_failed(&self) -> bool {
        self.quality_level == ExtractionQuality::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_type_parse_round_trip() {
        for t in DocumentType::ALL {
            assert_eq!(t.as_str().parse::<DocumentType>().unwrap(), t);
        }
        assert_eq!(
            "Financial-Report".parse::<DocumentType>().unwrap(),
            DocumentType::FinancialReport
        );
        assert!("brochure".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_quality_ordering() {
        assert!(ExtractionQuality::Failed < ExtractionQuality::Low);
        assert!(ExtractionQuality::Low < ExtractionQuality::Medium);
        assert!(ExtractionQuality::Medium < ExtractionQuality::High);
        assert_eq!("HIGH".parse::<ExtractionQuality>().unwrap(), ExtractionQuality::High);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_text_length, 50);
        assert_eq!(config.min_table_rows, 2);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert!((config.table_accuracy_threshold - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_builder_rejects_out_of_range_threshold() {
        let err = ExtractionConfig::builder()
            .table_accuracy_threshold(1.5)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ThresholdOutOfRange { .. }));

        assert!(
            ExtractionConfig::builder()
                .table_accuracy_threshold(-0.1)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let err = ExtractionConfig::builder()
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout));
    }

    #[test]
    fn test_provider_params_round_trip() {
        let mut options = ProviderOptions::new();
        options.insert("vertical_strategy".into(), json!("lines"));
        options.insert("tolerance".into(), json!(3));
        options.insert("nested".into(), json!({"deep": [1, 2, {"x": null}]}));
        options.insert("unknown_key_nobody_reads".into(), json!(true));

        let config = ExtractionConfig::builder()
            .provider_params("X", options.clone())
            .build()
            .unwrap();

        assert_eq!(config.provider_options("X"), Some(&options));
        assert_eq!(config.param_str("X", "vertical_strategy"), Some("lines"));
        assert_eq!(config.param_u64("X", "tolerance"), Some(3));
        assert_eq!(config.param_bool("X", "unknown_key_nobody_reads"), Some(true));
        assert!(config.provider_options("Y").is_none());
    }

    #[test]
    fn test_provider_param_merges_keys() {
        let config = ExtractionConfig::builder()
            .provider_param("tables", "row_tolerance", 4.0)
            .provider_param("tables", "col_tolerance", 12.0)
            .build()
            .unwrap();
        assert_eq!(config.param_f64("tables", "row_tolerance"), Some(4.0));
        assert_eq!(config.param_f64("tables", "col_tolerance"), Some(12.0));
    }

    #[test]
    fn test_table_rows_are_rectangular() {
        let table = Table::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![vec!["1".into()], vec!["1".into(), "2".into(), "3".into(), "4".into()]],
        );
        assert!(table.rows().iter().all(|r| r.len() == 3));
        assert_eq!(table.cell(0, 2), Some(""));
        assert_eq!(table.cell(1, 2), Some("3"));
    }

    #[test]
    fn test_table_from_header_grid() {
        let grid = vec![
            vec!["Name".to_string(), "Amount".to_string()],
            vec!["Rent".to_string(), "1200".to_string(), "extra".to_string()],
        ];
        let table = Table::from_header_grid(grid).unwrap();
        assert_eq!(table.columns(), &["Name", "Amount", "2"]);
        assert_eq!(table.num_rows(), 1);
        assert!(Table::from_header_grid(vec![]).is_none());
    }

    #[test]
    fn test_table_from_positional_grid() {
        let table = Table::from_positional_grid(vec![
            vec!["a".into(), "b".into()],
            vec!["c".into(), "d".into()],
        ]);
        assert_eq!(table.columns(), &["0", "1"]);
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn test_table_markdown() {
        let table = Table::new(
            vec!["Item".into(), "Qty".into()],
            vec![vec!["Bolt".into(), "12".into()]],
        );
        let md = table.to_markdown();
        assert!(md.starts_with("| Item | Qty |"));
        assert!(md.contains("| ---"));
        assert!(md.contains("| Bolt | 12  |"));
    }

    #[test]
    fn test_set_quality_clamps_and_buckets() {
        let thresholds = QualityThresholds::new(0.7, 0.4);
        let mut result = ExtractionResult::new("x");
        assert!(result.is_failed());

        result.set_quality(3.0, thresholds);
        assert_eq!(result.quality_score(), 1.0);
        assert_eq!(result.quality_level(), ExtractionQuality::High);

        result.set_quality(-1.0, thresholds);
        assert_eq!(result.quality_score(), 0.0);
        assert_eq!(result.quality_level(), ExtractionQuality::Failed);

        result.set_quality(f64::NAN, thresholds);
        assert_eq!(result.quality_score(), 0.0);
    }

    #[test]
    fn test_failed_result_keeps_error() {
        let result = ExtractionResult::failed("mupdf", "boom");
        assert_eq!(result.provider_used, "mupdf");
        assert_eq!(result.errors, vec!["boom".to_string()]);
        assert_eq!(result.quality_level(), ExtractionQuality::Failed);
    }

    #[test]
    fn test_result_serializes_quality() {
        let mut result = ExtractionResult::new("x");
        result.set_quality(0.5, QualityThresholds::new(0.7, 0.4));
        result.extraction_time = Duration::from_millis(1500);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["quality_level"], "medium");
        assert_eq!(json["quality_score"], 0.5);
        assert_eq!(json["extraction_time_secs"], 1.5);
    }
}
