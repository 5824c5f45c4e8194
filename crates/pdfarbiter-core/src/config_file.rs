use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::model::{
    DocumentType, ExtractionConfig, ExtractionConfigBuilder, ExtractionQuality, ProviderOptions,
};
use crate::orchestrator::Selection;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub extraction: Option<ExtractionSection>,
    /// `[providers.<name>]` tables, passed through verbatim.
    pub providers: Option<BTreeMap<String, ProviderOptions>>,
    pub selection: Option<SelectionSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSection {
    pub extract_text: Option<bool>,
    pub extract_tables: Option<bool>,
    pub extract_images: Option<bool>,
    pub preserve_layout: Option<bool>,
    pub table_detection_strategy: Option<String>,
    pub table_accuracy_threshold: Option<f64>,
    pub merge_similar_tables: Option<bool>,
    pub min_text_length: Option<usize>,
    pub min_table_rows: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub use_parallel: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionSection {
    pub providers: Option<Vec<String>>,
    pub document_type: Option<String>,
    pub stop_at: Option<String>,
}

impl ConfigFile {
    /// Build a validated [`ExtractionConfig`], unset fields taking defaults.
    pub fn to_extraction_config(&self) -> Result<ExtractionConfig, ConfigError> {
        let mut builder = ExtractionConfigBuilder::new();

        if let Some(e) = &self.extraction {
            if let Some(v) = e.extract_text {
                builder = builder.extract_text(v);
            }
            if let Some(v) = e.extract_tables {
                builder = builder.extract_tables(v);
            }
            if let Some(v) = e.extract_images {
                builder = builder.extract_images(v);
            }
            if let Some(v) = e.preserve_layout {
                builder = builder.preserve_layout(v);
            }
            if let Some(v) = &e.table_detection_strategy {
                builder = builder.table_detection_strategy(v.parse()?);
            }
            if let Some(v) = e.table_accuracy_threshold {
                builder = builder.table_accuracy_threshold(v);
            }
            if let Some(v) = e.merge_similar_tables {
                builder = builder.merge_similar_tables(v);
            }
            if let Some(v) = e.min_text_length {
                builder = builder.min_text_length(v);
            }
            if let Some(v) = e.min_table_rows {
                builder = builder.min_table_rows(v);
            }
            if let Some(v) = e.timeout_secs {
                builder = builder.timeout(Duration::from_secs(v));
            }
            if let Some(v) = e.use_parallel {
                builder = builder.use_parallel(v);
            }
        }

        for (name, options) in self.providers.iter().flatten() {
            builder = builder.provider_params(name.clone(), options.clone());
        }

        builder.build()
    }

    /// The configured provider selection and document type, if any.
    pub fn to_selection(&self) -> Result<(Selection, Option<DocumentType>), ConfigError> {
        let Some(s) = &self.selection else {
            return Ok((Selection::default(), None));
        };
        let doc_type = s
            .document_type
            .as_deref()
            .map(str::parse::<DocumentType>)
            .transpose()?;
        let stop_at = s
            .stop_at
            .as_deref()
            .map(str::parse::<ExtractionQuality>)
            .transpose()?;
        let selection = Selection {
            only: s.providers.clone().filter(|p| !p.is_empty()),
            stop_at,
        };
        Ok((selection, doc_type))
    }
}

/// Platform config directory path: `<config_dir>/pdfarbiter/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pdfarbiter").join("config.toml"))
}

/// Load config by cascading CWD `.pdfarbiter.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".pdfarbiter.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    if !path.exists() {
        return None;
    }
    match load_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
            None
        }
    }
}

/// Load a config file the user asked for explicitly; errors are reported.
pub fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge two configs: `overlay` values take precedence over `base`.
/// Provider option tables are merged key by key.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let extraction = match (base.extraction, overlay.extraction) {
        (None, None) => None,
        (b, o) => {
            let b = b.unwrap_or_default();
            let o = o.unwrap_or_default();
            Some(ExtractionSection {
                extract_text: o.extract_text.or(b.extract_text),
                extract_tables: o.extract_tables.or(b.extract_tables),
                extract_images: o.extract_images.or(b.extract_images),
                preserve_layout: o.preserve_layout.or(b.preserve_layout),
                table_detection_strategy: o.table_detection_strategy.or(b.table_detection_strategy),
                table_accuracy_threshold: o.table_accuracy_threshold.or(b.table_accuracy_threshold),
                merge_similar_tables: o.merge_similar_tables.or(b.merge_similar_tables),
                min_text_length: o.min_text_length.or(b.min_text_length),
                min_table_rows: o.min_table_rows.or(b.min_table_rows),
                timeout_secs: o.timeout_secs.or(b.timeout_secs),
                use_parallel: o.use_parallel.or(b.use_parallel),
            })
        }
    };

    let providers = match (base.providers, overlay.providers) {
        (None, None) => None,
        (b, o) => {
            let mut merged = b.unwrap_or_default();
            for (name, options) in o.unwrap_or_default() {
                merged.entry(name).or_default().extend(options);
            }
            Some(merged)
        }
    };

    let selection = match (base.selection, overlay.selection) {
        (None, None) => None,
        (b, o) => {
            let b = b.unwrap_or_default();
            let o = o.unwrap_or_default();
            Some(SelectionSection {
                providers: o.providers.or(b.providers),
                document_type: o.document_type.or(b.document_type),
                stop_at: o.stop_at.or(b.stop_at),
            })
        }
    };

    ConfigFile {
        extraction,
        providers,
        selection,
    }
}

/// Save the config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or_else(|| {
        ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "could not determine config directory",
        ))
    })?;
    save_to_path(config, &path)?;
    Ok(path)
}

pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableDetectionStrategy;
    use serde_json::json;

    const SAMPLE: &str = r#"
[extraction]
preserve_layout = false
table_detection_strategy = "lines"
table_accuracy_threshold = 0.6
timeout_secs = 30
use_parallel = true

[providers.pdfium]
library_path = "/opt/pdfium/lib"
row_tolerance = 4.5

[providers.tables.nested]
flavors = ["lattice", "stream"]

[selection]
providers = ["tables", "mupdf"]
document_type = "invoice"
stop_at = "high"
"#;

    #[test]
    fn parses_sample_into_extraction_config() {
        let file: ConfigFile = toml::from_str(SAMPLE).unwrap();
        let config = file.to_extraction_config().unwrap();
        assert!(!config.preserve_layout);
        assert!(config.extract_text);
        assert_eq!(config.table_detection_strategy, TableDetectionStrategy::Lines);
        assert!((config.table_accuracy_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.use_parallel);
        assert_eq!(config.param_str("pdfium", "library_path"), Some("/opt/pdfium/lib"));
        assert_eq!(config.param_f64("pdfium", "row_tolerance"), Some(4.5));
        assert_eq!(
            config.param("tables", "nested"),
            Some(&json!({"flavors": ["lattice", "stream"]}))
        );
    }

    #[test]
    fn parses_selection() {
        let file: ConfigFile = toml::from_str(SAMPLE).unwrap();
        let (selection, doc_type) = file.to_selection().unwrap();
        assert_eq!(doc_type, Some(DocumentType::Invoice));
        assert_eq!(selection.stop_at, Some(ExtractionQuality::High));
        assert_eq!(
            selection.only,
            Some(vec!["tables".to_string(), "mupdf".to_string()])
        );
    }

    #[test]
    fn empty_file_gives_defaults() {
        let file: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(file.to_extraction_config().unwrap(), ExtractionConfig::default());
        let (selection, doc_type) = file.to_selection().unwrap();
        assert!(selection.only.is_none());
        assert!(doc_type.is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let file: ConfigFile =
            toml::from_str("[extraction]\ntable_accuracy_threshold = 2.0\n").unwrap();
        assert!(matches!(
            file.to_extraction_config(),
            Err(ConfigError::ThresholdOutOfRange { .. })
        ));

        let file: ConfigFile = toml::from_str("[extraction]\ntimeout_secs = 0\n").unwrap();
        assert!(matches!(file.to_extraction_config(), Err(ConfigError::ZeroTimeout)));

        let file: ConfigFile = toml::from_str("[selection]\ndocument_type = \"poster\"\n").unwrap();
        assert!(file.to_selection().is_err());
    }

    #[test]
    fn provider_params_round_trip_toml() {
        let mut options = ProviderOptions::new();
        options.insert("vertical_strategy".into(), json!("lines"));
        options.insert("intersection_tolerance".into(), json!(3));
        options.insert("custom".into(), json!({"a": [1, 2], "b": {"c": true}}));
        let config = ConfigFile {
            providers: Some(BTreeMap::from([("X".to_string(), options.clone())])),
            ..Default::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        let extraction = parsed.to_extraction_config().unwrap();
        assert_eq!(extraction.provider_options("X"), Some(&options));
    }

    #[test]
    fn merge_overlay_wins() {
        let base: ConfigFile = toml::from_str(
            "[extraction]\ntimeout_secs = 10\nuse_parallel = true\n[providers.mupdf]\na = 1\nb = 2\n",
        )
        .unwrap();
        let overlay: ConfigFile =
            toml::from_str("[extraction]\ntimeout_secs = 20\n[providers.mupdf]\nb = 3\n").unwrap();
        let merged = merge(base, overlay);

        let extraction = merged.extraction.as_ref().unwrap();
        assert_eq!(extraction.timeout_secs, Some(20));
        assert_eq!(extraction.use_parallel, Some(true));

        let mupdf = &merged.providers.as_ref().unwrap()["mupdf"];
        assert_eq!(mupdf["a"], json!(1));
        assert_eq!(mupdf["b"], json!(3));
    }

    #[test]
    fn merge_of_empty_configs_is_empty() {
        assert_eq!(
            merge(ConfigFile::default(), ConfigFile::default()),
            ConfigFile::default()
        );
    }

    #[test]
    fn load_and_save_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let file: ConfigFile = toml::from_str(SAMPLE).unwrap();
        save_to_path(&file, &path).unwrap();

        assert_eq!(load_file(&path).unwrap(), file);
        assert_eq!(load_from_path(&path), Some(file));
        assert!(load_from_path(&dir.path().join("missing.toml")).is_none());
    }

    #[test]
    fn unparseable_file_is_ignored_by_cascade_but_reported_explicitly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[extraction\n").unwrap();
        assert!(load_from_path(&path).is_none());
        assert!(matches!(load_file(&path), Err(ConfigError::Parse(_))));
    }
}
