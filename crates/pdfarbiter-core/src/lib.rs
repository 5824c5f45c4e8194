use thiserror::Error;

pub mod config_file;
pub mod fixture;
pub mod layout;
pub mod mock;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod quality;
pub mod registry;
pub mod scoring;

// Re-export for convenience
pub use layout::{DetectedTable, PageLayout, TableDetector, TableDetectorConfig, TextCell};
pub use model::{
    DocumentType, ExtractionConfig, ExtractionConfigBuilder, ExtractionQuality, ExtractionResult,
    ProviderOptions, Table, TableAttrs, TableDetectionStrategy,
};
pub use orchestrator::{Arbitration, Selection, arbitrate};
pub use provider::{ExtractionProvider, finish};
pub use quality::{LAYOUT_THRESHOLDS, QualityThresholds, SPEED_THRESHOLDS, TABLE_FOCUSED_THRESHOLDS};
pub use registry::{ProviderRegistry, UnavailableProvider};
pub use scoring::{TEXT_EVIDENCE_MIN_CHARS, score_layout, score_speed, score_table_focused};

/// A backend could not be brought up. Raised once, before any document is
/// touched, so the provider can be left out of the registry for good.
#[derive(Error, Debug, Clone)]
pub enum ProviderInitError {
    #[error("{provider}: backend library unavailable: {reason}")]
    LibraryUnavailable { provider: String, reason: String },
    #[error("{provider}: capability probe failed: {reason}")]
    Probe { provider: String, reason: String },
}

impl ProviderInitError {
    /// Name of the provider that failed to initialize.
    pub fn provider(&self) -> &str {
        match self {
            ProviderInitError::LibraryUnavailable { provider, .. }
            | ProviderInitError::Probe { provider, .. } => provider,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { field: &'static str, value: f64 },
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),
    #[error("unknown quality level: {0}")]
    UnknownQualityLevel(String),
    #[error("unknown table detection strategy: {0}")]
    UnknownTableStrategy(String),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("provider {0:?} is already registered")]
    Duplicate(String),
}
