//! Name → provider mapping with construction-time availability probing.

use std::sync::Arc;

use crate::model::DocumentType;
use crate::provider::ExtractionProvider;
use crate::{ProviderInitError, RegistryError};

/// A provider whose probe failed; it was never registered.
#[derive(Debug, Clone)]
pub struct UnavailableProvider {
    pub name: String,
    pub error: ProviderInitError,
}

/// Registered providers in registration order, plus the ones whose backend
/// could not be brought up.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ExtractionProvider>>,
    unavailable: Vec<UnavailableProvider>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .field("unavailable", &self.unavailable)
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn ExtractionProvider>) -> Result<(), RegistryError> {
        let name = provider.provider_name();
        if self.get(name).is_some() {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        tracing::debug!(provider = name, "registered provider");
        self.providers.push(provider);
        Ok(())
    }

    /// Register the outcome of a provider probe. A failed probe is recorded
    /// as unavailable instead of being registered.
    pub fn register_probe<P>(&mut self, probe: Result<P, ProviderInitError>) -> Result<(), RegistryError>
    where
        P: ExtractionProvider + 'static,
    {
        match probe {
            Ok(provider) => self.register(Arc::new(provider)),
            Err(error) => {
                tracing::warn!(provider = error.provider(), error = %error, "provider unavailable");
                self.unavailable.push(UnavailableProvider {
                    name: error.provider().to_string(),
                    error,
                });
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExtractionProvider>> {
        self.providers
            .iter()
            .find(|p| p.provider_name() == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.provider_name()).collect()
    }

    pub fn providers(&self) -> &[Arc<dyn ExtractionProvider>] {
        &self.providers
    }

    pub fn unavailable(&self) -> &[UnavailableProvider] {
        &self.unavailable
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Providers with declared affinity for `doc_type`, in registration
    /// order. Falls back to every provider when none is affine.
    pub fn shortlist(&self, doc_type: DocumentType) -> Vec<Arc<dyn ExtractionProvider>> {
        let affine: Vec<_> = self
            .providers
            .iter()
            .filter(|p| p.supports_document_type(doc_type))
            .cloned()
            .collect();
        if affine.is_empty() {
            tracing::debug!(doc_type = %doc_type, "no affine provider, using all");
            return self.providers.clone();
        }
        affine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProvider, MockResponse};

    fn mock(name: &'static str, types: &[DocumentType]) -> MockProvider {
        MockProvider::new(name, MockResponse::Empty).with_affinity(types)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(mock("a", &[]))).unwrap();
        registry.register(Arc::new(mock("b", &[]))).unwrap();
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(registry.get("b").is_some());
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(mock("a", &[]))).unwrap();
        let err = registry.register(Arc::new(mock("a", &[]))).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_failed_probe_is_recorded_not_registered() {
        let mut registry = ProviderRegistry::new();
        let probe: Result<MockProvider, _> = Err(ProviderInitError::LibraryUnavailable {
            provider: "pdfium".into(),
            reason: "libpdfium.so not found".into(),
        });
        registry.register_probe(probe).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.unavailable().len(), 1);
        assert_eq!(registry.unavailable()[0].name, "pdfium");

        registry.register_probe(Ok(mock("mupdf", &[]))).unwrap();
        assert_eq!(registry.names(), vec!["mupdf"]);
    }

    #[test]
    fn test_shortlist_by_affinity() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(mock(
                "tables",
                &[DocumentType::FinancialReport, DocumentType::Invoice],
            )))
            .unwrap();
        registry
            .register(Arc::new(mock("layout", &[DocumentType::ScientificPaper])))
            .unwrap();
        registry
            .register(Arc::new(mock("speed", &DocumentType::ALL)))
            .unwrap();

        let names = |doc_type| {
            registry
                .shortlist(doc_type)
                .iter()
                .map(|p| p.provider_name().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(DocumentType::Invoice), vec!["tables", "speed"]);
        assert_eq!(names(DocumentType::ScientificPaper), vec!["layout", "speed"]);
        assert_eq!(names(DocumentType::Scanned), vec!["speed"]);
    }

    #[test]
    fn test_shortlist_falls_back_to_all() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(mock("a", &[DocumentType::Form]))).unwrap();
        registry.register(Arc::new(mock("b", &[DocumentType::Invoice]))).unwrap();
        assert_eq!(registry.shortlist(DocumentType::Scanned).len(), 2);
    }

    #[test]
    fn test_affinity_is_static() {
        let provider = mock("a", &[DocumentType::Form]);
        for _ in 0..3 {
            assert!(provider.supports_document_type(DocumentType::Form));
            assert!(!provider.supports_document_type(DocumentType::Invoice));
        }
    }
}
