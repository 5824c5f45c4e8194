use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::model::{DocumentType, ExtractionConfig, ExtractionQuality, ExtractionResult};
use crate::provider::ExtractionProvider;
use crate::registry::ProviderRegistry;

/// Which providers to try and when to stop.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Run exactly these providers, in this order, regardless of affinity.
    pub only: Option<Vec<String>>,
    /// Sequential runs stop once a result reaches this level.
    pub stop_at: Option<ExtractionQuality>,
}

/// Outcome of running several providers against one document.
#[derive(Debug, Clone)]
pub struct Arbitration {
    pub document_type: Option<DocumentType>,
    /// Provider names in the order they were started.
    pub attempted: Vec<String>,
    /// Results, best score first. Ties keep the attempt order.
    pub ranked: Vec<ExtractionResult>,
}

impl Arbitration {
    /// The top-ranked result, unless even that one failed.
    pub fn best(&self) -> Option<&ExtractionResult> {
        self.ranked.first().filter(|r| !r.is_failed())
    }

    pub fn into_best(self) -> Option<ExtractionResult> {
        self.ranked.into_iter().next().filter(|r| !r.is_failed())
    }

    pub fn result_for(&self, provider: &str) -> Option<&ExtractionResult> {
        self.ranked.iter().find(|r| r.provider_used == provider)
    }
}

enum Candidate {
    Provider(Arc<dyn ExtractionProvider>),
    Missing(String),
}

impl Candidate {
    fn name(&self) -> &str {
        match self {
            Candidate::Provider(p) => p.provider_name(),
            Candidate::Missing(name) => name,
        }
    }
}

fn candidates(
    registry: &ProviderRegistry,
    doc_type: Option<DocumentType>,
    selection: &Selection,
) -> Vec<Candidate> {
    if let Some(only) = &selection.only {
        return only
            .iter()
            .map(|name| match registry.get(name) {
                Some(p) => Candidate::Provider(p),
                None => Candidate::Missing(name.clone()),
            })
            .collect();
    }
    let providers = match doc_type {
        Some(t) => registry.shortlist(t),
        None => registry.providers().to_vec(),
    };
    providers.into_iter().map(Candidate::Provider).collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one provider on the blocking pool, bounded by `config.timeout`.
/// Every outcome, including timeout and panic, is a result value.
async fn run_one(
    candidate: Candidate,
    path: Arc<PathBuf>,
    config: Arc<ExtractionConfig>,
) -> ExtractionResult {
    let provider = match candidate {
        Candidate::Provider(p) => p,
        Candidate::Missing(name) => {
            tracing::warn!(provider = %name, "requested provider is not registered");
            return ExtractionResult::failed(name, "provider is not registered");
        }
    };

    let name = provider.provider_name().to_string();
    let thresholds = provider.quality_thresholds();
    let timeout = config.timeout;
    tracing::debug!(provider = %name, path = %path.display(), "starting extraction");

    let handle = tokio::task::spawn_blocking(move || provider.extract(&path, &config));
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            let message = if join_err.is_panic() {
                panic_message(join_err.into_panic())
            } else {
                join_err.to_string()
            };
            tracing::warn!(provider = %name, error = %message, "provider panicked");
            let mut result =
                ExtractionResult::failed(name, format!("provider panicked: {message}"));
            result.set_quality(0.0, thresholds);
            result
        }
        Err(_) => {
            // The blocking call cannot be interrupted; its result is discarded.
            tracing::warn!(provider = %name, timeout_secs = timeout.as_secs_f64(), "extraction timed out");
            let mut result = ExtractionResult::failed(
                name,
                format!("extraction timed out after {:.1}s", timeout.as_secs_f64()),
            );
            result.extraction_time = timeout;
            result.set_quality(0.0, thresholds);
            result
        }
    }
}

/// Run the selected providers against `path` and rank their results.
///
/// Candidates are the registry's shortlist for `doc_type` (every provider
/// when no type is given) unless `selection.only` names them explicitly.
/// With `config.use_parallel` all candidates run concurrently and the call
/// returns once each has finished or timed out; otherwise they run one at a
/// time and `selection.stop_at` may end the run early.
pub async fn arbitrate(
    registry: &ProviderRegistry,
    path: &Path,
    doc_type: Option<DocumentType>,
    config: &ExtractionConfig,
    selection: &Selection,
) -> Arbitration {
    let candidates = candidates(registry, doc_type, selection);
    let path = Arc::new(path.to_path_buf());
    let config = Arc::new(config.clone());

    let mut attempted = Vec::with_capacity(candidates.len());
    let mut results: Vec<(usize, ExtractionResult)> = Vec::with_capacity(candidates.len());

    if config.use_parallel {
        let mut join_set = tokio::task::JoinSet::new();
        for (index, candidate) in candidates.into_iter().enumerate() {
            attempted.push(candidate.name().to_string());
            let path = Arc::clone(&path);
            let config = Arc::clone(&config);
            join_set.spawn(async move { (index, run_one(candidate, path, config).await) });
        }
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => tracing::warn!(error = %e, "extraction task failed to join"),
            }
        }
    } else {
        for (index, candidate) in candidates.into_iter().enumerate() {
            attempted.push(candidate.name().to_string());
            let result = run_one(candidate, Arc::clone(&path), Arc::clone(&config)).await;
            let done = selection
                .stop_at
                .is_some_and(|level| result.quality_level() >= level);
            results.push((index, result));
            if done {
                tracing::debug!(provider = %attempted[index], "quality target reached, stopping");
                break;
            }
        }
    }

    results.sort_by(|(ia, a), (ib, b)| {
        b.quality_score()
            .total_cmp(&a.quality_score())
            .then(ia.cmp(ib))
    });
    let ranked: Vec<ExtractionResult> = results.into_iter().map(|(_, r)| r).collect();

    match ranked.first() {
        Some(top) => tracing::info!(
            provider = %top.provider_used,
            score = top.quality_score(),
            level = %top.quality_level(),
            candidates = attempted.len(),
            "selected extraction"
        ),
        None => tracing::warn!(path = %path.display(), "no provider available"),
    }

    Arbitration {
        document_type: doc_type,
        attempted,
        ranked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockProvider, MockResponse};

    fn content(text_len: usize, tables: usize) -> MockResponse {
        MockResponse::Content {
            text: "t".repeat(text_len),
            tables,
        }
    }

    #[test]
    fn test_best_skips_failed_top() {
        let arbitration = Arbitration {
            document_type: None,
            attempted: vec!["a".into()],
            ranked: vec![ExtractionResult::failed("a", "nope")],
        };
        assert!(arbitration.best().is_none());
        assert!(arbitration.result_for("a").is_some());
        assert!(arbitration.into_best().is_none());
    }

    #[tokio::test]
    async fn test_ranks_by_score() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(MockProvider::new("weak", content(10, 1))))
            .unwrap();
        registry
            .register(Arc::new(MockProvider::new("strong", content(200, 4))))
            .unwrap();

        let arbitration = arbitrate(
            &registry,
            Path::new("doc.pdf"),
            None,
            &ExtractionConfig::default(),
            &Selection::default(),
        )
        .await;

        assert_eq!(arbitration.attempted, vec!["weak", "strong"]);
        assert_eq!(arbitration.best().unwrap().provider_used, "strong");
        assert_eq!(arbitration.ranked[1].provider_used, "weak");
    }

    #[tokio::test]
    async fn test_ties_keep_attempt_order() {
        let mut registry = ProviderRegistry::new();
        for name in ["first", "second"] {
            registry
                .register(Arc::new(MockProvider::new(name, content(100, 0))))
                .unwrap();
        }
        let arbitration = arbitrate(
            &registry,
            Path::new("doc.pdf"),
            None,
            &ExtractionConfig::default(),
            &Selection::default(),
        )
        .await;
        assert_eq!(arbitration.ranked[0].provider_used, "first");
    }

    #[tokio::test]
    async fn test_unknown_provider_yields_failed_result() {
        let registry = ProviderRegistry::new();
        let selection = Selection {
            only: Some(vec!["ghost".into()]),
            ..Selection::default()
        };
        let arbitration = arbitrate(
            &registry,
            Path::new("doc.pdf"),
            None,
            &ExtractionConfig::default(),
            &selection,
        )
        .await;
        assert_eq!(arbitration.ranked.len(), 1);
        assert!(arbitration.ranked[0].is_failed());
        assert_eq!(arbitration.ranked[0].errors, vec!["provider is not registered"]);
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic");
    }
}
