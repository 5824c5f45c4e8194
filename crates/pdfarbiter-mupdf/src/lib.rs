//! MuPDF-backed providers.
//!
//! This crate is the AGPL island: it isolates the mupdf dependency so that
//! code paths which never touch MuPDF do not transitively depend on it.
//!
//! - [`MupdfProvider`] (`"mupdf"`): speed-oriented, text plus stream tables
//! - [`TableProvider`] (`"tables"`): table-oriented, lattice and stream passes

use mupdf::Document;
use thiserror::Error;

use pdfarbiter_core::ProviderInitError;
use pdfarbiter_core::fixture::text_pdf;

mod document;
mod speed;
mod tables;

pub use speed::MupdfProvider;
pub use tables::TableProvider;

#[derive(Error, Debug)]
pub enum MupdfError {
    #[error("invalid path encoding")]
    PathEncoding,
    #[error(transparent)]
    Mupdf(#[from] mupdf::Error),
}

/// Open a one-page PDF from memory to prove MuPDF is linked and working.
pub(crate) fn probe(provider: &str) -> Result<(), ProviderInitError> {
    let probe_err = |reason: String| ProviderInitError::Probe {
        provider: provider.to_string(),
        reason,
    };

    let bytes = text_pdf(&[&[]]);
    let document =
        Document::from_bytes(&bytes, "application/pdf").map_err(|e| probe_err(e.to_string()))?;
    let pages = document.page_count().map_err(|e| probe_err(e.to_string()))?;
    if pages != 1 {
        return Err(probe_err(format!("probe document reported {pages} pages")));
    }
    tracing::debug!(provider, "mupdf probe succeeded");
    Ok(())
}
