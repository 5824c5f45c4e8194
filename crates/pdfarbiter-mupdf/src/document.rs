//! Page walking shared by both MuPDF providers.

use std::collections::BTreeMap;
use std::path::Path;

use mupdf::{Document, MetadataName, Page, TextPageFlags};
use serde_json::Value;

use pdfarbiter_core::PageLayout;
use pdfarbiter_core::layout::{Glyph, cells_from_glyphs};

use crate::MupdfError;

/// A gap wider than this many glyph heights splits a line into cells.
const CELL_GAP_FACTOR: f32 = 1.0;

const METADATA_FIELDS: [(MetadataName, &str); 9] = [
    (MetadataName::Format, "format"),
    (MetadataName::Title, "title"),
    (MetadataName::Author, "author"),
    (MetadataName::Subject, "subject"),
    (MetadataName::Keywords, "keywords"),
    (MetadataName::Creator, "creator"),
    (MetadataName::Producer, "producer"),
    (MetadataName::CreationDate, "creation_date"),
    (MetadataName::ModDate, "mod_date"),
];

pub(crate) fn open(path: &Path) -> Result<Document, MupdfError> {
    let path_str = path.to_str().ok_or(MupdfError::PathEncoding)?;
    Ok(Document::open(path_str)?)
}

pub(crate) fn page_count(document: &Document) -> Result<usize, MupdfError> {
    Ok(document.page_count()?.max(0) as usize)
}

/// One page read through a single MuPDF text page.
pub(crate) struct PageScan {
    pub layout: PageLayout,
    /// Block/line text in MuPDF's reading order.
    pub text: String,
}

pub(crate) fn scan_page(page: &Page, page_number: usize) -> Result<PageScan, MupdfError> {
    let bounds = page.bounds()?;
    let text_page = page.to_text_page(TextPageFlags::empty())?;

    let mut layout = PageLayout::new(page_number, bounds.x1 - bounds.x0, bounds.y1 - bounds.y0);
    let mut text = String::new();

    for block in text_page.blocks() {
        for line in block.lines() {
            let mut glyphs = Vec::new();
            for c in line.chars() {
                let ch = c.char().unwrap_or('\u{FFFD}');
                text.push(ch);

                let q = c.quad();
                glyphs.push(Glyph {
                    ch,
                    x0: q.ul.x.min(q.ll.x) - bounds.x0,
                    y0: q.ul.y.min(q.ur.y) - bounds.y0,
                    x1: q.ur.x.max(q.lr.x) - bounds.x0,
                    y1: q.ll.y.max(q.lr.y) - bounds.y0,
                });
            }
            text.push('\n');
            layout.cells.extend(cells_from_glyphs(&glyphs, CELL_GAP_FACTOR));
        }
    }

    Ok(PageScan { layout, text })
}

/// Scan every page, stopping at the first failure.
pub(crate) fn scan_all(document: &Document) -> Result<Vec<PageScan>, MupdfError> {
    let mut scans = Vec::new();
    for (index, page) in document.pages()?.enumerate() {
        scans.push(scan_page(&page?, index + 1)?);
    }
    Ok(scans)
}

/// Info dictionary entries, empty values omitted.
pub(crate) fn metadata(document: &Document) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for (name, key) in METADATA_FIELDS {
        match document.metadata(name) {
            Ok(value) if !value.trim().is_empty() => {
                out.insert(key.to_string(), Value::String(value));
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(field = key, error = %e, "metadata lookup failed"),
        }
    }
    out
}
