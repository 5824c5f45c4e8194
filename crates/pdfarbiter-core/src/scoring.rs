//! Per-provider quality heuristics.
//!
//! Each function accumulates weighted evidence from a finished
//! [`ExtractionResult`] and clamps the sum to [0, 1]. They read nothing but
//! the result (and an evidence threshold), so a provider's
//! `estimate_quality` is a pure function.

use crate::model::{ExtractionResult, Table};

/// Text must be strictly longer than this many characters to count as
/// evidence for the layout and speed heuristics.
pub const TEXT_EVIDENCE_MIN_CHARS: usize = 50;

/// More than 2 columns and more than 2 rows.
fn is_well_structured(table: &Table) -> bool {
    table.num_columns() > 2 && table.num_rows() > 2
}

/// More than 1 column and more than 1 row.
fn is_well_formed(table: &Table) -> bool {
    table.num_columns() > 1 && table.num_rows() > 1
}

/// Table presence dominates; text is incidental.
///
/// - any table: +0.6
/// - table count: +0.1 each, at most +0.3
/// - well-structured tables: +0.02 each, at most +0.1
/// - any text: +0.1
pub fn score_table_focused(result: &ExtractionResult) -> f64 {
    let mut score = 0.0;

    if !result.tables.is_empty() {
        score += 0.6;
        score += (result.tables.len() as f64 * 0.1).min(0.3);
        let well_structured = result.tables.iter().filter(|t| is_well_structured(t)).count();
        score += (well_structured as f64 * 0.02).min(0.1);
    }

    if !result.text.is_empty() {
        score += 0.1;
    }

    score.min(1.0)
}

/// Balanced text/table value with layout coherence as a differentiator.
///
/// - text longer than `min_text_chars`: +0.4, and +0.1 more when it has line
///   breaks but no more than one per ten characters
/// - any table: +0.3
/// - well-formed tables: +0.05 each, at most +0.2
pub fn score_layout(result: &ExtractionResult, min_text_chars: usize) -> f64 {
    let mut score = 0.0;

    let chars = result.text_chars();
    if chars > min_text_chars {
        score += 0.4;
        let newlines = result.text.matches('\n').count();
        if newlines > 0 && newlines as f64 <= chars as f64 * 0.1 {
            score += 0.1;
        }
    }

    if !result.tables.is_empty() {
        score += 0.3;
        let well_formed = result.tables.iter().filter(|t| is_well_formed(t)).count();
        score += (well_formed as f64 * 0.05).min(0.2);
    }

    score.min(1.0)
}

/// Coverage over precision.
///
/// - text longer than `min_text_chars`: +0.5
/// - any table: +0.3
/// - table count: +0.05 each, at most +0.2
pub fn score_speed(result: &ExtractionResult, min_text_chars: usize) -> f64 {
    let mut score = 0.0;

    if result.text_chars() > min_text_chars {
        score += 0.5;
    }

    if !result.tables.is_empty() {
        score += 0.3;
        score += (result.tables.len() as f64 * 0.05).min(0.2);
    }

    score.min(1.0)
}
