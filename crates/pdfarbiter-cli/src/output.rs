use std::io::Write;

use owo_colors::OwoColorize;
use serde::Serialize;

use pdfarbiter_core::{
    Arbitration, DocumentType, ExtractionQuality, ExtractionResult, ProviderRegistry,
};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn level_label(level: ExtractionQuality, color: ColorMode) -> String {
    let label = format!("{:<6}", level.as_str().to_uppercase());
    if !color.enabled() {
        return label;
    }
    match level {
        ExtractionQuality::High => label.green().to_string(),
        ExtractionQuality::Medium => label.yellow().to_string(),
        ExtractionQuality::Low => label.magenta().to_string(),
        ExtractionQuality::Failed => label.red().to_string(),
    }
}

/// Print the ranked results and the selected provider.
pub fn print_arbitration(
    w: &mut dyn Write,
    file_name: &str,
    arbitration: &Arbitration,
    color: ColorMode,
) -> std::io::Result<()> {
    let doc_type = arbitration
        .document_type
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unspecified".to_string());
    writeln!(w, "Extracted {} (document type: {})", file_name, doc_type)?;
    writeln!(w, "Tried: {}", arbitration.attempted.join(", "))?;
    writeln!(w)?;

    let name_width = arbitration
        .ranked
        .iter()
        .map(|r| r.provider_used.len())
        .max()
        .unwrap_or(0);

    for (i, result) in arbitration.ranked.iter().enumerate() {
        let name = format!("{:<name_width$}", result.provider_used);
        let name = if color.enabled() {
            name.bold().to_string()
        } else {
            name
        };
        writeln!(
            w,
            "{:>2}. {}  {}  {:.2}  pages {:<3} tables {:<3} {:.2}s",
            i + 1,
            name,
            level_label(result.quality_level(), color),
            result.quality_score(),
            result.page_count,
            result.tables.len(),
            result.extraction_time.as_secs_f64(),
        )?;
        for error in &result.errors {
            if color.enabled() {
                writeln!(w, "      {}", format!("! {}", error).dimmed())?;
            } else {
                writeln!(w, "      ! {}", error)?;
            }
        }
    }

    writeln!(w)?;
    match arbitration.best() {
        Some(best) => {
            let line = format!(
                "Selected: {} ({}, score {:.2})",
                best.provider_used,
                best.quality_level(),
                best.quality_score()
            );
            if color.enabled() {
                writeln!(w, "{}", line.green().bold())?;
            } else {
                writeln!(w, "{}", line)?;
            }
        }
        None => {
            let line = "No provider produced a usable result.";
            if color.enabled() {
                writeln!(w, "{}", line.red().bold())?;
            } else {
                writeln!(w, "{}", line)?;
            }
        }
    }
    Ok(())
}

/// Print a result's text followed by its tables as markdown.
pub fn print_content(
    w: &mut dyn Write,
    result: &ExtractionResult,
    color: ColorMode,
) -> std::io::Result<()> {
    let heading = |w: &mut dyn Write, title: String| -> std::io::Result<()> {
        writeln!(w)?;
        if color.enabled() {
            writeln!(w, "{}", title.bold().cyan())
        } else {
            writeln!(w, "{}", title)
        }
    };

    heading(w, format!("--- Text ({} chars) ---", result.text_chars()))?;
    writeln!(w, "{}", result.text)?;

    for (i, table) in result.tables.iter().enumerate() {
        let page = table
            .attrs
            .page
            .map(|p| format!(", page {}", p))
            .unwrap_or_default();
        heading(w, format!("--- Table {}{} ---", i + 1, page))?;
        writeln!(w, "{}", table.to_markdown())?;
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    file: &'a str,
    document_type: Option<DocumentType>,
    attempted: &'a [String],
    selected: Option<&'a str>,
    results: &'a [ExtractionResult],
}

/// Write every result as pretty JSON.
pub fn write_json(
    w: &mut dyn Write,
    file_name: &str,
    arbitration: &Arbitration,
) -> anyhow::Result<()> {
    let report = JsonReport {
        file: file_name,
        document_type: arbitration.document_type,
        attempted: &arbitration.attempted,
        selected: arbitration.best().map(|r| r.provider_used.as_str()),
        results: &arbitration.ranked,
    };
    serde_json::to_writer_pretty(&mut *w, &report)?;
    writeln!(w)?;
    Ok(())
}

/// List registered providers with their affinity, then unavailable ones.
pub fn print_providers(
    w: &mut dyn Write,
    registry: &ProviderRegistry,
    doc_type: Option<DocumentType>,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w, "Available providers:")?;
    if registry.is_empty() {
        writeln!(w, "  (none)")?;
    }
    for provider in registry.providers() {
        let name = provider.provider_name();
        let name = if color.enabled() {
            name.bold().to_string()
        } else {
            name.to_string()
        };
        match doc_type {
            Some(t) => {
                let affine = provider.supports_document_type(t);
                let mark = match (affine, color.enabled()) {
                    (true, true) => "yes".green().to_string(),
                    (false, true) => "no".dimmed().to_string(),
                    (true, false) => "yes".to_string(),
                    (false, false) => "no".to_string(),
                };
                writeln!(w, "  {}  {}: {}", name, t, mark)?;
            }
            None => {
                let types: Vec<&str> = DocumentType::ALL
                    .iter()
                    .filter(|t| provider.supports_document_type(**t))
                    .map(|t| t.as_str())
                    .collect();
                writeln!(w, "  {}  [{}]", name, types.join(", "))?;
            }
        }
    }

    if !registry.unavailable().is_empty() {
        writeln!(w)?;
        writeln!(w, "Unavailable providers:")?;
        for entry in registry.unavailable() {
            if color.enabled() {
                writeln!(w, "  {}  {}", entry.name.red(), entry.error)?;
            } else {
                writeln!(w, "  {}  {}", entry.name, entry.error)?;
            }
        }
    }
    Ok(())
}
