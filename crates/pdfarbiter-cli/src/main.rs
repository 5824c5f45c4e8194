use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use pdfarbiter_core::config_file::{self, ConfigFile};
use pdfarbiter_core::{
    DocumentType, ExtractionConfig, ExtractionQuality, ProviderRegistry, Selection, arbitrate,
};

mod output;

use output::ColorMode;

/// Multi-backend PDF extraction with quality arbitration
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the extraction providers on a PDF and rank their results
    Extract {
        /// Path to the PDF file
        pdf: PathBuf,

        /// Document type used to shortlist affine providers
        #[arg(long = "type", value_name = "TYPE")]
        doc_type: Option<DocumentType>,

        /// Run only these providers, in this order (repeatable)
        #[arg(long = "provider", value_name = "NAME")]
        providers: Vec<String>,

        /// Run providers concurrently
        #[arg(long)]
        parallel: bool,

        /// Stop a sequential run once a result reaches this level
        #[arg(long, value_name = "LEVEL")]
        stop_at: Option<ExtractionQuality>,

        /// Per-provider timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Plain reading-order text instead of layout-preserving text
        #[arg(long)]
        no_layout: bool,

        /// Skip table extraction
        #[arg(long)]
        no_tables: bool,

        /// Config file to use instead of the platform/CWD cascade
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print every result as JSON
        #[arg(long)]
        json: bool,

        /// Print the selected result's text and tables
        #[arg(long)]
        show_text: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// List registered and unavailable providers
    Providers {
        /// Show affinity for this document type only
        #[arg(long = "type", value_name = "TYPE")]
        doc_type: Option<DocumentType>,

        /// Config file to use instead of the platform/CWD cascade
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    block_on_detached(run(cli.command))?
}

/// Drive `future` on a fresh runtime, then shut it down without waiting for
/// blocking extractions that outlived their timeout.
fn block_on_detached<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;
    let output = rt.block_on(future);
    rt.shutdown_background();
    Ok(output)
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Extract {
            pdf,
            doc_type,
            providers,
            parallel,
            stop_at,
            timeout,
            no_layout,
            no_tables,
            config,
            json,
            show_text,
            no_color,
        } => {
            let file = load_config_file(config.as_deref())?;
            let mut extraction = file.to_extraction_config()?;
            if parallel {
                extraction.use_parallel = true;
            }
            if let Some(secs) = timeout {
                extraction.timeout = Duration::from_secs(secs);
            }
            if no_layout {
                extraction.preserve_layout = false;
            }
            if no_tables {
                extraction.extract_tables = false;
            }
            extraction.validate()?;

            let (mut selection, file_doc_type) = file.to_selection()?;
            if !providers.is_empty() {
                selection.only = Some(providers);
            }
            if stop_at.is_some() {
                selection.stop_at = stop_at;
            }

            extract(
                &pdf,
                doc_type.or(file_doc_type),
                &extraction,
                &selection,
                json,
                show_text,
                ColorMode(!no_color && !json),
            )
            .await
        }
        Command::Providers {
            doc_type,
            config,
            no_color,
        } => {
            let file = load_config_file(config.as_deref())?;
            let extraction = file.to_extraction_config()?;
            let registry = build_registry(&extraction)?;
            let mut stdout = std::io::stdout();
            output::print_providers(&mut stdout, &registry, doc_type, ColorMode(!no_color))?;
            Ok(())
        }
    }
}

/// Logs go to stderr. `RUST_LOG` wins; otherwise warn, raised by `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config_file(path: Option<&Path>) -> anyhow::Result<ConfigFile> {
    match path {
        Some(p) => config_file::load_file(p)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", p.display(), e)),
        None => Ok(config_file::load_config()),
    }
}

/// Register every compiled-in provider whose backend comes up, cheapest
/// first so that sequential runs with a quality target can stop early.
#[cfg_attr(not(feature = "pdfium"), allow(unused_variables))]
fn build_registry(config: &ExtractionConfig) -> anyhow::Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();

    #[cfg(feature = "mupdf")]
    {
        registry.register_probe(pdfarbiter_mupdf::MupdfProvider::try_new())?;
        registry.register_probe(pdfarbiter_mupdf::TableProvider::try_new())?;
    }

    #[cfg(feature = "pdfium")]
    {
        use pdfarbiter_pdfium::{PdfiumLibrary, PdfiumProvider};

        let library = match config.param_str(PdfiumProvider::NAME, "library_path") {
            Some(path) => PdfiumLibrary::from_setting(Some(std::ffi::OsStr::new(path))),
            None => PdfiumLibrary::from_env(),
        };
        registry.register_probe(PdfiumProvider::probe(library))?;
    }

    tracing::info!(
        providers = ?registry.names(),
        unavailable = registry.unavailable().len(),
        "provider registry ready"
    );
    Ok(registry)
}

async fn extract(
    pdf: &Path,
    doc_type: Option<DocumentType>,
    config: &ExtractionConfig,
    selection: &Selection,
    json: bool,
    show_text: bool,
    color: ColorMode,
) -> anyhow::Result<()> {
    if !pdf.exists() {
        anyhow::bail!("File not found: {}", pdf.display());
    }

    let registry = build_registry(config)?;
    if registry.is_empty() {
        anyhow::bail!("No extraction provider is available");
    }

    let file_name = pdf
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| pdf.display().to_string());

    let spinner = ProgressBar::new_spinner();
    if json {
        spinner.set_draw_target(ProgressDrawTarget::hidden());
    }
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    spinner.set_message(format!("Extracting {file_name}..."));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let arbitration = arbitrate(&registry, pdf, doc_type, config, selection).await;
    spinner.finish_and_clear();

    let mut stdout = std::io::stdout();
    if json {
        output::write_json(&mut stdout, &file_name, &arbitration)?;
    } else {
        output::print_arbitration(&mut stdout, &file_name, &arbitration, color)?;
        if show_text && let Some(best) = arbitration.best() {
            output::print_content(&mut stdout, best, color)?;
        }
    }
    stdout.flush()?;

    Ok(())
}
