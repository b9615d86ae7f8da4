//! CLI binary for edgequake-docs2pdf.
//!
//! A thin shim over the library crate that loads inputs, maps CLI flags to
//! `ConversionConfig` and writes the merged PDF.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docs2pdf::batch::write_atomic;
use edgequake_docs2pdf::pipeline::input::load_item;
use edgequake_docs2pdf::{
    classify, run_batch_with_cancel, BatchError, BatchPhase, ConversionConfig,
    ConversionProgressCallback, ConversionStrategy, HtmlEngine, InputItem, ProgressCallback,
};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per item.
/// Items complete out of order, so start times are keyed by index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading inputs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut t| t.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total} files…"))
        ));
    }

    fn on_phase(&self, phase: BatchPhase) {
        if phase == BatchPhase::Merging {
            self.bar.set_prefix("Merging");
            self.bar.set_message("");
        }
    }

    fn on_item_start(&self, index: usize, name: &str, _total: usize) {
        if let Ok(mut t) = self.start_times.lock() {
            t.insert(index, Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_item_complete(&self, index: usize, name: &str, total: usize, pdf_len: usize) {
        let elapsed = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            green("✓"),
            index + 1,
            total,
            name,
            dim(&format!("{:>8} bytes", pdf_len)),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, index: usize, name: &str, total: usize, error: &str) {
        let elapsed = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep one line per item; cut on a char boundary.
        let msg: String = if error.chars().count() > 80 {
            let mut cut: String = error.chars().take(79).collect();
            cut.push('\u{2026}');
            cut
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            red("✗"),
            index + 1,
            total,
            name,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let failed = total.saturating_sub(succeeded);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} files converted successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files converted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge a cover page, a report and a figure, in that order
  docs2pdf cover.html report.docx figure.png -o bundle.pdf

  # Fetch inputs over HTTP
  docs2pdf https://example.com/terms.pdf notes.txt -o out.pdf

  # Render HTML and text with headless Chromium
  docs2pdf --html-engine chromium --html-program google-chrome page.html

  # See how inputs would be converted, without converting
  docs2pdf --classify-only *.docx *.txt scan.tiff

  # Machine-readable per-file report
  docs2pdf --json a.docx b.txt > report.json

SUPPORTED INPUTS:
  Extension          Converter
  ─────────────────  ──────────────────────────────────────────
  .docx              LibreOffice (soffice --headless --convert-to pdf)
  .txt               HTML template → HTML engine
  .html .htm         HTML engine (weasyprint | wkhtmltopdf | chromium)
  .png .jpg .jpeg    in-process, one page per image
  .pdf               passed through unchanged

  Unsupported files are reported and skipped; the rest are still merged.
  Inputs that cannot be read or downloaded are reported the same way.

ENVIRONMENT VARIABLES:
  Every option can be set with a DOCS2PDF_* variable, e.g.
  DOCS2PDF_CONCURRENCY=4, DOCS2PDF_SOFFICE=/opt/libreoffice/program/soffice.
  RUST_LOG overrides the log filter.
"#;

/// Convert documents, text, HTML and images to PDF and merge them in order.
#[derive(Parser, Debug)]
#[command(
    name = "docs2pdf",
    version,
    about = "Convert documents, text, HTML and images to PDF and merge them in order",
    long_about = "Convert a batch of files (DOCX, TXT, HTML, PNG/JPEG, PDF; local paths or URLs) \
to PDF and merge them into one document in argument order. Files that fail to convert are \
reported and left out of the merged PDF.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs, merged in this order.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write the merged PDF to this file.
    #[arg(short, long, env = "DOCS2PDF_OUTPUT", default_value = "converted.pdf")]
    output: PathBuf,

    /// Number of files converted concurrently. Default: number of CPUs.
    #[arg(short, long, env = "DOCS2PDF_CONCURRENCY",
          value_parser = clap::value_parser!(u64).range(1..))]
    concurrency: Option<u64>,

    /// Per-file conversion timeout in seconds.
    #[arg(long, env = "DOCS2PDF_TIMEOUT", default_value_t = 120,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// LibreOffice executable used for .docx files.
    #[arg(long, env = "DOCS2PDF_SOFFICE", default_value = "soffice")]
    soffice: String,

    /// HTML-to-PDF engine used for .html, .htm and .txt files.
    #[arg(long, env = "DOCS2PDF_HTML_ENGINE", value_enum, default_value = "weasyprint")]
    html_engine: HtmlEngineArg,

    /// Executable for the HTML engine, if not its usual name.
    #[arg(long, env = "DOCS2PDF_HTML_PROGRAM")]
    html_program: Option<String>,

    /// Directory for per-file scratch space. Default: system temp dir.
    #[arg(long, env = "DOCS2PDF_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCS2PDF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the per-file report as JSON on stdout.
    #[arg(long, env = "DOCS2PDF_JSON")]
    json: bool,

    /// Print how each input would be converted, then exit.
    #[arg(long)]
    classify_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCS2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCS2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCS2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum HtmlEngineArg {
    Weasyprint,
    Wkhtmltopdf,
    Chromium,
}

impl From<HtmlEngineArg> for HtmlEngine {
    fn from(v: HtmlEngineArg) -> Self {
        match v {
            HtmlEngineArg::Weasyprint => HtmlEngine::WeasyPrint,
            HtmlEngineArg::Wkhtmltopdf => HtmlEngine::WkHtmlToPdf,
            HtmlEngineArg::Chromium => HtmlEngine::Chromium,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters; library INFO
    // logs would interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.classify_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Classify-only mode ───────────────────────────────────────────────
    if cli.classify_only {
        print_classification(&cli)?;
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Load inputs ──────────────────────────────────────────────────────
    let (items, load_failures) = load_inputs(&cli.inputs, cli.download_timeout).await;
    for (input, error) in &load_failures {
        if !cli.quiet {
            eprintln!("  {} {}: {}", red("✗"), input, error);
        }
    }
    if items.is_empty() {
        anyhow::bail!("None of the {} inputs could be loaded", cli.inputs.len());
    }

    // ── Run batch (Ctrl-C cancels) ───────────────────────────────────────
    let cancel = async {
        // If the handler cannot be installed, never cancel.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let result = run_batch_with_cancel(items, &config, cancel).await;

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            if cli.json {
                if let Some(report) = e.report() {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(report).context("Failed to serialise report")?
                    );
                }
            } else if let Some(report) = e.report() {
                if !cli.quiet {
                    for (source, error) in report.failures() {
                        eprintln!("  {} {}: {}", red("✗"), source, error);
                    }
                }
            }
            return Err(exit_error(e));
        }
    };

    write_atomic(&cli.output, &output.pdf)
        .await
        .context("Failed to write merged PDF")?;

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        if !show_progress {
            for (source, error) in output.report.failures() {
                eprintln!("  {} {}: {}", red("✗"), source, error);
            }
        }
        eprintln!(
            "{}  {}/{} files  {} pages  {}ms  →  {}",
            if output.stats.failed_items == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.stats.converted_items,
            output.stats.total_items,
            output.stats.merged_pages,
            output.stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
    }

    Ok(())
}

/// Load every input, keeping submission order among those that load.
///
/// An unreadable path or failed download is returned with its input string
/// instead of aborting the run.
async fn load_inputs(
    inputs: &[String],
    download_timeout: u64,
) -> (Vec<InputItem>, Vec<(String, BatchError)>) {
    let loaded = join_all(inputs.iter().map(|input| load_item(input, download_timeout))).await;

    let mut items = Vec::with_capacity(inputs.len());
    let mut failures = Vec::new();
    for (input, result) in inputs.iter().zip(loaded) {
        match result {
            Ok(item) => items.push(item),
            Err(e) => failures.push((input.clone(), e)),
        }
    }
    (items, failures)
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .conversion_timeout(Duration::from_secs(cli.timeout))
        .office_program(cli.soffice.clone())
        .html_engine(cli.html_engine.into())
        .download_timeout_secs(cli.download_timeout);

    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(usize::try_from(n).context("Concurrency is too large")?);
    }
    if let Some(ref program) = cli.html_program {
        builder = builder.html_program(program.clone());
    }
    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_root(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Print the strategy each input would be converted with.
fn print_classification(cli: &Cli) -> Result<()> {
    let rows: Vec<(&str, ConversionStrategy)> = cli
        .inputs
        .iter()
        .map(|input| (input.as_str(), classify(input.split(['?', '#']).next().unwrap_or(input))))
        .collect();

    if cli.json {
        let json: Vec<serde_json::Value> = rows
            .iter()
            .map(|(input, strategy)| serde_json::json!({ "input": input, "strategy": strategy }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json).context("Failed to serialise classification")?
        );
    } else {
        let width = rows.iter().map(|(i, _)| i.len()).max().unwrap_or(0);
        for (input, strategy) in &rows {
            let label = if strategy.is_supported() {
                strategy.to_string()
            } else {
                red(&strategy.to_string())
            };
            println!("{input:<width$}  {label}");
        }
        if !cli.quiet {
            let supported: Vec<&str> = ConversionStrategy::extensions().collect();
            eprintln!("{}", dim(&format!("supported: {}", supported.join(" "))));
        }
    }
    Ok(())
}

/// Attach a short hint to batch-level failures.
fn exit_error(e: BatchError) -> anyhow::Error {
    let hint = match &e {
        BatchError::Cancelled { .. } => "Interrupted",
        BatchError::AllItemsFailed { .. } => "No file could be converted",
        BatchError::MergeFailed { .. } => "Converted files could not be merged",
        _ => "Conversion failed",
    };
    anyhow::Error::new(e).context(hint)
}
