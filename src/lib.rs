//! # edgequake-docs2pdf
//!
//! Convert a batch of heterogeneous documents into one merged PDF.
//!
//! Each input (Word document, plain text, HTML, PNG/JPEG image, or an
//! existing PDF) is converted by the backend for its type, concurrently and
//! in isolation. Items that fail are recorded in a [`BatchReport`] instead of
//! aborting the batch, and the surviving per-item PDFs are concatenated in
//! submission order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! items
//!  │
//!  ├─ 1. Received     reject an empty batch
//!  ├─ 2. Dispatching  classify → scratch dir → backend, bounded concurrency,
//!  │                  per-item timeout (soffice / HTML engine / image / PDF)
//!  ├─ 3. Aggregating  index-ordered report; all failed ⇒ error
//!  ├─ 4. Merging      lopdf page concatenation (spawn_blocking)
//!  └─ 5. Completed    merged PDF + report + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docs2pdf::{run_batch, ConversionConfig, InputItem};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let items = vec![
//!         InputItem::new("cover.html", std::fs::read("cover.html")?),
//!         InputItem::new("report.docx", std::fs::read("report.docx")?),
//!         InputItem::new("figure.png", std::fs::read("figure.png")?),
//!     ];
//!     let output = run_batch(items, &ConversionConfig::default()).await?;
//!     std::fs::write("merged.pdf", &output.pdf)?;
//!     for (source, error) in output.report.failures() {
//!         eprintln!("skipped {source}: {error}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! | Input | Default tool | Override |
//! |-------|--------------|----------|
//! | `.docx` | `soffice` (LibreOffice, headless) | `office_program` / `office_engine` |
//! | `.txt`, `.html`, `.htm` | `weasyprint` | `html_engine`, `html_program` / `html_renderer` |
//! | `.png`, `.jpg`, `.jpeg` | none (in-process) | — |
//! | `.pdf` | none (passthrough) | — |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docs2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docs2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod batch;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod item;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{Backend, ConvertContext};
pub use batch::{run_batch, run_batch_sync, run_batch_to_file, run_batch_with_cancel};
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use dispatch::dispatch;
pub use error::{BatchError, FailureKind, ItemError, ItemErrorKind, MergeError, ToolError};
pub use item::InputItem;
pub use output::{
    BatchOutput, BatchReport, BatchStats, ConversionResult, ItemArtifact, ItemFailure, ItemReport,
    ItemStatus, MergedArtifact,
};
pub use pipeline::classify::{classify, ConversionStrategy};
pub use pipeline::html::{CommandHtmlRenderer, HtmlEngine, HtmlRenderer};
pub use pipeline::merge::{merge_pdfs, SourcePdf};
pub use pipeline::office::{OfficeEngine, SofficeEngine};
pub use pipeline::scratch::ScratchArea;
pub use progress::{BatchPhase, ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, ResultStream};
