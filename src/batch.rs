//! Batch conversion entry points.
//!
//! A batch moves through `Received → Dispatching → Aggregating → Merging →
//! Completed`, or stops in `Failed`. Use [`crate::stream::convert_stream`]
//! instead when per-item PDFs are wanted as they complete, without a merge.

use crate::config::ConversionConfig;
use crate::dispatch::dispatch;
use crate::error::{BatchError, MergeError};
use crate::item::InputItem;
use crate::output::{BatchOutput, BatchReport, BatchStats, ConversionResult, MergedArtifact};
use crate::pipeline::merge::{merge_pdfs, SourcePdf};
use crate::progress::{BatchPhase, ConversionProgressCallback, ProgressCallback};
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a batch of items and merge the results into one PDF.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(BatchOutput)` when at least one item converted, even if others
/// failed (check `output.report.failed`).
///
/// # Errors
/// Returns `Err(BatchError)` only for batch-level failures:
/// - no items were submitted
/// - every item failed (the error carries the report)
/// - the merge failed (the error carries the report)
pub async fn run_batch(
    items: Vec<InputItem>,
    config: &ConversionConfig,
) -> Result<BatchOutput, BatchError> {
    let total_start = Instant::now();
    let total = items.len();

    // ── Received ─────────────────────────────────────────────────────────
    enter(config, BatchPhase::Received);
    if items.is_empty() {
        enter(config, BatchPhase::Failed);
        return Err(BatchError::NoInput);
    }
    info!("Starting batch of {} items", total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    // ── Dispatching ──────────────────────────────────────────────────────
    enter(config, BatchPhase::Dispatching);
    let dispatch_start = Instant::now();
    let results = dispatch(items, config).await;
    let dispatch_duration_ms = dispatch_start.elapsed().as_millis() as u64;

    // ── Aggregating ──────────────────────────────────────────────────────
    enter(config, BatchPhase::Aggregating);
    let report = BatchReport::from_results(&results);
    info!(
        "Converted {}/{} items in {}ms",
        report.succeeded, total, dispatch_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, report.succeeded);
    }
    if report.succeeded == 0 {
        enter(config, BatchPhase::Failed);
        return Err(BatchError::AllItemsFailed { report });
    }

    // ── Merging ──────────────────────────────────────────────────────────
    enter(config, BatchPhase::Merging);
    let merge_start = Instant::now();
    let merged = match merge_artifacts(results).await {
        Ok(merged) => merged,
        Err(source) => {
            warn!("Merge failed: {}", source);
            enter(config, BatchPhase::Failed);
            return Err(BatchError::MergeFailed { source, report });
        }
    };
    let merge_duration_ms = merge_start.elapsed().as_millis() as u64;

    // ── Completed ────────────────────────────────────────────────────────
    let stats = BatchStats {
        total_items: total,
        converted_items: report.succeeded,
        failed_items: report.failed,
        merged_pages: merged.page_count,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        dispatch_duration_ms,
        merge_duration_ms,
    };
    info!(
        "Batch complete: {} pages from {}/{} items, {}ms total",
        stats.merged_pages, stats.converted_items, total, stats.total_duration_ms
    );
    enter(config, BatchPhase::Completed);

    Ok(BatchOutput {
        pdf: merged.pdf,
        report,
        stats,
    })
}

/// Like [`run_batch`], but abandons the batch when `cancel` resolves first.
///
/// In-flight conversions are dropped: their child processes are killed and
/// their scratch areas removed before this returns
/// [`BatchError::Cancelled`].
pub async fn run_batch_with_cancel<F>(
    items: Vec<InputItem>,
    config: &ConversionConfig,
    cancel: F,
) -> Result<BatchOutput, BatchError>
where
    F: Future<Output = ()>,
{
    let total = items.len();
    let finished = Arc::new(AtomicUsize::new(0));

    // Count finished items through a wrapping callback so the error can say
    // how far the batch got.
    let counting = CountingCallback {
        inner: config.progress_callback.clone(),
        finished: Arc::clone(&finished),
    };
    let mut config = config.clone();
    config.progress_callback = Some(Arc::new(counting));

    tokio::select! {
        result = run_batch(items, &config) => result,
        _ = cancel => {
            let completed = finished.load(Ordering::SeqCst);
            warn!("Batch cancelled after {}/{} items", completed, total);
            if let Some(ref cb) = config.progress_callback {
                cb.on_phase(BatchPhase::Failed);
            }
            Err(BatchError::Cancelled { completed, total })
        }
    }
}

/// Convert a batch and write the merged PDF to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn run_batch_to_file(
    items: Vec<InputItem>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<BatchOutput, BatchError> {
    let output = run_batch(items, config).await?;
    write_atomic(output_path.as_ref(), &output.pdf).await?;
    Ok(output)
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), BatchError> {
    let write_failed = |source| BatchError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_failed)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync(
    items: Vec<InputItem>,
    config: &ConversionConfig,
) -> Result<BatchOutput, BatchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(items, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn enter(config: &ConversionConfig, phase: BatchPhase) {
    debug!("Batch phase: {}", phase);
    if let Some(ref cb) = config.progress_callback {
        cb.on_phase(phase);
    }
}

/// Merge the artifacts of index-ordered `results` on a blocking thread.
async fn merge_artifacts(results: Vec<ConversionResult>) -> Result<MergedArtifact, MergeError> {
    tokio::task::spawn_blocking(move || {
        let sources: Vec<SourcePdf<'_>> = results
            .iter()
            .filter_map(|r| match r {
                ConversionResult::Artifact(a) => Some(SourcePdf::new(&a.source, &a.pdf)),
                ConversionResult::Failure(_) => None,
            })
            .collect();
        merge_pdfs(&sources)
    })
    .await
    .map_err(|e| MergeError::Write(format!("merge task failed: {e}")))?
}

/// Forwards events to the caller's callback while counting finished items.
struct CountingCallback {
    inner: Option<ProgressCallback>,
    finished: Arc<AtomicUsize>,
}

impl ConversionProgressCallback for CountingCallback {
    fn on_batch_start(&self, total: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_batch_start(total);
        }
    }

    fn on_phase(&self, phase: BatchPhase) {
        if let Some(ref cb) = self.inner {
            cb.on_phase(phase);
        }
    }

    fn on_item_start(&self, index: usize, name: &str, total: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_item_start(index, name, total);
        }
    }

    fn on_item_complete(&self, index: usize, name: &str, total: usize, pdf_len: usize) {
        self.finished.fetch_add(1, Ordering::SeqCst);
        if let Some(ref cb) = self.inner {
            cb.on_item_complete(index, name, total, pdf_len);
        }
    }

    fn on_item_error(&self, index: usize, name: &str, total: usize, error: &str) {
        self.finished.fetch_add(1, Ordering::SeqCst);
        if let Some(ref cb) = self.inner {
            cb.on_item_error(index, name, total, error);
        }
    }

    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_batch_complete(total, succeeded);
        }
    }
}
