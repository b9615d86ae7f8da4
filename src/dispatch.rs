//! Conversion dispatcher: route each item to its backend and record the outcome.
//!
//! Every item is converted independently inside its own scratch area and under
//! the per-item timeout. Failures are captured as [`ConversionResult::Failure`]
//! and never abort sibling items.

use crate::backend::{Backend, ConvertContext};
use crate::config::ConversionConfig;
use crate::error::ItemError;
use crate::item::InputItem;
use crate::output::{ConversionResult, ItemArtifact, ItemFailure};
use crate::pipeline::html::HtmlRenderer;
use crate::pipeline::office::OfficeEngine;
use crate::pipeline::scratch::ScratchArea;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The external collaborators shared by every item of a batch.
#[derive(Clone)]
pub struct Collaborators {
    pub office: Arc<dyn OfficeEngine>,
    pub html: Arc<dyn HtmlRenderer>,
}

impl Collaborators {
    /// Resolve injected collaborators, falling back to the command defaults.
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            office: config.resolve_office_engine(),
            html: config.resolve_html_renderer(),
        }
    }
}

/// Number of items converted at once for a batch of `items`.
pub(crate) fn effective_concurrency(config: &ConversionConfig, items: usize) -> usize {
    config.concurrency.clamp(1, items.max(1))
}

/// Convert every item, returning results in submission order.
pub async fn dispatch(items: Vec<InputItem>, config: &ConversionConfig) -> Vec<ConversionResult> {
    let total = items.len();
    let collaborators = Collaborators::from_config(config);
    let concurrency = effective_concurrency(config, total);
    debug!("Dispatching {} items with concurrency {}", total, concurrency);

    let mut results: Vec<ConversionResult> = stream::iter(
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| dispatch_item(index, item, total, &collaborators, config)),
    )
    .buffer_unordered(concurrency)
    .collect()
    .await;

    // Completion order must not leak into the report or the merged output.
    results.sort_by_key(ConversionResult::index);
    results
}

/// Convert one item and fire its progress events.
pub(crate) async fn dispatch_item(
    index: usize,
    item: InputItem,
    total: usize,
    collaborators: &Collaborators,
    config: &ConversionConfig,
) -> ConversionResult {
    let start = Instant::now();
    let source = item.name().to_string();
    let strategy = item.strategy();

    if let Some(ref cb) = config.progress_callback {
        cb.on_item_start(index, &source, total);
    }

    let outcome = match Backend::for_strategy(strategy) {
        Some(backend) => convert_isolated(backend, index, item, collaborators, config).await,
        None => Err(ItemError::UnsupportedType {
            extension: display_extension(item.extension()),
        }),
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(pdf) => {
            debug!("Item {} '{}' converted ({} bytes, {}ms)", index, source, pdf.len(), duration_ms);
            if let Some(ref cb) = config.progress_callback {
                cb.on_item_complete(index, &source, total, pdf.len());
            }
            ConversionResult::Artifact(ItemArtifact {
                index,
                source,
                strategy,
                pdf,
                duration_ms,
            })
        }
        Err(error) => {
            warn!("Item {} '{}' failed: {}", index, source, error);
            if let Some(ref cb) = config.progress_callback {
                cb.on_item_error(index, &source, total, &error.to_string());
            }
            ConversionResult::Failure(ItemFailure {
                index,
                source,
                strategy,
                error,
                duration_ms,
            })
        }
    }
}

/// Run `backend` inside a fresh scratch area under the per-item timeout.
///
/// The scratch area is closed on every return path; if this future is
/// dropped instead, `TempDir`'s `Drop` removes it.
async fn convert_isolated(
    backend: Backend,
    index: usize,
    item: InputItem,
    collaborators: &Collaborators,
    config: &ConversionConfig,
) -> Result<Vec<u8>, ItemError> {
    let scratch = ScratchArea::create(index, config.scratch_root.as_deref())
        .map_err(|e| ItemError::failed(backend, format!("failed to create scratch area: {e}")))?;

    let ctx = ConvertContext {
        office: collaborators.office.as_ref(),
        html: collaborators.html.as_ref(),
        scratch: &scratch,
    };
    let result = match tokio::time::timeout(config.conversion_timeout, backend.convert(item, &ctx)).await {
        Ok(result) => result,
        Err(_) => Err(ItemError::Timeout {
            backend,
            secs: whole_secs(config.conversion_timeout),
        }),
    };

    if let Err(e) = scratch.close() {
        warn!("Item {}: failed to remove scratch area: {}", index, e);
    }
    result
}

fn display_extension(extension: &str) -> String {
    if extension.is_empty() {
        "(none)".to_string()
    } else {
        extension.to_string()
    }
}

/// Seconds in `d`, rounded up so sub-second timeouts never read as zero.
fn whole_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
