//! Progress-callback trait for per-item batch events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the batch moves through its phases and as each item finishes.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docs2pdf::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     converted: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, index: usize, name: &str, total: usize, pdf_len: usize) {
//!         let done = self.converted.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}/{total}: {name} (item {index}, {pdf_len} bytes)");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { converted: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifecycle phase of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    Received,
    Dispatching,
    Aggregating,
    Merging,
    Completed,
    Failed,
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchPhase::Received => "received",
            BatchPhase::Dispatching => "dispatching",
            BatchPhase::Aggregating => "aggregating",
            BatchPhase::Merging => "merging",
            BatchPhase::Completed => "completed",
            BatchPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Called by the orchestrator as a batch progresses.
///
/// Item methods may be called concurrently from different tasks, in
/// completion order. `index` is the 0-based submission position. All methods
/// default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before dispatch with the number of submitted items.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called on every phase transition.
    fn on_phase(&self, phase: BatchPhase) {
        let _ = phase;
    }

    /// Called just before an item is converted.
    fn on_item_start(&self, index: usize, name: &str, total: usize) {
        let _ = (index, name, total);
    }

    /// Called when an item converted; `pdf_len` is the artifact size in bytes.
    fn on_item_complete(&self, index: usize, name: &str, total: usize, pdf_len: usize) {
        let _ = (index, name, total, pdf_len);
    }

    /// Called when an item failed, with a human-readable error.
    fn on_item_error(&self, index: usize, name: &str, total: usize, error: &str) {
        let _ = (index, name, total, error);
    }

    /// Called once after dispatch with the number of converted items.
    fn on_batch_complete(&self, total: usize, succeeded: usize) {
        let _ = (total, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
