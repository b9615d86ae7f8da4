//! Error types for the edgequake-docs2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BatchError`] — **Fatal**: the batch cannot produce a merged PDF at all
//!   (no input, every item failed, merge failed, cancelled, bad config).
//!   Returned as `Err(BatchError)` from the top-level `run_batch*` functions.
//!
//! * [`ItemError`] — **Non-fatal**: a single item failed (unsupported type,
//!   converter crash, timeout) but the rest of the batch is fine. Stored inside
//!   [`crate::output::ItemReport`] so callers can show "N of M converted"
//!   rather than losing the whole batch to one bad file.
//!
//! Batch-level errors that occur after dispatch carry the accumulated
//! [`BatchReport`] so the caller can still see which items failed and why.

use crate::backend::Backend;
use crate::output::BatchReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docs2pdf library.
///
/// Item-level failures use [`ItemError`] and are stored in the
/// [`BatchReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Batch errors ──────────────────────────────────────────────────────
    /// The batch contained no input items.
    #[error("No input files were provided")]
    NoInput,

    /// Every item failed; merging would yield an empty document.
    #[error("All {} items failed to convert.\nFirst error: {}", .report.items.len(), first_error(.report))]
    AllItemsFailed { report: BatchReport },

    /// Conversion succeeded for at least one item but the merge step failed.
    #[error("Failed to merge converted PDFs: {source}")]
    MergeFailed {
        #[source]
        source: MergeError,
        report: BatchReport,
    },

    /// The batch was cancelled before every item finished.
    #[error("Batch cancelled after {completed}/{total} items finished")]
    Cancelled { completed: usize, total: usize },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the merged output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`BatchError`], stable for programmatic use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NoInput,
    AllItemsFailed,
    MergeFailed,
    Cancelled,
    Input,
    Output,
    Config,
    Internal,
}

impl BatchError {
    /// The failure category of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            BatchError::NoInput => FailureKind::NoInput,
            BatchError::AllItemsFailed { .. } => FailureKind::AllItemsFailed,
            BatchError::MergeFailed { .. } => FailureKind::MergeFailed,
            BatchError::Cancelled { .. } => FailureKind::Cancelled,
            BatchError::FileNotFound { .. }
            | BatchError::PermissionDenied { .. }
            | BatchError::InvalidInput { .. }
            | BatchError::DownloadFailed { .. }
            | BatchError::DownloadTimeout { .. } => FailureKind::Input,
            BatchError::OutputWriteFailed { .. } => FailureKind::Output,
            BatchError::InvalidConfig(_) => FailureKind::Config,
            BatchError::Internal(_) => FailureKind::Internal,
        }
    }

    /// The per-item report accumulated before the batch failed, if dispatch ran.
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            BatchError::AllItemsFailed { report } | BatchError::MergeFailed { report, .. } => {
                Some(report)
            }
            _ => None,
        }
    }
}

fn first_error(report: &BatchReport) -> String {
    report
        .failures()
        .next()
        .map(|(_, e)| e.to_string())
        .unwrap_or_else(|| "Unknown error".to_string())
}

/// A non-fatal error for a single input item.
///
/// Stored in [`crate::output::ItemReport`] when an item fails.
/// The batch continues unless ALL items fail.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemError {
    /// The file extension does not map to any converter.
    #[error("Unsupported file type: '{extension}'")]
    UnsupportedType { extension: String },

    /// The backend or its external tool reported a failure.
    #[error("{backend} conversion failed: {detail}")]
    ConversionFailed { backend: Backend, detail: String },

    /// The external tool finished but the expected PDF was not produced
    /// (or several candidates were produced).
    #[error("{backend} conversion produced no usable PDF: {detail}")]
    MissingOutput { backend: Backend, detail: String },

    /// The conversion exceeded the per-item timeout.
    #[error("{backend} conversion timed out after {secs}s")]
    Timeout { backend: Backend, secs: u64 },
}

/// Stable, serialisable tag for an [`ItemError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorKind {
    UnsupportedType,
    ConversionFailed,
    MissingOutput,
    Timeout,
}

impl ItemError {
    pub fn kind(&self) -> ItemErrorKind {
        match self {
            ItemError::UnsupportedType { .. } => ItemErrorKind::UnsupportedType,
            ItemError::ConversionFailed { .. } => ItemErrorKind::ConversionFailed,
            ItemError::MissingOutput { .. } => ItemErrorKind::MissingOutput,
            ItemError::Timeout { .. } => ItemErrorKind::Timeout,
        }
    }

    pub(crate) fn failed(backend: Backend, detail: impl Into<String>) -> Self {
        ItemError::ConversionFailed {
            backend,
            detail: detail.into(),
        }
    }
}

/// Failure reported by an external collaborator (office engine, HTML renderer).
///
/// Collaborators do not know which backend invoked them; the backend attaches
/// itself when converting into an [`ItemError`].
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// The tool could not be started or exited unsuccessfully.
    #[error("{0}")]
    Failed(String),

    /// The tool reported success but its output artifact is absent.
    #[error("{0}")]
    MissingOutput(String),
}

impl ToolError {
    pub fn into_item_error(self, backend: Backend) -> ItemError {
        match self {
            ToolError::Failed(detail) => ItemError::ConversionFailed { backend, detail },
            ToolError::MissingOutput(detail) => ItemError::MissingOutput { backend, detail },
        }
    }
}

/// Errors raised while concatenating converted PDFs.
#[derive(Debug, Error)]
pub enum MergeError {
    /// An artifact could not be parsed as a PDF.
    #[error("'{source_name}' is not a valid PDF: {detail}")]
    Malformed { source_name: String, detail: String },

    /// An artifact is encrypted and its pages cannot be copied.
    #[error("'{source_name}' is encrypted and cannot be merged")]
    Encrypted { source_name: String },

    /// Page objects could not be copied into the merged document.
    #[error("Failed to copy pages from '{source_name}': {detail}")]
    CopyFailed { source_name: String, detail: String },

    /// The merged document contains no pages.
    #[error("Merged document has no pages")]
    Empty,

    /// Serialising the merged document failed.
    #[error("Failed to write merged PDF: {0}")]
    Write(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_type_display() {
        let e = ItemError::UnsupportedType {
            extension: ".xlsx".into(),
        };
        assert!(e.to_string().contains(".xlsx"), "got: {e}");
        assert_eq!(e.kind(), ItemErrorKind::UnsupportedType);
    }

    #[test]
    fn timeout_display() {
        let e = ItemError::Timeout {
            backend: Backend::Document,
            secs: 30,
        };
        let msg = e.to_string();
        assert!(msg.contains("30s"), "got: {msg}");
        assert!(msg.contains("document"), "got: {msg}");
    }

    #[test]
    fn tool_error_maps_to_backend() {
        let e = ToolError::MissingOutput("nothing in out/".into()).into_item_error(Backend::Html);
        assert_eq!(e.kind(), ItemErrorKind::MissingOutput);
        assert!(e.to_string().contains("html"));
    }

    #[test]
    fn item_error_serialises_with_kind_tag() {
        let e = ItemError::ConversionFailed {
            backend: Backend::Image,
            detail: "bad header".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["kind"], "conversion_failed");
        assert_eq!(json["backend"], "image");
        let back: ItemError = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn no_input_has_no_report() {
        let e = BatchError::NoInput;
        assert_eq!(e.kind(), FailureKind::NoInput);
        assert!(e.report().is_none());
    }

    #[test]
    fn cancelled_display() {
        let e = BatchError::Cancelled {
            completed: 2,
            total: 5,
        };
        assert!(e.to_string().contains("2/5"));
    }
}
