//! Result types: per-item conversion results, the batch report, and the
//! merged output.
//!
//! [`ConversionResult`] carries the PDF bytes produced for one item and is
//! what the dispatcher hands to the merger. [`BatchReport`] is the
//! serialisable summary of those results (no PDF bytes) that travels back to
//! the caller on success *and* on batch-level failure.

use crate::error::ItemError;
use crate::pipeline::classify::ConversionStrategy;
use serde::{Deserialize, Serialize};

/// The outcome of converting one input item.
///
/// Exactly one result exists per submitted item, addressable by `index()`.
#[derive(Debug, Clone)]
pub enum ConversionResult {
    Artifact(ItemArtifact),
    Failure(ItemFailure),
}

/// A successfully produced per-item PDF.
#[derive(Debug, Clone)]
pub struct ItemArtifact {
    /// Position of the item in the submitted batch (0-indexed).
    pub index: usize,
    /// Original filename.
    pub source: String,
    pub strategy: ConversionStrategy,
    pub pdf: Vec<u8>,
    pub duration_ms: u64,
}

/// A per-item failure.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub index: usize,
    pub source: String,
    pub strategy: ConversionStrategy,
    pub error: ItemError,
    pub duration_ms: u64,
}

impl ConversionResult {
    pub fn index(&self) -> usize {
        match self {
            ConversionResult::Artifact(a) => a.index,
            ConversionResult::Failure(f) => f.index,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            ConversionResult::Artifact(a) => &a.source,
            ConversionResult::Failure(f) => &f.source,
        }
    }

    pub fn strategy(&self) -> ConversionStrategy {
        match self {
            ConversionResult::Artifact(a) => a.strategy,
            ConversionResult::Failure(f) => f.strategy,
        }
    }

    pub fn is_artifact(&self) -> bool {
        matches!(self, ConversionResult::Artifact(_))
    }

    pub fn error(&self) -> Option<&ItemError> {
        match self {
            ConversionResult::Artifact(_) => None,
            ConversionResult::Failure(f) => Some(&f.error),
        }
    }

    /// Summarise this result for the report, dropping the PDF bytes.
    pub fn to_report(&self) -> ItemReport {
        match self {
            ConversionResult::Artifact(a) => ItemReport {
                index: a.index,
                source: a.source.clone(),
                strategy: a.strategy,
                status: ItemStatus::Converted {
                    pdf_bytes: a.pdf.len(),
                },
                duration_ms: a.duration_ms,
            },
            ConversionResult::Failure(f) => ItemReport {
                index: f.index,
                source: f.source.clone(),
                strategy: f.strategy,
                status: ItemStatus::Failed {
                    error: f.error.clone(),
                },
                duration_ms: f.duration_ms,
            },
        }
    }
}

/// Report line for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemReport {
    pub index: usize,
    pub source: String,
    pub strategy: ConversionStrategy,
    #[serde(flatten)]
    pub status: ItemStatus,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Converted { pdf_bytes: usize },
    Failed { error: ItemError },
}

impl ItemReport {
    pub fn is_converted(&self) -> bool {
        matches!(self.status, ItemStatus::Converted { .. })
    }

    pub fn error(&self) -> Option<&ItemError> {
        match &self.status {
            ItemStatus::Converted { .. } => None,
            ItemStatus::Failed { error } => Some(error),
        }
    }
}

/// Ordered per-item outcomes for one batch.
///
/// `items[i]` always describes the i-th submitted input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    /// Build a report from index-ordered results.
    pub fn from_results(results: &[ConversionResult]) -> Self {
        let items: Vec<ItemReport> = results.iter().map(ConversionResult::to_report).collect();
        let succeeded = items.iter().filter(|i| i.is_converted()).count();
        Self {
            failed: items.len() - succeeded,
            succeeded,
            items,
        }
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Failed items as `(source, error)` pairs, in submission order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ItemError)> {
        self.items
            .iter()
            .filter_map(|i| i.error().map(|e| (i.source.as_str(), e)))
    }
}

/// The merged PDF.
#[derive(Debug, Clone)]
pub struct MergedArtifact {
    pub pdf: Vec<u8>,
    pub page_count: usize,
}

/// Timing and count summary of a completed batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_items: usize,
    pub converted_items: usize,
    pub failed_items: usize,
    /// Page count of the merged document.
    pub merged_pages: usize,
    pub total_duration_ms: u64,
    pub dispatch_duration_ms: u64,
    pub merge_duration_ms: u64,
}

/// Everything a completed batch returns.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    /// The merged PDF bytes.
    #[serde(skip)]
    pub pdf: Vec<u8>,
    pub report: BatchReport,
    pub stats: BatchStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;

    fn artifact(index: usize, name: &str) -> ConversionResult {
        ConversionResult::Artifact(ItemArtifact {
            index,
            source: name.into(),
            strategy: ConversionStrategy::PassthroughPdf,
            pdf: b"%PDF-1.7".to_vec(),
            duration_ms: 1,
        })
    }

    fn failure(index: usize, name: &str) -> ConversionResult {
        ConversionResult::Failure(ItemFailure {
            index,
            source: name.into(),
            strategy: ConversionStrategy::Image,
            error: ItemError::ConversionFailed {
                backend: Backend::Image,
                detail: "truncated".into(),
            },
            duration_ms: 2,
        })
    }

    #[test]
    fn report_counts_and_order() {
        let results = vec![artifact(0, "a.pdf"), failure(1, "b.png"), artifact(2, "c.pdf")];
        let report = BatchReport::from_results(&results);
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        let names: Vec<_> = report.items.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.png", "c.pdf"]);
        let failures: Vec<_> = report.failures().map(|(s, _)| s).collect();
        assert_eq!(failures, vec!["b.png"]);
    }

    #[test]
    fn report_json_omits_pdf_bytes() {
        let report = BatchReport::from_results(&[artifact(0, "a.pdf"), failure(1, "b.png")]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["items"][0]["status"], "converted");
        assert_eq!(json["items"][0]["pdf_bytes"], 8);
        assert_eq!(json["items"][1]["status"], "failed");
        assert_eq!(json["items"][1]["error"]["kind"], "conversion_failed");
        assert_eq!(json["items"][1]["strategy"], "image");
    }
}
