//! Streaming conversion API: emit per-item results as they complete.
//!
//! Unlike the eager [`crate::batch::run_batch`], which waits for every item
//! and merges, [`convert_stream`] yields each [`ConversionResult`] as soon as
//! its conversion finishes. Results arrive in completion order; sort by
//! [`ConversionResult::index`] if submission order matters.

use crate::config::ConversionConfig;
use crate::dispatch::{dispatch_item, effective_concurrency, Collaborators};
use crate::item::InputItem;
use crate::output::ConversionResult;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-item results.
pub type ResultStream = Pin<Box<dyn Stream<Item = ConversionResult> + Send>>;

/// Convert `items`, streaming each result as it is ready.
///
/// No merge is performed and item failures are yielded like any other
/// result. Dropping the stream cancels in-flight conversions.
pub fn convert_stream(items: Vec<InputItem>, config: &ConversionConfig) -> ResultStream {
    let total = items.len();
    let concurrency = effective_concurrency(config, total);
    info!("Starting streaming conversion of {} items", total);

    let collaborators = Arc::new(Collaborators::from_config(config));
    let config_clone = config.clone();

    let s = stream::iter(items.into_iter().enumerate().map(move |(index, item)| {
        let collaborators = Arc::clone(&collaborators);
        let cfg = config_clone.clone();
        async move { dispatch_item(index, item, total, &collaborators, &cfg).await }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ItemErrorKind;

    #[tokio::test]
    async fn yields_one_result_per_item() {
        let root = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .scratch_root(root.path())
            .build()
            .unwrap();
        let items = vec![
            InputItem::new("a.pdf", b"%PDF-1.4\n".to_vec()),
            InputItem::new("b.bin", b"??".to_vec()),
            InputItem::new("c.pdf", b"%PDF-1.7\n".to_vec()),
        ];
        let mut results: Vec<ConversionResult> = convert_stream(items, &config).collect().await;
        assert_eq!(results.len(), 3);

        results.sort_by_key(ConversionResult::index);
        assert!(results[0].is_artifact());
        assert_eq!(results[1].error().unwrap().kind(), ItemErrorKind::UnsupportedType);
        assert!(results[2].is_artifact());
    }

    #[tokio::test]
    async fn empty_input_is_an_empty_stream() {
        let results: Vec<ConversionResult> =
            convert_stream(vec![], &ConversionConfig::default()).collect().await;
        assert!(results.is_empty());
    }
}
