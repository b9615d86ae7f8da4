//! Type classification: map a filename to the strategy used to convert it.
//!
//! Classification is a pure suffix match on the lower-cased extension. An
//! unknown extension is not an error here; the dispatcher turns
//! [`ConversionStrategy::Unsupported`] into a per-item failure so the rest of
//! the batch still converts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an input item is turned into a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStrategy {
    /// Word-processor documents, converted by an external office engine.
    Document,
    /// Plain text, wrapped in an HTML template and rendered.
    Text,
    /// HTML, rendered by the HTML-to-PDF collaborator.
    Html,
    /// Raster images, re-encoded as a single-page PDF.
    Image,
    /// Already a PDF; passed through after a header check.
    PassthroughPdf,
    /// No converter handles this extension.
    Unsupported,
}

const EXTENSION_TABLE: &[(&str, ConversionStrategy)] = &[
    (".docx", ConversionStrategy::Document),
    (".txt", ConversionStrategy::Text),
    (".html", ConversionStrategy::Html),
    (".htm", ConversionStrategy::Html),
    (".jpg", ConversionStrategy::Image),
    (".jpeg", ConversionStrategy::Image),
    (".png", ConversionStrategy::Image),
    (".pdf", ConversionStrategy::PassthroughPdf),
];

impl ConversionStrategy {
    /// Look up the strategy for a lower-cased extension such as `".png"`.
    pub fn from_extension(ext: &str) -> Self {
        EXTENSION_TABLE
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|(_, s)| *s)
            .unwrap_or(ConversionStrategy::Unsupported)
    }

    /// Every supported extension, in table order.
    pub fn extensions() -> impl Iterator<Item = &'static str> {
        EXTENSION_TABLE.iter().map(|(e, _)| *e)
    }

    pub fn is_supported(self) -> bool {
        self != ConversionStrategy::Unsupported
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConversionStrategy::Document => "document",
            ConversionStrategy::Text => "text",
            ConversionStrategy::Html => "html",
            ConversionStrategy::Image => "image",
            ConversionStrategy::PassthroughPdf => "passthrough_pdf",
            ConversionStrategy::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ConversionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a filename by its extension (case-insensitive).
pub fn classify(filename: &str) -> ConversionStrategy {
    ConversionStrategy::from_extension(&extension_of(filename))
}

/// Lower-cased extension of the final path component, including the dot.
///
/// Returns `""` when the name has no extension.
pub fn extension_of(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.rfind('.') {
        Some(pos) => base[pos..].to_ascii_lowercase(),
        None => String::new(),
    }
}
