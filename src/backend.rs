//! Converter backends: one per supported input family.
//!
//! [`Backend`] is a closed set selected by the classifier. Each variant turns
//! an [`InputItem`] into PDF bytes inside the item's private
//! [`ScratchArea`]; external tools are reached only through the
//! [`OfficeEngine`] and [`HtmlRenderer`] collaborators in [`ConvertContext`].

use crate::error::{ItemError, ToolError};
use crate::item::InputItem;
use crate::pipeline::classify::ConversionStrategy;
use crate::pipeline::html::{decode_text, text_document, HtmlRenderer};
use crate::pipeline::image::image_to_pdf;
use crate::pipeline::office::{find_pdf_output, OfficeEngine};
use crate::pipeline::scratch::ScratchArea;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// The conversion backend responsible for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Word-processor documents through the office engine.
    Document,
    /// Plain text wrapped in an HTML template and rendered.
    Text,
    /// HTML rendered by the HTML renderer.
    Html,
    /// Raster images wrapped in a single-page PDF.
    Image,
    /// Existing PDFs, returned unchanged.
    Passthrough,
}

impl Backend {
    /// The backend for a classification, or `None` for unsupported input.
    pub fn for_strategy(strategy: ConversionStrategy) -> Option<Backend> {
        match strategy {
            ConversionStrategy::Document => Some(Backend::Document),
            ConversionStrategy::Text => Some(Backend::Text),
            ConversionStrategy::Html => Some(Backend::Html),
            ConversionStrategy::Image => Some(Backend::Image),
            ConversionStrategy::PassthroughPdf => Some(Backend::Passthrough),
            ConversionStrategy::Unsupported => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Document => "document",
            Backend::Text => "text",
            Backend::Html => "html",
            Backend::Image => "image",
            Backend::Passthrough => "passthrough",
        }
    }

    /// Convert `item` to PDF bytes.
    ///
    /// The returned bytes always start with `%PDF`.
    pub async fn convert(self, item: InputItem, ctx: &ConvertContext<'_>) -> Result<Vec<u8>, ItemError> {
        debug!("Item {}: {} backend on '{}'", ctx.scratch.index(), self, item.name());
        let pdf = match self {
            Backend::Document => convert_document(&item, ctx).await?,
            Backend::Text => {
                let html = text_document(item.name(), &decode_text(item.content()));
                render_html(self, &html, ctx).await?
            }
            Backend::Html => render_html(self, &decode_text(item.content()), ctx).await?,
            Backend::Image => {
                let (_, bytes) = item.into_parts();
                tokio::task::spawn_blocking(move || image_to_pdf(&bytes))
                    .await
                    .map_err(|e| ItemError::failed(self, format!("image task failed: {e}")))??
            }
            Backend::Passthrough => item.into_parts().1,
        };
        ensure_pdf(self, pdf)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators and scratch space available to a backend for one item.
pub struct ConvertContext<'a> {
    pub office: &'a dyn OfficeEngine,
    pub html: &'a dyn HtmlRenderer,
    pub scratch: &'a ScratchArea,
}

async fn convert_document(item: &InputItem, ctx: &ConvertContext<'_>) -> Result<Vec<u8>, ItemError> {
    let backend = Backend::Document;
    let input = ctx
        .scratch
        .stage_input(item.name(), item.content())
        .await
        .map_err(|e| ItemError::failed(backend, format!("failed to stage input: {e}")))?;
    let out_dir = ctx.scratch.output_dir();

    ctx.office
        .convert_to_pdf(&input, &out_dir)
        .await
        .map_err(|e| e.into_item_error(backend))?;

    let produced = find_pdf_output(&out_dir)
        .await
        .map_err(|e| e.into_item_error(backend))?;
    tokio::fs::read(&produced).await.map_err(|e| {
        ToolError::MissingOutput(format!("cannot read {}: {e}", produced.display()))
            .into_item_error(backend)
    })
}

async fn render_html(backend: Backend, html: &str, ctx: &ConvertContext<'_>) -> Result<Vec<u8>, ItemError> {
    ctx.html
        .render(html, ctx.scratch)
        .await
        .map_err(|e| e.into_item_error(backend))
}

fn ensure_pdf(backend: Backend, pdf: Vec<u8>) -> Result<Vec<u8>, ItemError> {
    if pdf.starts_with(b"%PDF") {
        Ok(pdf)
    } else {
        Err(ItemError::failed(backend, "output is not a PDF (missing %PDF header)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ItemErrorKind;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    const TINY_PDF: &[u8] = b"%PDF-1.4\n%%EOF\n";

    /// Writes the given files into `out_dir`.
    struct FileWritingEngine {
        files: Vec<(&'static str, &'static [u8])>,
    }

    #[async_trait]
    impl OfficeEngine for FileWritingEngine {
        async fn convert_to_pdf(&self, input: &Path, out_dir: &Path) -> Result<(), ToolError> {
            assert!(input.is_file());
            for (name, bytes) in &self.files {
                std::fs::write(out_dir.join(name), bytes).unwrap();
            }
            Ok(())
        }
    }

    /// Records the HTML it was asked to render.
    #[derive(Default)]
    struct RecordingRenderer {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HtmlRenderer for RecordingRenderer {
        async fn render(&self, html: &str, _scratch: &ScratchArea) -> Result<Vec<u8>, ToolError> {
            self.seen.lock().unwrap().push(html.to_string());
            Ok(TINY_PDF.to_vec())
        }
    }

    struct FailingRenderer;

    #[async_trait]
    impl HtmlRenderer for FailingRenderer {
        async fn render(&self, _html: &str, _scratch: &ScratchArea) -> Result<Vec<u8>, ToolError> {
            Err(ToolError::Failed("renderer crashed".into()))
        }
    }

    async fn run(
        backend: Backend,
        item: InputItem,
        office: &dyn OfficeEngine,
        html: &dyn HtmlRenderer,
    ) -> Result<Vec<u8>, ItemError> {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchArea::create(0, Some(root.path())).unwrap();
        let ctx = ConvertContext {
            office,
            html,
            scratch: &scratch,
        };
        backend.convert(item, &ctx).await
    }

    fn no_office() -> FileWritingEngine {
        FileWritingEngine { files: vec![] }
    }

    #[test]
    fn strategies_map_to_backends() {
        assert_eq!(Backend::for_strategy(ConversionStrategy::Document), Some(Backend::Document));
        assert_eq!(Backend::for_strategy(ConversionStrategy::PassthroughPdf), Some(Backend::Passthrough));
        assert_eq!(Backend::for_strategy(ConversionStrategy::Unsupported), None);
        assert_eq!(Backend::Html.to_string(), "html");
    }

    #[tokio::test]
    async fn passthrough_returns_bytes_unchanged() {
        let item = InputItem::new("a.pdf", TINY_PDF.to_vec());
        let pdf = run(Backend::Passthrough, item, &no_office(), &RecordingRenderer::default())
            .await
            .unwrap();
        assert_eq!(pdf, TINY_PDF);
    }

    #[tokio::test]
    async fn passthrough_rejects_non_pdf() {
        let item = InputItem::new("fake.pdf", b"PK\x03\x04 zip".to_vec());
        let err = run(Backend::Passthrough, item, &no_office(), &RecordingRenderer::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ItemErrorKind::ConversionFailed);
    }

    #[tokio::test]
    async fn text_is_escaped_and_titled() {
        let renderer = RecordingRenderer::default();
        let item = InputItem::new("notes.txt", b"1 < 2 & <b>".to_vec());
        run(Backend::Text, item, &no_office(), &renderer).await.unwrap();
        let seen = renderer.seen.lock().unwrap();
        assert!(seen[0].contains("<title>notes.txt</title>"));
        assert!(seen[0].contains("1 &lt; 2 &amp; &lt;b&gt;"));
    }

    #[tokio::test]
    async fn html_is_passed_through_to_renderer() {
        let renderer = RecordingRenderer::default();
        let item = InputItem::new("page.html", b"<h1>Hi</h1>".to_vec());
        run(Backend::Html, item, &no_office(), &renderer).await.unwrap();
        assert_eq!(renderer.seen.lock().unwrap()[0], "<h1>Hi</h1>");
    }

    #[tokio::test]
    async fn renderer_failure_is_attributed_to_backend() {
        let item = InputItem::new("page.htm", b"<p>x</p>".to_vec());
        let err = run(Backend::Html, item, &no_office(), &FailingRenderer)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ItemError::ConversionFailed {
                backend: Backend::Html,
                detail: "renderer crashed".into()
            }
        );
    }

    #[tokio::test]
    async fn document_reads_single_output() {
        let engine = FileWritingEngine {
            files: vec![("report.pdf", TINY_PDF), ("soffice.log", &b"ok"[..])],
        };
        let item = InputItem::new("report.docx", b"PK".to_vec());
        let pdf = run(Backend::Document, item, &engine, &RecordingRenderer::default())
            .await
            .unwrap();
        assert_eq!(pdf, TINY_PDF);
    }

    #[tokio::test]
    async fn document_without_output_is_missing() {
        let item = InputItem::new("report.docx", b"PK".to_vec());
        let err = run(Backend::Document, item, &no_office(), &RecordingRenderer::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ItemErrorKind::MissingOutput);
    }

    #[tokio::test]
    async fn document_with_two_outputs_is_ambiguous() {
        let engine = FileWritingEngine {
            files: vec![("a.pdf", TINY_PDF), ("b.pdf", TINY_PDF)],
        };
        let item = InputItem::new("report.docx", b"PK".to_vec());
        let err = run(Backend::Document, item, &engine, &RecordingRenderer::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ItemErrorKind::MissingOutput);
        assert!(err.to_string().contains("ambiguous"));
    }

    #[tokio::test]
    async fn document_output_must_be_pdf() {
        let engine = FileWritingEngine {
            files: vec![("report.pdf", &b"<html>error page</html>"[..])],
        };
        let item = InputItem::new("report.docx", b"PK".to_vec());
        let err = run(Backend::Document, item, &engine, &RecordingRenderer::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ItemErrorKind::ConversionFailed);
    }

    #[tokio::test]
    async fn corrupt_image_fails() {
        let item = InputItem::new("photo.png", b"not png".to_vec());
        let err = run(Backend::Image, item, &no_office(), &RecordingRenderer::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ItemErrorKind::ConversionFailed);
        assert!(err.to_string().starts_with("image"));
    }
}
