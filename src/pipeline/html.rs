//! HTML-to-PDF rendering and the plain-text template.
//!
//! Both the Text and Html backends go through an [`HtmlRenderer`]. The
//! default renderer shells out to one of several engines. Uploaded HTML is
//! untrusted: engines that can run scripts are invoked with scripting
//! disabled, and WeasyPrint never executes JavaScript at all. Network
//! isolation of the renderer is a deployment concern and is not enforced here.

use crate::error::ToolError;
use crate::pipeline::process::{file_url, run_tool};
use crate::pipeline::scratch::ScratchArea;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;

/// Renders an HTML document to PDF bytes.
#[async_trait]
pub trait HtmlRenderer: Send + Sync {
    /// Render `html`, using `scratch` for any intermediate files.
    async fn render(&self, html: &str, scratch: &ScratchArea) -> Result<Vec<u8>, ToolError>;
}

/// External HTML-to-PDF engines the default renderer knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HtmlEngine {
    /// `weasyprint input.html output.pdf` (default; never runs scripts).
    #[default]
    WeasyPrint,
    /// `wkhtmltopdf --disable-javascript input.html output.pdf`.
    WkHtmlToPdf,
    /// Headless Chromium `--print-to-pdf` with scripting disabled.
    Chromium,
}

impl HtmlEngine {
    /// Executable name used when no explicit program is configured.
    pub fn default_program(self) -> &'static str {
        match self {
            HtmlEngine::WeasyPrint => "weasyprint",
            HtmlEngine::WkHtmlToPdf => "wkhtmltopdf",
            HtmlEngine::Chromium => "chromium",
        }
    }

    fn args(self, input: &Path, output: &Path) -> Result<Vec<OsString>, ToolError> {
        let args = match self {
            HtmlEngine::WeasyPrint => vec![
                "--encoding".into(),
                "utf-8".into(),
                input.as_os_str().to_owned(),
                output.as_os_str().to_owned(),
            ],
            HtmlEngine::WkHtmlToPdf => vec![
                "--quiet".into(),
                "--disable-javascript".into(),
                "--encoding".into(),
                "utf-8".into(),
                input.as_os_str().to_owned(),
                output.as_os_str().to_owned(),
            ],
            HtmlEngine::Chromium => {
                let mut print_to = OsString::from("--print-to-pdf=");
                print_to.push(output.as_os_str());
                vec![
                    "--headless".into(),
                    "--disable-gpu".into(),
                    "--no-pdf-header-footer".into(),
                    "--blink-settings=scriptEnabled=false".into(),
                    print_to,
                    file_url(input)?.into(),
                ]
            }
        };
        Ok(args)
    }
}

/// Renders HTML by writing it into the scratch area and running an engine.
#[derive(Debug, Clone)]
pub struct CommandHtmlRenderer {
    engine: HtmlEngine,
    program: String,
}

impl CommandHtmlRenderer {
    pub fn new(engine: HtmlEngine) -> Self {
        Self {
            engine,
            program: engine.default_program().to_string(),
        }
    }

    /// Override the executable (e.g. `google-chrome` for [`HtmlEngine::Chromium`]).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn engine(&self) -> HtmlEngine {
        self.engine
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl HtmlRenderer for CommandHtmlRenderer {
    async fn render(&self, html: &str, scratch: &ScratchArea) -> Result<Vec<u8>, ToolError> {
        let input = scratch
            .stage_input("document.html", html.as_bytes())
            .await
            .map_err(|e| ToolError::Failed(format!("failed to stage HTML: {e}")))?;
        let output = scratch.output_dir().join("document.pdf");

        run_tool(&self.program, self.engine.args(&input, &output)?).await?;

        match tokio::fs::read(&output).await {
            Ok(bytes) if !bytes.is_empty() => Ok(bytes),
            Ok(_) => Err(ToolError::MissingOutput(format!(
                "'{}' wrote an empty PDF",
                self.program
            ))),
            Err(e) => Err(ToolError::MissingOutput(format!(
                "'{}' reported success but {} is unreadable: {e}",
                self.program,
                output.display()
            ))),
        }
    }
}

/// Decode uploaded bytes as UTF-8, dropping a leading BOM and replacing
/// invalid sequences.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap plain text in a minimal, print-friendly HTML document.
pub fn text_document(title: &str, text: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
<html>\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<title>{}</title>\n\
<style>\n\
@page {{ size: A4; margin: 2cm; }}\n\
body {{ margin: 0; }}\n\
pre {{ font-family: \"DejaVu Sans Mono\", monospace; font-size: 10pt; white-space: pre-wrap; overflow-wrap: anywhere; }}\n\
</style>\n\
</head>\n\
<body>\n\
<pre>{}</pre>\n\
</body>\n\
</html>\n",
        escape_html(title),
        escape_html(text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_escapes_markup() {
        assert_eq!(
            escape_html("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#39;x&#39;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn text_document_wraps_in_pre() {
        let html = text_document("notes.txt", "a < b\nline two");
        assert!(html.contains("<title>notes.txt</title>"));
        assert!(html.contains("<pre>a &lt; b\nline two</pre>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn decode_text_strips_bom_and_tolerates_bad_bytes() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFhello"), "hello");
        assert_eq!(decode_text(b"ok\xFF"), "ok\u{FFFD}");
    }

    #[cfg(unix)]
    #[test]
    fn engine_args_disable_scripts() {
        let wk = HtmlEngine::WkHtmlToPdf
            .args(Path::new("/s/in/d.html"), Path::new("/s/out/d.pdf"))
            .unwrap();
        assert!(wk.iter().any(|a| a == "--disable-javascript"));

        let chrome = HtmlEngine::Chromium
            .args(Path::new("/s/in/d.html"), Path::new("/s/out/d.pdf"))
            .unwrap();
        assert!(chrome.iter().any(|a| a == "--blink-settings=scriptEnabled=false"));
        assert!(chrome.iter().any(|a| a == "--print-to-pdf=/s/out/d.pdf"));
        assert_eq!(chrome.last().unwrap(), "file:///s/in/d.html");
    }

    #[cfg(unix)]
    #[test]
    fn chromium_url_is_percent_encoded() {
        let chrome = HtmlEngine::Chromium
            .args(Path::new("/tmp/50% off/in/d.html"), Path::new("/tmp/out.pdf"))
            .unwrap();
        assert_eq!(chrome.last().unwrap(), "file:///tmp/50%25%20off/in/d.html");
    }

    #[test]
    fn program_override() {
        let r = CommandHtmlRenderer::new(HtmlEngine::Chromium).with_program("google-chrome");
        assert_eq!(r.program(), "google-chrome");
        assert_eq!(r.engine(), HtmlEngine::Chromium);
        assert_eq!(CommandHtmlRenderer::new(HtmlEngine::default()).program(), "weasyprint");
    }
}
