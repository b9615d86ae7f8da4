//! Configuration types for batch conversion.
//!
//! All batch behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. The config is cheap to clone (collaborators
//! are behind `Arc`) so every dispatched item can carry its own copy.

use crate::error::BatchError;
use crate::pipeline::html::{CommandHtmlRenderer, HtmlEngine, HtmlRenderer};
use crate::pipeline::office::{OfficeEngine, SofficeEngine};
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a batch conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docs2pdf::ConversionConfig;
/// use std::time::Duration;
///
/// let config = ConversionConfig::builder()
///     .concurrency(4)
///     .conversion_timeout(Duration::from_secs(60))
///     .office_program("/opt/libreoffice/program/soffice")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Maximum number of items converted at once. Default: available parallelism.
    ///
    /// Office and HTML conversions each start an external process, so this is
    /// effectively a cap on concurrent child processes.
    pub concurrency: usize,

    /// Wall-clock limit for converting one item. Default: 120 s.
    ///
    /// Covers staging, the external tool and reading its output. On expiry the
    /// item fails with [`crate::ItemError::Timeout`] and its child process is
    /// killed; other items are unaffected.
    pub conversion_timeout: Duration,

    /// Executable used by the default office engine. Default: `soffice`.
    pub office_program: String,

    /// Pre-constructed office engine. Takes precedence over `office_program`.
    pub office_engine: Option<Arc<dyn OfficeEngine>>,

    /// Engine used by the default HTML renderer. Default: WeasyPrint.
    pub html_engine: HtmlEngine,

    /// Executable for `html_engine`. If None, uses the engine's usual name.
    pub html_program: Option<String>,

    /// Pre-constructed HTML renderer. Takes precedence over `html_engine`.
    pub html_renderer: Option<Arc<dyn HtmlRenderer>>,

    /// Parent directory for per-item scratch areas. If None, the system
    /// temporary directory is used.
    pub scratch_root: Option<PathBuf>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives per-item progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            conversion_timeout: Duration::from_secs(120),
            office_program: "soffice".to_string(),
            office_engine: None,
            html_engine: HtmlEngine::default(),
            html_program: None,
            html_renderer: None,
            scratch_root: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("concurrency", &self.concurrency)
            .field("conversion_timeout", &self.conversion_timeout)
            .field("office_program", &self.office_program)
            .field("office_engine", &self.office_engine.as_ref().map(|_| "<dyn OfficeEngine>"))
            .field("html_engine", &self.html_engine)
            .field("html_program", &self.html_program)
            .field("html_renderer", &self.html_renderer.as_ref().map(|_| "<dyn HtmlRenderer>"))
            .field("scratch_root", &self.scratch_root)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The office engine to use: the injected one, else `soffice`.
    pub fn resolve_office_engine(&self) -> Arc<dyn OfficeEngine> {
        match self.office_engine {
            Some(ref engine) => Arc::clone(engine),
            None => Arc::new(SofficeEngine::new(self.office_program.clone())),
        }
    }

    /// The HTML renderer to use: the injected one, else a command renderer
    /// for `html_engine`.
    pub fn resolve_html_renderer(&self) -> Arc<dyn HtmlRenderer> {
        if let Some(ref renderer) = self.html_renderer {
            return Arc::clone(renderer);
        }
        let renderer = CommandHtmlRenderer::new(self.html_engine);
        match self.html_program {
            Some(ref program) => Arc::new(renderer.with_program(program.clone())),
            None => Arc::new(renderer),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn conversion_timeout(mut self, timeout: Duration) -> Self {
        self.config.conversion_timeout = timeout;
        self
    }

    pub fn office_program(mut self, program: impl Into<String>) -> Self {
        self.config.office_program = program.into();
        self
    }

    pub fn office_engine(mut self, engine: Arc<dyn OfficeEngine>) -> Self {
        self.config.office_engine = Some(engine);
        self
    }

    pub fn html_engine(mut self, engine: HtmlEngine) -> Self {
        self.config.html_engine = engine;
        self
    }

    pub fn html_program(mut self, program: impl Into<String>) -> Self {
        self.config.html_program = Some(program.into());
        self
    }

    pub fn html_renderer(mut self, renderer: Arc<dyn HtmlRenderer>) -> Self {
        self.config.html_renderer = Some(renderer);
        self
    }

    pub fn scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = Some(dir.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, BatchError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(BatchError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.conversion_timeout.is_zero() {
            return Err(BatchError::InvalidConfig(
                "Conversion timeout must be greater than zero".into(),
            ));
        }
        if c.office_program.trim().is_empty() {
            return Err(BatchError::InvalidConfig("Office program must not be empty".into()));
        }
        if matches!(c.html_program, Some(ref p) if p.trim().is_empty()) {
            return Err(BatchError::InvalidConfig("HTML program must not be empty".into()));
        }
        Ok(self.config)
    }
}
