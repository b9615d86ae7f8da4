//! Office-document conversion through an external engine (LibreOffice).
//!
//! The engine is invoked with an input path and a private output directory
//! and is expected to leave exactly one PDF there. Some engines exit 0 without
//! producing anything, or name the artifact after the input in ways that are
//! hard to predict, so the backend never guesses a path: it lists the output
//! directory and accepts the result only when exactly one PDF is present.

use crate::error::ToolError;
use crate::pipeline::process::{file_url, run_tool};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Converts an office document on disk into a PDF inside `out_dir`.
#[async_trait]
pub trait OfficeEngine: Send + Sync {
    /// Convert `input`, writing the PDF into `out_dir`.
    ///
    /// `out_dir` is private to this call and initially empty.
    async fn convert_to_pdf(&self, input: &Path, out_dir: &Path) -> Result<(), ToolError>;
}

/// LibreOffice in headless mode.
///
/// Each call gets its own user profile next to `out_dir`: concurrent
/// `soffice` processes sharing one profile block on its lock file or exit
/// without converting.
#[derive(Debug, Clone)]
pub struct SofficeEngine {
    program: String,
}

impl SofficeEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn args(input: &Path, out_dir: &Path) -> Result<Vec<OsString>, ToolError> {
        let profile = file_url(&out_dir.with_file_name("profile"))?;
        Ok(vec![
            format!("-env:UserInstallation={profile}").into(),
            "--headless".into(),
            "--norestore".into(),
            "--nolockcheck".into(),
            "--convert-to".into(),
            "pdf".into(),
            "--outdir".into(),
            out_dir.as_os_str().to_owned(),
            input.as_os_str().to_owned(),
        ])
    }
}

impl Default for SofficeEngine {
    fn default() -> Self {
        Self::new("soffice")
    }
}

#[async_trait]
impl OfficeEngine for SofficeEngine {
    async fn convert_to_pdf(&self, input: &Path, out_dir: &Path) -> Result<(), ToolError> {
        run_tool(&self.program, Self::args(input, out_dir)?).await
    }
}

/// Find the single PDF an engine produced in `out_dir`.
///
/// Zero or several candidates are both [`ToolError::MissingOutput`].
pub async fn find_pdf_output(out_dir: &Path) -> Result<PathBuf, ToolError> {
    let mut entries = tokio::fs::read_dir(out_dir).await.map_err(|e| {
        ToolError::MissingOutput(format!("cannot list {}: {e}", out_dir.display()))
    })?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ToolError::MissingOutput(format!("cannot list {}: {e}", out_dir.display())))?
    {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_pdf && is_file {
            candidates.push(path);
        }
    }
    candidates.sort();

    match candidates.len() {
        0 => Err(ToolError::MissingOutput(
            "the office engine reported success but wrote no PDF".to_string(),
        )),
        1 => {
            let found = candidates.remove(0);
            debug!("Office engine output: {}", found.display());
            Ok(found)
        }
        n => {
            let names: Vec<String> = candidates
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect();
            Err(ToolError::MissingOutput(format!(
                "ambiguous output: {n} PDFs produced ({})",
                names.join(", ")
            )))
        }
    }
}
