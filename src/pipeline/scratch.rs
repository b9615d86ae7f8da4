//! Per-item scratch areas.
//!
//! Every dispatched item gets its own [`TempDir`] with an `in/` directory for
//! the staged input and an `out/` directory for tool output. External tools
//! never share a directory, so two items with the same filename cannot
//! overwrite each other's intermediate files, and an office engine's output
//! directory contains only what it produced for this one item.
//!
//! The area is removed by [`ScratchArea::close`] once the item finishes, or by
//! `Drop` when the conversion future is dropped (timeout, cancellation).

use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// A private working directory for one item of a batch.
#[derive(Debug)]
pub struct ScratchArea {
    index: usize,
    dir: TempDir,
}

impl ScratchArea {
    /// Create the scratch area for item `index`, under `root` if given,
    /// otherwise under the system temp directory.
    pub fn create(index: usize, root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("docs2pdf-{index:04}-");
        builder.prefix(&prefix);
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        std::fs::create_dir(dir.path().join("in"))?;
        std::fs::create_dir(dir.path().join("out"))?;
        debug!("Item {}: scratch area {}", index, dir.path().display());
        Ok(Self { index, dir })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Root of the scratch area.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory holding staged inputs.
    pub fn input_dir(&self) -> PathBuf {
        self.dir.path().join("in")
    }

    /// Directory external tools write their output into.
    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Write `bytes` into `in/` under a sanitised version of `name`.
    pub async fn stage_input(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.input_dir().join(sanitize_file_name(name));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Remove the scratch area, reporting any error.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

static RE_UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"));

/// Reduce an uploaded filename to a safe single path component.
///
/// Directory parts are dropped, runs of characters outside `[A-Za-z0-9._-]`
/// become `_`, and leading dots are stripped so the result can be neither
/// hidden nor `..`. The extension survives so tools can still detect the type.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = RE_UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        "input".to_string()
    } else {
        cleaned.to_string()
    }
}
