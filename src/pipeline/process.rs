//! Running external conversion tools.
//!
//! Every child is spawned with `kill_on_drop(true)`, so a conversion future
//! dropped by the per-item timeout or by batch cancellation kills its tool.

use crate::error::ToolError;
use std::ffi::OsStr;
use std::path::Path;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Longest stderr excerpt carried into an error message.
const STDERR_EXCERPT: usize = 400;

/// Run `program` with `args` to completion.
///
/// Returns `Ok(())` on exit status 0. A missing executable, a spawn failure
/// and a non-zero exit all become [`ToolError::Failed`] with a short
/// description and the tail of stderr.
pub async fn run_tool<I, S>(program: &str, args: I) -> Result<(), ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running {:?}", cmd.as_std());

    let output = cmd.output().await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ToolError::Failed(format!(
                "'{program}' was not found; install it or configure its path"
            ))
        } else {
            ToolError::Failed(format!("failed to start '{program}': {e}"))
        }
    })?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let excerpt = tail(stderr.trim(), STDERR_EXCERPT);
    let status = match output.status.code() {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    };
    if excerpt.is_empty() {
        Err(ToolError::Failed(format!("'{program}' failed with {status}")))
    } else {
        Err(ToolError::Failed(format!(
            "'{program}' failed with {status}: {excerpt}"
        )))
    }
}

/// A percent-encoded `file://` URL for `path`, made absolute first.
pub fn file_url(path: &Path) -> Result<String, ToolError> {
    let absolute = std::path::absolute(path)
        .map_err(|e| ToolError::Failed(format!("cannot resolve '{}': {e}", path.display())))?;
    reqwest::Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|_| {
            ToolError::Failed(format!("cannot express '{}' as a file URL", absolute.display()))
        })
}

/// The last `max` bytes of `s`, cut on a char boundary.
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
