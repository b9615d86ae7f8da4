//! Ingress: turn a user-supplied path or URL into an [`InputItem`].
//!
//! The library's batch API takes items already in memory; this module is the
//! loader the CLI uses. Local files are read whole. URLs are downloaded with
//! `reqwest`, and the item is named after the last path segment, falling back
//! to the response's `Content-Type` when the URL carries no usable filename,
//! since classification is by extension.

use crate::error::BatchError;
use crate::item::InputItem;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_TYPE};
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load one input, downloading it if it is a URL.
pub async fn load_item(input: &str, timeout_secs: u64) -> Result<InputItem, BatchError> {
    if input.trim().is_empty() {
        return Err(BatchError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(input).await
    }
}

async fn load_local(path_str: &str) -> Result<InputItem, BatchError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(BatchError::PermissionDenied { path });
        }
        Err(_) if path.is_dir() => {
            return Err(BatchError::InvalidInput {
                input: path_str.to_string(),
            });
        }
        Err(_) => return Err(BatchError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());
    debug!("Loaded local file {} ({} bytes)", path.display(), bytes.len());
    Ok(InputItem::new(name, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<InputItem, BatchError> {
    info!("Downloading: {}", url);

    let parsed = reqwest::Url::parse(url).map_err(|_| BatchError::InvalidInput {
        input: url.to_string(),
    })?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| BatchError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_error = |e: reqwest::Error| {
        if e.is_timeout() {
            BatchError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            BatchError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(parsed.clone()).send().await.map_err(map_send_error)?;

    if !response.status().is_success() {
        return Err(BatchError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_for(&parsed, response.headers());
    let bytes = response.bytes().await.map_err(map_send_error)?;

    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(InputItem::new(name, bytes.to_vec()))
}

/// Pick a filename for a downloaded item.
///
/// Order: `Content-Disposition` filename, last URL path segment with an
/// extension, then `download` plus an extension derived from `Content-Type`.
fn filename_for(url: &reqwest::Url, headers: &HeaderMap) -> String {
    if let Some(name) = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(disposition_filename)
    {
        return name;
    }

    if let Some(last) = url.path_segments().and_then(|mut s| s.next_back()) {
        if !last.is_empty() && last.contains('.') {
            return last.to_string();
        }
    }

    let ext = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(extension_for_mime)
        .unwrap_or("");
    format!("download{ext}")
}

/// Extract `filename="..."` from a Content-Disposition value.
fn disposition_filename(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|part| {
        let rest = part.strip_prefix("filename=")?;
        let name = rest.trim_matches('"').trim();
        (!name.is_empty()).then(|| name.to_string())
    })
}

fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "application/pdf" => Some(".pdf"),
        "text/plain" => Some(".txt"),
        "text/html" => Some(".html"),
        "image/png" => Some(".png"),
        "image/jpeg" => Some(".jpg"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some(".docx"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_prefers_content_disposition() {
        let url = reqwest::Url::parse("https://example.com/download?id=7").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"Q3 report.docx\""),
        );
        assert_eq!(filename_for(&url, &headers), "Q3 report.docx");
    }

    #[test]
    fn filename_from_url_path() {
        let url = reqwest::Url::parse("https://example.com/files/notes.txt").unwrap();
        assert_eq!(filename_for(&url, &HeaderMap::new()), "notes.txt");
    }

    #[test]
    fn filename_from_content_type() {
        let url = reqwest::Url::parse("https://example.com/render").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        assert_eq!(filename_for(&url, &headers), "download.html");
        assert_eq!(filename_for(&url, &HeaderMap::new()), "download");
    }

    #[tokio::test]
    async fn local_file_is_loaded_with_its_basename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Letter.DOCX");
        std::fs::write(&path, b"PK").unwrap();
        let item = load_item(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(item.name(), "Letter.DOCX");
        assert_eq!(item.extension(), ".docx");
        assert_eq!(item.content(), b"PK");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_item("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, BatchError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn directory_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_item(dir.path().to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, BatchError::InvalidInput { .. }));
    }
}
