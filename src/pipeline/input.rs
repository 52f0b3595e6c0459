//! Input resolution: load a fragments document from a local path or a URL.
//!
//! The document source (a PDF text extractor) runs outside this crate and
//! hands over JSON: either `{"title": ..., "pages": [...]}` or a bare array of
//! pages. Pages are parsed in full; page selection is applied afterwards by
//! position.

use crate::config::PageSelection;
use crate::error::ReflowError;
use crate::page::{PageContent, SourceDocument};
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a fragments document from `input` (path or http(s) URL).
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<SourceDocument, ReflowError> {
    let bytes = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    parse_document(&bytes, input)
}

/// Parse fragments JSON. `source_name` is only used in error messages.
pub fn parse_document(bytes: &[u8], source_name: &str) -> Result<SourceDocument, ReflowError> {
    let doc: SourceDocument =
        serde_json::from_slice(bytes).map_err(|e| ReflowError::ParseFailed {
            source_name: source_name.to_string(),
            detail: e.to_string(),
        })?;
    debug!(
        "Parsed '{}': {} pages, {} fragments",
        source_name,
        doc.page_count(),
        doc.fragment_count()
    );
    Ok(doc)
}

/// Apply `selection` to `doc`, keeping the pages in document order.
///
/// Returns `(page_num, page)` pairs, `page_num` being 1-indexed. A selection
/// that names a single page past the end is an error; wider selections are
/// silently clipped.
pub fn select_pages<'a>(
    doc: &'a SourceDocument,
    selection: &PageSelection,
) -> Result<Vec<(usize, &'a PageContent)>, ReflowError> {
    let total = doc.page_count();
    let indices = selection.to_indices(total);
    if indices.is_empty() {
        if let PageSelection::Single(page) = selection {
            return Err(ReflowError::PageOutOfRange { page: *page, total });
        }
    }
    Ok(indices.into_iter().map(|i| (i + 1, &doc.pages[i])).collect())
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, ReflowError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ReflowError::PermissionDenied { path })
        }
        Err(_) => Err(ReflowError::FileNotFound { path }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ReflowError> {
    info!("Downloading fragments from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ReflowError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            ReflowError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ReflowError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(ReflowError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_err)?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
