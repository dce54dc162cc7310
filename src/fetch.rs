use crate::error::AtlasError;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Downloads `url` to `dest`, replacing whatever is there.
///
/// One attempt, no timeout. A non-success status is an error and leaves
/// `dest` untouched.
pub async fn download(url: &str, dest: &Path) -> Result<()> {
    info!(%url, "Downloading boundary file");

    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to request {}", url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AtlasError::DownloadStatus {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }

    let body = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read response body from {}", url))?;

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    tokio::fs::write(dest, &body)
        .await
        .with_context(|| format!("Failed to write boundary file: {:?}", dest))?;

    info!(bytes = body.len(), path = ?dest, "Saved boundary file");
    Ok(())
}
