//! Comic archive: the JSON artifact handed to the indexer
//!
//! The archive is a single JSON object keyed by decimal comic numbers (see
//! [`ComicSet`]). It is written atomically so a reader never observes a
//! half-written file, and it can be read back from a local path or an
//! `http(s)://` URL.

use crate::batch::{fetch_all, BatchReport, ComicSource};
use crate::client::XkcdClient;
use reqwest::Url;
use std::path::Path;
use std::sync::Arc;
use sxkcd_common::{ComicSet, Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Serialize `comics` to `path` (temp file + rename, parent dirs created)
pub async fn write_archive(comics: &ComicSet, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidInput("no archive filename provided".to_string()));
    }

    let json = serde_json::to_vec(comics)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, &json).await?;
    tokio::fs::rename(&temp_path, path).await?;

    tracing::debug!(path = %path.display(), bytes = json.len(), "Archive written");
    Ok(())
}

/// Read an archive from a local file
pub async fn read_archive(path: &Path) -> Result<ComicSet> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

/// Read an archive from a local path or an `http(s)://` URL
pub async fn load_archive(
    location: &str,
    client: &XkcdClient,
    cancel: &CancellationToken,
) -> Result<ComicSet> {
    let comics = if location.starts_with("http://") || location.starts_with("https://") {
        let url = Url::parse(location)
            .map_err(|e| Error::InvalidInput(format!("failed to parse {:?}: {}", location, e)))?;
        client.get_json_with_retry::<ComicSet>(&url, cancel).await?
    } else {
        read_archive(Path::new(location)).await?
    };

    info!(location, comics = comics.len(), "Archive loaded");
    Ok(comics)
}

/// Download every comic up to the latest one and write the archive.
///
/// A cancelled run still writes whatever was fetched before cancellation.
pub async fn download_all<S: ComicSource>(
    source: Arc<S>,
    path: &Path,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<BatchReport> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidInput("no archive filename provided".to_string()));
    }

    let latest = source.latest_num(cancel).await?;
    info!(latest, "Retrieving comics from API");

    let report = fetch_all(source, latest, concurrency, cancel).await?;
    write_archive(&report.comics, path).await?;

    if report.cancelled {
        warn!(path = %path.display(), summary = %report, "Partial archive written");
    } else {
        info!(path = %path.display(), summary = %report, "Comics downloaded");
    }
    Ok(report)
}
