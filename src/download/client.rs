//! Streaming image downloader.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::REFERER;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::AssetDownloader;
use super::error::DownloadError;
use super::filename::image_filename;
use crate::api::CrawlItem;
use crate::api::constants::IMAGE_REFERER;
use crate::http::{CONNECT_TIMEOUT_SECS, DOWNLOAD_REQUEST_TIMEOUT_SECS, build_http_client};
use crate::user_agent;

/// Downloads an item's original image into a destination folder.
///
/// Requests carry the pixiv `Referer` and a desktop browser User-Agent; the
/// image CDN refuses anything else.
#[derive(Debug, Clone)]
pub struct ImageDownloader {
    client: Client,
}

impl ImageDownloader {
    /// Creates a downloader with the default 15-second request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeout(DOWNLOAD_REQUEST_TIMEOUT_SECS)
    }

    /// Creates a downloader with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`] if the HTTP client cannot be built.
    pub fn with_timeout(request_timeout_secs: u64) -> Result<Self, DownloadError> {
        let client = build_http_client(
            user_agent::default_download_user_agent(),
            CONNECT_TIMEOUT_SECS,
            request_timeout_secs,
        )
        .map_err(|source| DownloadError::network("<client>", source))?;
        Ok(Self { client })
    }

    /// Downloads `url` to `<dest_dir>/<id><ext>`, overwriting an existing file.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on invalid URL, non-2xx status, transport, or
    /// file-system failure. A partially written file is removed.
    #[instrument(skip(self, dest_dir), fields(dest = %dest_dir.display()))]
    pub async fn download_url(
        &self,
        id: u64,
        url: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .header(REFERER, IMAGE_REFERER)
            .send()
            .await
            .map_err(|source| DownloadError::network(url, source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|source| DownloadError::io(dest_dir, source))?;
        let file_path = dest_dir.join(image_filename(id, url));
        debug!(path = %file_path.display(), "resolved output path");

        let mut file = File::create(&file_path)
            .await
            .map_err(|source| DownloadError::io(&file_path, source))?;

        let stream_result = stream_to_file(&mut file, response, url, &file_path).await;
        if stream_result.is_err() {
            debug!(path = %file_path.display(), "cleaning up partial file after error");
            drop(file);
            let _ = tokio::fs::remove_file(&file_path).await;
        }
        let bytes = stream_result?;

        info!(path = %file_path.display(), bytes, "download complete");
        Ok(file_path)
    }
}

#[async_trait]
impl AssetDownloader for ImageDownloader {
    async fn download(&self, item: &CrawlItem, dest_dir: &Path) -> Result<PathBuf, DownloadError> {
        let url = item
            .image_urls
            .original
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(DownloadError::MissingUrl { id: item.id })?;
        self.download_url(item.id, url, dest_dir).await
    }
}

async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
