//! Image download for accepted items.
//!
//! # Architecture
//!
//! - [`AssetDownloader`] - Async trait the aggregator calls for accepted items
//! - [`ImageDownloader`] - reqwest implementation with streaming writes
//! - [`unique_download_dir`] - Per-run destination folder naming

mod client;
mod error;
mod filename;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

pub use client::ImageDownloader;
pub use error::DownloadError;
pub use filename::{extension_from_url, image_filename, sanitize_folder_term, unique_download_dir};

use crate::api::CrawlItem;

/// Saves an item's image into a destination directory.
#[async_trait]
pub trait AssetDownloader: Send + Sync {
    /// Downloads `item` into `dest_dir` and returns the written path.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] when the image cannot be fetched or written.
    async fn download(&self, item: &CrawlItem, dest_dir: &Path) -> Result<PathBuf, DownloadError>;
}
