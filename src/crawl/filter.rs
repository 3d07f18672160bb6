//! Item filtering and accumulation.

use std::path::PathBuf;

use tracing::debug;

use crate::api::CrawlItem;
use crate::download::AssetDownloader;
use crate::log_sink::LogSink;

/// Acceptance rule for a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Minimum bookmark count (inclusive).
    pub popularity_threshold: u64,
    /// Whether age-restricted items may be accepted.
    pub allow_restricted: bool,
}

impl FilterCriteria {
    /// Whether `item` passes the filter.
    #[must_use]
    pub fn accepts(&self, item: &CrawlItem) -> bool {
        if item.is_restricted() && !self.allow_restricted {
            return false;
        }
        item.popularity_count >= self.popularity_threshold
    }
}

/// Downloader plus the folder it writes into.
pub struct DownloadTarget<'a> {
    downloader: &'a dyn AssetDownloader,
    dest_dir: PathBuf,
}

impl<'a> DownloadTarget<'a> {
    /// Pairs a downloader with its destination folder.
    #[must_use]
    pub fn new(downloader: &'a dyn AssetDownloader, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloader,
            dest_dir: dest_dir.into(),
        }
    }
}

/// Applies [`FilterCriteria`] and keeps every accepted item in arrival order.
///
/// No deduplication: an item delivered twice is accepted twice.
pub struct Aggregator<'a> {
    criteria: FilterCriteria,
    downloads: Option<DownloadTarget<'a>>,
    log: &'a dyn LogSink,
    accepted: Vec<CrawlItem>,
    downloaded: usize,
    download_failures: usize,
}

impl<'a> Aggregator<'a> {
    /// Aggregator without downloads.
    #[must_use]
    pub fn new(criteria: FilterCriteria, log: &'a dyn LogSink) -> Self {
        Self {
            criteria,
            downloads: None,
            log,
            accepted: Vec::new(),
            downloaded: 0,
            download_failures: 0,
        }
    }

    /// Downloads every accepted item through `target`.
    #[must_use]
    pub fn with_downloads(mut self, target: DownloadTarget<'a>) -> Self {
        self.downloads = Some(target);
        self
    }

    /// Evaluates `item`; on acceptance records it and, if configured,
    /// downloads it before returning. Download failures are logged only.
    pub async fn accept(&mut self, item: &CrawlItem) -> bool {
        if !self.criteria.accepts(item) {
            return false;
        }
        self.accepted.push(item.clone());

        if let Some(target) = &self.downloads {
            match target.downloader.download(item, &target.dest_dir).await {
                Ok(path) => {
                    self.downloaded += 1;
                    debug!(id = item.id, path = %path.display(), "image saved");
                }
                Err(error) => {
                    self.download_failures += 1;
                    self.log
                        .log(&format!("  [!] Failed to download {}: {error}", item.id));
                }
            }
        }
        true
    }

    /// Items accepted so far.
    #[must_use]
    pub fn accepted(&self) -> &[CrawlItem] {
        &self.accepted
    }

    /// Successful downloads so far.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded
    }

    /// Failed downloads so far.
    #[must_use]
    pub fn download_failures(&self) -> usize {
        self.download_failures
    }

    /// Consumes the aggregator, returning the accepted items.
    #[must_use]
    pub fn into_accepted(self) -> Vec<CrawlItem> {
        self.accepted
    }
}
