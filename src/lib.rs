//! pixiv-sorter core library
//!
//! Searches pixiv illustrations by tag, walks result pages, keeps the items
//! whose bookmark count reaches a threshold, and renders them as an HTML
//! gallery (optionally downloading the originals).
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`auth`] - PKCE login, code capture, token session, refresh-token storage
//! - [`api`] - Search endpoint client, continuation cursors, normalized items
//! - [`crawl`] - Pagination state machine, filtering, and aggregation
//! - [`download`] - Streaming image downloads for accepted items
//! - [`report`] - HTML gallery rendering
//! - [`log_sink`] - Injected sink for human-readable progress lines

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod auth;
pub mod crawl;
pub mod download;
pub mod http;
pub mod log_sink;
pub mod report;
mod user_agent;

// Re-export commonly used types
pub use api::{
    ApiError, AppApiClient, AuthenticatedSearch, CrawlItem, Endpoints, SearchBackend,
    SearchParams, SearchQuery, SearchTarget, SortOrder,
};
pub use auth::{AuthError, CaptureChain, ManualCapture, RefreshTokenStore, TokenSessionManager};
pub use crawl::{Aggregator, CrawlOptions, CrawlReport, FilterCriteria, Termination, run_crawl};
pub use download::{AssetDownloader, DownloadError, ImageDownloader};
pub use log_sink::{LogSink, MemoryLogSink, TracingLogSink};
pub use report::{ReportError, render_report};
pub use user_agent::{APP_USER_AGENT, BROWSER_USER_AGENT};
