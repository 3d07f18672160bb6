//! Search crawl: pagination state machine plus filtering.
//!
//! # Architecture
//!
//! - [`Crawl`] - Lazy page-at-a-time walk over a [`SearchBackend`](crate::api::SearchBackend)
//! - [`Termination`] - Terminal state with a human-readable reason
//! - [`Aggregator`] - Applies [`FilterCriteria`] and optionally downloads accepted items
//! - [`run_crawl`] - Drives a crawl to completion into a [`CrawlReport`]

mod engine;
mod filter;

pub use engine::{Crawl, CrawlOptions, CrawlReport, DEFAULT_INTER_PAGE_DELAY, Termination, run_crawl};
pub use filter::{Aggregator, DownloadTarget, FilterCriteria};
