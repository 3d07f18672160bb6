//! App API access: endpoints, search requests, and result normalization.
//!
//! # Architecture
//!
//! - [`SearchBackend`] - Async trait the crawl engine fetches pages through
//! - [`AppApiClient`] - reqwest client for the search endpoint
//! - [`AuthenticatedSearch`] - [`SearchBackend`] backed by a token session
//! - [`SearchParams`] - First-request parameters or a parsed continuation cursor
//! - [`CrawlItem`] - Normalized search result

mod client;
pub mod constants;
mod cursor;
mod error;
mod models;

pub use client::{AppApiClient, AuthenticatedSearch};
pub use constants::{Endpoints, PAGE_SIZE, SAFETY_CAP_PAGES};
pub use cursor::{CursorError, SearchParams, initial_offset};
pub use error::ApiError;
pub use models::{CrawlItem, ImageUrls, SearchPage, SearchQuery, SearchTarget, SortOrder};

use async_trait::async_trait;

/// Source of search result pages.
///
/// The crawl engine issues exactly one outstanding call at a time through this
/// trait.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Fetches the page described by `params`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on any request-level failure.
    async fn fetch_page(&self, params: &SearchParams) -> Result<SearchPage, ApiError>;
}
