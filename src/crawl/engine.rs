//! Paginated search crawl.
//!
//! A [`Crawl`] walks the search result pages one request at a time. Each call
//! to [`Crawl::next_page`] returns the next page's items for filtering, or
//! `None` once a terminal state is reached. The terminal state is available
//! afterwards via [`Crawl::into_termination`].

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::filter::Aggregator;
use crate::api::{ApiError, CrawlItem, SAFETY_CAP_PAGES, SearchBackend, SearchParams, SearchQuery};
use crate::log_sink::LogSink;

/// Default delay between page requests.
pub const DEFAULT_INTER_PAGE_DELAY: Duration = Duration::from_millis(2500);

/// Crawl parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOptions {
    /// What to search for.
    pub query: SearchQuery,
    /// 1-based page to start at.
    pub start_page: u32,
    /// Page limit, ignored when `unlimited`.
    pub max_pages: u32,
    /// Ignore `max_pages` (the safety cap still applies).
    pub unlimited: bool,
    /// Pause before each follow-up request.
    pub inter_page_delay: Duration,
}

impl CrawlOptions {
    /// Options with defaults: page 1, 5 pages, 2.5 s delay.
    #[must_use]
    pub fn new(query: SearchQuery) -> Self {
        Self {
            query,
            start_page: 1,
            max_pages: 5,
            unlimited: false,
            inter_page_delay: DEFAULT_INTER_PAGE_DELAY,
        }
    }
}

/// Why a crawl stopped.
#[derive(Debug)]
pub enum Termination {
    /// A page came back with no items.
    NoItems {
        /// Page number of the empty page.
        page: u32,
    },
    /// The last page carried no continuation cursor.
    NoContinuation,
    /// A page repeated the previous page's items exactly.
    Duplicate {
        /// Page number of the repeated page.
        page: u32,
    },
    /// The continuation cursor was one already followed.
    Circular,
    /// The user page limit was reached.
    LimitReached {
        /// The configured limit.
        max_pages: u32,
    },
    /// The absolute page ceiling was reached.
    SafetyCap,
    /// A request failed or a cursor could not be parsed.
    Error {
        /// Page number being fetched.
        page: u32,
        /// The failure.
        error: ApiError,
    },
    /// The consumer stopped pulling pages before a terminal state.
    Abandoned,
}

impl Termination {
    /// Short state name (`EXHAUSTED`, `DUPLICATE`, ...).
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self {
            Self::NoItems { .. } | Self::NoContinuation => "EXHAUSTED",
            Self::Duplicate { .. } => "DUPLICATE",
            Self::Circular => "CIRCULAR",
            Self::LimitReached { .. } => "LIMIT_REACHED",
            Self::SafetyCap => "SAFETY_CAP",
            Self::Error { .. } => "ERROR",
            Self::Abandoned => "ABANDONED",
        }
    }

    /// Whether the crawl ended on a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Human-readable reason.
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoItems { page } => {
                write!(f, "No more illustrations found. Stopping at page {page}.")
            }
            Self::NoContinuation => f.write_str("End of results (no next page)."),
            Self::Duplicate { page } => write!(f, "Duplicate page detected at page {page}. Stopping."),
            Self::Circular => f.write_str("Circular pagination detected. Stopping."),
            Self::LimitReached { max_pages } => {
                write!(f, "Reached page limit ({max_pages}). Stopping.")
            }
            Self::SafetyCap => {
                write!(f, "Reached safety cap of {SAFETY_CAP_PAGES} pages. Stopping.")
            }
            Self::Error { page, error } => write!(f, "Error fetching page {page}: {error}"),
            Self::Abandoned => f.write_str("Crawl stopped before completion."),
        }
    }
}

enum Phase {
    Start,
    AfterPage { next_url: Option<String> },
    Done(Termination),
}

/// Lazy, single-use page sequence over a [`SearchBackend`].
pub struct Crawl<'a> {
    backend: &'a dyn SearchBackend,
    log: &'a dyn LogSink,
    options: CrawlOptions,
    phase: Phase,
    pages_processed: u32,
    seen_cursors: HashSet<String>,
    previous_ids: HashSet<u64>,
}

impl<'a> Crawl<'a> {
    /// Prepares a crawl. Nothing is fetched until the first
    /// [`next_page`](Self::next_page) call.
    #[must_use]
    pub fn new(backend: &'a dyn SearchBackend, options: CrawlOptions, log: &'a dyn LogSink) -> Self {
        Self {
            backend,
            log,
            options,
            phase: Phase::Start,
            pages_processed: 0,
            seen_cursors: HashSet::new(),
            previous_ids: HashSet::new(),
        }
    }

    /// Pages fetched so far, including empty and duplicate pages.
    #[must_use]
    pub fn pages_processed(&self) -> u32 {
        self.pages_processed
    }

    /// Terminal state, once reached.
    #[must_use]
    pub fn termination(&self) -> Option<&Termination> {
        match &self.phase {
            Phase::Done(termination) => Some(termination),
            _ => None,
        }
    }

    /// Consumes the crawl and returns why it stopped.
    #[must_use]
    pub fn into_termination(self) -> Termination {
        match self.phase {
            Phase::Done(termination) => termination,
            Phase::Start | Phase::AfterPage { .. } => Termination::Abandoned,
        }
    }

    fn current_page_number(&self) -> u32 {
        self.options.start_page.max(1).saturating_add(self.pages_processed)
    }

    fn finish(&mut self, termination: Termination) -> Option<Vec<CrawlItem>> {
        match &termination {
            Termination::Error { .. } => warn!(state = termination.state(), "{termination}"),
            _ => info!(state = termination.state(), "crawl finished"),
        }
        self.log.log(&termination.reason());
        self.phase = Phase::Done(termination);
        None
    }

    /// Fetches the next page and returns its items for filtering.
    ///
    /// Returns `None` once the crawl has terminated; it never restarts.
    pub async fn next_page(&mut self) -> Option<Vec<CrawlItem>> {
        let params = match std::mem::replace(&mut self.phase, Phase::Start) {
            Phase::Done(termination) => {
                self.phase = Phase::Done(termination);
                return None;
            }
            Phase::Start => SearchParams::initial(&self.options.query, self.options.start_page),
            Phase::AfterPage { next_url } => match self.advance(next_url).await {
                Ok(params) => params,
                Err(termination) => return self.finish(termination),
            },
        };

        let page_number = self.current_page_number();
        let page = match self.backend.fetch_page(&params).await {
            Ok(page) => page,
            Err(error) => {
                return self.finish(Termination::Error {
                    page: page_number,
                    error,
                });
            }
        };
        self.pages_processed += 1;

        if page.items.is_empty() {
            return self.finish(Termination::NoItems { page: page_number });
        }

        let ids: HashSet<u64> = page.items.iter().map(|item| item.id).collect();
        if !self.previous_ids.is_empty() {
            if ids == self.previous_ids {
                return self.finish(Termination::Duplicate { page: page_number });
            }
            let overlap = ids.intersection(&self.previous_ids).count();
            if overlap > 0 {
                warn!(page = page_number, overlap, "page partially repeats the previous page");
                self.log.log(&format!(
                    "[!] Page {page_number} repeats {overlap} item(s) from the previous page; results may have a gap."
                ));
            }
        }

        self.log.log(&format!(
            "Processing page {page_number} ({} items)...",
            page.items.len()
        ));
        self.previous_ids = ids;
        self.phase = Phase::AfterPage {
            next_url: page.next_url,
        };
        Some(page.items)
    }

    /// Evaluates the continuation rules for the page just yielded and, if the
    /// crawl continues, waits and returns the next request's parameters.
    async fn advance(&mut self, next_url: Option<String>) -> Result<SearchParams, Termination> {
        let Some(cursor) = next_url else {
            return Err(Termination::NoContinuation);
        };
        if !self.seen_cursors.insert(cursor.clone()) {
            return Err(Termination::Circular);
        }
        if !self.options.unlimited && self.pages_processed >= self.options.max_pages {
            return Err(Termination::LimitReached {
                max_pages: self.options.max_pages,
            });
        }
        if self.pages_processed >= SAFETY_CAP_PAGES {
            return Err(Termination::SafetyCap);
        }

        if !self.options.inter_page_delay.is_zero() {
            tokio::time::sleep(self.options.inter_page_delay).await;
        }
        debug!(cursor = %cursor, "following continuation cursor");
        SearchParams::from_cursor(&cursor).map_err(|error| Termination::Error {
            page: self.current_page_number(),
            error: error.into(),
        })
    }
}

/// Outcome of a complete crawl.
#[derive(Debug)]
pub struct CrawlReport {
    /// Items accepted by the filter, in arrival order.
    pub accepted: Vec<CrawlItem>,
    /// Pages fetched.
    pub pages_processed: u32,
    /// Why the crawl stopped.
    pub termination: Termination,
    /// Images saved.
    pub downloaded: usize,
    /// Images that failed to download.
    pub download_failures: usize,
}

/// Runs a crawl to completion, feeding every yielded item to `aggregator`.
///
/// Items accepted before an error are kept in the report.
#[instrument(skip_all, fields(word = %options.query.word, start_page = options.start_page))]
pub async fn run_crawl(
    backend: &dyn SearchBackend,
    options: CrawlOptions,
    mut aggregator: Aggregator<'_>,
    log: &dyn LogSink,
) -> CrawlReport {
    log.log(&format!(
        "Searching for '{}' starting at page {}...",
        options.query.word, options.start_page
    ));

    let mut crawl = Crawl::new(backend, options, log);
    while let Some(items) = crawl.next_page().await {
        for item in &items {
            aggregator.accept(item).await;
        }
    }

    let pages_processed = crawl.pages_processed();
    let termination = crawl.into_termination();
    let downloaded = aggregator.downloaded();
    let download_failures = aggregator.download_failures();
    let accepted = aggregator.into_accepted();
    log.log(&format!("Found {} images matching the criteria.", accepted.len()));

    CrawlReport {
        accepted,
        pages_processed,
        termination,
        downloaded,
        download_failures,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::api::{ImageUrls, SearchPage};
    use crate::crawl::FilterCriteria;
    use crate::log_sink::MemoryLogSink;

    fn item(id: u64, popularity: u64) -> CrawlItem {
        CrawlItem {
            id,
            title: format!("item {id}"),
            creator: "someone".to_string(),
            rating_flag: 0,
            popularity_count: popularity,
            created_at: None,
            image_urls: ImageUrls::default(),
        }
    }

    fn cursor(offset: u32) -> String {
        format!("https://app-api.pixiv.net/v1/search/illust?word=cat&offset={offset}")
    }

    fn page(ids: &[u64], next: Option<String>) -> SearchPage {
        SearchPage {
            items: ids.iter().map(|&id| item(id, id)).collect(),
            next_url: next,
        }
    }

    /// Replays a fixed list of responses and records every request.
    struct ScriptedBackend {
        responses: Mutex<VecDeque<Result<SearchPage, ApiError>>>,
        requests: Mutex<Vec<SearchParams>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<SearchPage, ApiError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn pages(pages: Vec<SearchPage>) -> Self {
            Self::new(pages.into_iter().map(Ok).collect())
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SearchBackend for ScriptedBackend {
        async fn fetch_page(&self, params: &SearchParams) -> Result<SearchPage, ApiError> {
            self.requests.lock().unwrap().push(params.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(SearchPage::default()))
        }
    }

    fn options(max_pages: u32, unlimited: bool) -> CrawlOptions {
        CrawlOptions {
            query: SearchQuery::new("cat"),
            start_page: 1,
            max_pages,
            unlimited,
            inter_page_delay: Duration::ZERO,
        }
    }

    fn everything() -> FilterCriteria {
        FilterCriteria {
            popularity_threshold: 0,
            allow_restricted: true,
        }
    }

    async fn run(backend: &ScriptedBackend, opts: CrawlOptions, log: &MemoryLogSink) -> CrawlReport {
        run_crawl(backend, opts, Aggregator::new(everything(), log), log).await
    }

    #[tokio::test]
    async fn test_three_disjoint_pages_then_no_cursor_is_exhausted() {
        let backend = ScriptedBackend::pages(vec![
            page(&[1, 2], Some(cursor(30))),
            page(&[3, 4], Some(cursor(60))),
            page(&[5, 6], None),
        ]);
        let log = MemoryLogSink::new();
        let report = run(&backend, options(10, false), &log).await;

        assert!(matches!(report.termination, Termination::NoContinuation));
        assert_eq!(report.termination.state(), "EXHAUSTED");
        assert_eq!(report.pages_processed, 3);
        assert_eq!(report.accepted.len(), 6, "every item evaluated");
        assert!(log.contains("Processing page 3 (2 items)..."));
        assert!(log.contains("End of results"));
        assert!(log.contains("Found 6 images"));
    }

    #[tokio::test]
    async fn test_repeated_page_is_duplicate_and_not_filtered() {
        let backend = ScriptedBackend::pages(vec![
            page(&[1], Some(cursor(30))),
            page(&[2], Some(cursor(60))),
            page(&[3, 4], Some(cursor(90))),
            page(&[4, 3], Some(cursor(120))),
        ]);
        let log = MemoryLogSink::new();
        let report = run(&backend, options(10, false), &log).await;

        assert!(matches!(report.termination, Termination::Duplicate { page: 4 }));
        assert_eq!(report.pages_processed, 4);
        let ids: Vec<u64> = report.accepted.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(!log.contains("Processing page 4"));
    }

    #[tokio::test]
    async fn test_page_limit_stops_after_max_pages() {
        let backend = ScriptedBackend::pages(vec![
            page(&[1], Some(cursor(30))),
            page(&[2], Some(cursor(60))),
            page(&[3], Some(cursor(90))),
        ]);
        let log = MemoryLogSink::new();
        let report = run(&backend, options(2, false), &log).await;

        assert!(matches!(report.termination, Termination::LimitReached { max_pages: 2 }));
        assert_eq!(report.pages_processed, 2);
        assert_eq!(backend.request_count(), 2);
    }

    #[tokio::test]
    async fn test_unlimited_ignores_page_limit() {
        let backend = ScriptedBackend::pages(vec![
            page(&[1], Some(cursor(30))),
            page(&[2], Some(cursor(60))),
            page(&[3], None),
        ]);
        let log = MemoryLogSink::new();
        let report = run(&backend, options(1, true), &log).await;

        assert!(matches!(report.termination, Termination::NoContinuation));
        assert_eq!(report.pages_processed, 3);
    }

    #[tokio::test]
    async fn test_repeated_cursor_is_circular_regardless_of_limit() {
        let backend = ScriptedBackend::pages(vec![
            page(&[1], Some(cursor(30))),
            page(&[2], Some(cursor(60))),
            page(&[3], Some(cursor(90))),
            page(&[4], Some(cursor(120))),
            page(&[5], Some(cursor(60))),
        ]);
        let log = MemoryLogSink::new();
        let report = run(&backend, options(5, false), &log).await;

        assert!(matches!(report.termination, Termination::Circular));
        assert_eq!(report.pages_processed, 5);
        assert_eq!(report.accepted.len(), 5, "page 5 is still filtered");
    }

    #[tokio::test]
    async fn test_threshold_filters_items_across_pages() {
        let backend = ScriptedBackend::pages(vec![SearchPage {
            items: vec![item(1, 500), item(2, 1000), item(3, 1500)],
            next_url: None,
        }]);
        let log = MemoryLogSink::new();
        let aggregator = Aggregator::new(
            FilterCriteria {
                popularity_threshold: 1000,
                allow_restricted: false,
            },
            &log,
        );
        let report = run_crawl(&backend, options(5, false), aggregator, &log).await;
        let ids: Vec<u64> = report.accepted.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_empty_page_is_exhausted() {
        let backend = ScriptedBackend::pages(vec![page(&[1], Some(cursor(30))), page(&[], None)]);
        let log = MemoryLogSink::new();
        let report = run(&backend, options(5, false), &log).await;

        assert!(matches!(report.termination, Termination::NoItems { page: 2 }));
        assert_eq!(report.pages_processed, 2);
        assert!(log.contains("Stopping at page 2"));
    }

    #[tokio::test]
    async fn test_request_error_keeps_accepted_items() {
        let backend = ScriptedBackend::new(vec![
            Ok(page(&[1, 2], Some(cursor(30)))),
            Err(ApiError::http_status(cursor(30), 429, Some("Rate Limit".to_string()))),
        ]);
        let log = MemoryLogSink::new();
        let report = run(&backend, options(5, false), &log).await;

        assert!(matches!(report.termination, Termination::Error { page: 2, .. }));
        assert!(report.termination.is_error());
        assert_eq!(report.accepted.len(), 2);
        assert_eq!(report.pages_processed, 1);
        assert!(log.contains("Error fetching page 2"));
        assert_eq!(backend.request_count(), 2, "no retry");
    }

    #[tokio::test]
    async fn test_unparseable_cursor_is_error() {
        let backend = ScriptedBackend::pages(vec![page(&[1], Some("::not a url::".to_string()))]);
        let log = MemoryLogSink::new();
        let report = run(&backend, options(5, false), &log).await;

        assert!(matches!(
            report.termination,
            Termination::Error {
                error: ApiError::Cursor(_),
                ..
            }
        ));
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_first_request_uses_start_page_offset_then_cursor_verbatim() {
        let backend = ScriptedBackend::pages(vec![
            page(&[1], Some(format!("{}&extra=kept", cursor(120)))),
            page(&[2], None),
        ]);
        let log = MemoryLogSink::new();
        let mut opts = options(5, false);
        opts.start_page = 4;
        let report = run(&backend, opts, &log).await;

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[0].offset(), 90);
        assert_eq!(requests[1].offset(), 120);
        assert_eq!(requests[1].get("extra"), Some("kept"));
        assert!(log.contains("Processing page 5 (1 items)..."));
        assert_eq!(report.pages_processed, 2);
    }

    #[tokio::test]
    async fn test_partial_overlap_warns_and_continues() {
        let backend = ScriptedBackend::pages(vec![
            page(&[1, 2, 3], Some(cursor(30))),
            page(&[3, 4, 5], None),
        ]);
        let log = MemoryLogSink::new();
        let report = run(&backend, options(5, false), &log).await;

        assert!(matches!(report.termination, Termination::NoContinuation));
        assert_eq!(report.accepted.len(), 6);
        assert!(log.contains("repeats 1 item(s)"));
    }

    #[tokio::test]
    async fn test_crawl_is_not_restartable() {
        let backend = ScriptedBackend::pages(vec![page(&[1], None)]);
        let log = MemoryLogSink::new();
        let mut crawl = Crawl::new(&backend, options(5, false), &log);

        assert!(crawl.next_page().await.is_some());
        assert!(crawl.next_page().await.is_none());
        assert!(crawl.next_page().await.is_none());
        assert_eq!(backend.request_count(), 1);
        assert!(matches!(crawl.termination(), Some(Termination::NoContinuation)));
    }

    #[tokio::test]
    async fn test_abandoned_crawl_reports_abandoned() {
        let backend = ScriptedBackend::pages(vec![page(&[1], Some(cursor(30)))]);
        let log = MemoryLogSink::new();
        let mut crawl = Crawl::new(&backend, options(5, false), &log);
        assert!(crawl.next_page().await.is_some());
        assert!(matches!(crawl.into_termination(), Termination::Abandoned));
    }

    #[test]
    fn test_safety_cap_reason_mentions_cap() {
        assert!(Termination::SafetyCap.reason().contains("2000"));
        assert_eq!(Termination::SafetyCap.state(), "SAFETY_CAP");
    }

    /// Always returns one fresh item and a fresh cursor.
    #[derive(Default)]
    struct EndlessBackend {
        requests: Mutex<u32>,
    }

    #[async_trait]
    impl SearchBackend for EndlessBackend {
        async fn fetch_page(&self, _params: &SearchParams) -> Result<SearchPage, ApiError> {
            let mut requests = self.requests.lock().unwrap();
            *requests += 1;
            let n = *requests;
            Ok(page(&[u64::from(n)], Some(cursor(n * 30))))
        }
    }

    #[tokio::test]
    async fn test_unlimited_crawl_stops_at_safety_cap() {
        let backend = EndlessBackend::default();
        let log = MemoryLogSink::new();
        let report = run_crawl(
            &backend,
            options(1, true),
            Aggregator::new(everything(), &log),
            &log,
        )
        .await;

        assert!(matches!(report.termination, Termination::SafetyCap));
        assert_eq!(report.pages_processed, SAFETY_CAP_PAGES);
        assert_eq!(*backend.requests.lock().unwrap(), SAFETY_CAP_PAGES);
        assert_eq!(report.accepted.len(), 2000);
    }
}
