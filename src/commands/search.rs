//! Search command handler: log in, crawl, filter, report.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use pixiv_sorter_core::crawl::DownloadTarget;
use pixiv_sorter_core::download::unique_download_dir;
use pixiv_sorter_core::{
    Aggregator, AppApiClient, AuthenticatedSearch, CrawlOptions, Endpoints, FilterCriteria,
    ImageDownloader, LogSink, SearchQuery, TracingLogSink, render_report, run_crawl,
};
use tracing::{info, warn};

use super::auth::{auth_failure, build_session_manager};
use crate::app_config::{Settings, load_default_file_config};
use crate::cli::SearchArgs;

pub async fn run_search_command(args: &SearchArgs) -> Result<()> {
    let loaded_config = load_default_file_config()?;
    let settings = Settings::resolve(&args.overrides(), loaded_config.config.as_ref());

    let word = match &args.word {
        Some(word) => word.trim().to_string(),
        None => prompt_search_word()?,
    };
    if word.is_empty() {
        bail!("Search term is required");
    }

    let log: Arc<dyn LogSink> = Arc::new(TracingLogSink);
    let endpoints = Endpoints::default();
    let session = build_session_manager(&endpoints, &settings, Arc::clone(&log))?;
    session.ensure_session().await.map_err(auth_failure)?;

    let api = AppApiClient::new(&endpoints, settings.request_timeout_secs)
        .context("Failed to build API client")?;
    let backend = AuthenticatedSearch::new(&api, &session);

    let options = CrawlOptions {
        query: SearchQuery {
            word: word.clone(),
            target: args.target,
            sort: args.sort,
        },
        start_page: settings.start_page,
        max_pages: settings.pages,
        unlimited: settings.no_limit,
        inter_page_delay: settings.delay,
    };
    let criteria = FilterCriteria {
        popularity_threshold: settings.threshold,
        allow_restricted: settings.r18,
    };

    let downloader = if settings.auto_download {
        Some(ImageDownloader::new().context("Failed to build image downloader")?)
    } else {
        None
    };
    let mut aggregator = Aggregator::new(criteria, log.as_ref());
    if let Some(downloader) = &downloader {
        let dest = unique_download_dir(&settings.download_dir, &word, settings.threshold);
        log.log(&format!("Auto-download enabled. Saving to: {}", dest.display()));
        aggregator = aggregator.with_downloads(DownloadTarget::new(downloader, dest));
    }

    let report = run_crawl(&backend, options, aggregator, log.as_ref()).await;
    if report.termination.is_error() {
        warn!(
            pages = report.pages_processed,
            state = report.termination.state(),
            "Crawl stopped early; reporting the items collected so far"
        );
    }
    if downloader.is_some() {
        info!(
            downloaded = report.downloaded,
            failed = report.download_failures,
            "Downloads finished"
        );
    }

    if report.accepted.is_empty() {
        log.log("No images found with that threshold.");
        return Ok(());
    }

    let output_file = render_report(&report.accepted, &word, settings.threshold, &settings.output_dir)
        .context("Failed to write report")?;
    log.log(&format!("Results saved to: {}", output_file.display()));

    if !args.no_open {
        open_report(&output_file);
    }

    Ok(())
}

fn open_report(path: &Path) {
    if let Err(error) = open::that(path) {
        warn!(path = %path.display(), error = %error, "Could not open report in browser");
    }
}

fn prompt_search_word() -> Result<String> {
    print!("Enter search term: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read search term")?;
    Ok(line.trim().to_string())
}
