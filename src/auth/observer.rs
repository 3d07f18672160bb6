//! Polling loop that merges independent URL observers.
//!
//! Automated capture watches two sources for the redirect carrying the
//! authorization code: the page's address bar and the browser's outgoing
//! network requests. Each source is a [`UrlObserver`]; [`watch_for_code`]
//! polls them on a fixed tick and returns on the first decisive signal.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::capture::{CaptureError, extract_code};

/// Maximum characters of a URL written to debug logs.
pub const LOGGED_URL_MAX_CHARS: usize = 75;

/// What an observer saw since its previous poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// URLs seen since the last poll (possibly none).
    Urls(Vec<String>),
    /// The underlying browser page or session is gone.
    Closed,
}

/// A pollable source of URLs.
#[async_trait]
pub trait UrlObserver: Send {
    /// Name used in log fields.
    fn name(&self) -> &'static str;

    /// Returns what was observed since the previous call.
    async fn poll(&mut self) -> Observation;
}

/// Polls `observers` every `tick` until one yields a URL with a `code`
/// parameter.
///
/// Codes take priority over closure within a tick: if one observer reports a
/// code while another reports the session closed, the code wins.
///
/// # Errors
///
/// - [`CaptureError::Aborted`] when `cancel` resolves first
/// - [`CaptureError::TimedOut`] when `max_wait` elapses
/// - [`CaptureError::SessionClosed`] when an observer reports closure
pub async fn watch_for_code<C>(
    observers: &mut [Box<dyn UrlObserver>],
    tick: Duration,
    max_wait: Duration,
    cancel: C,
) -> Result<String, CaptureError>
where
    C: Future<Output = ()> + Send,
{
    let deadline = Instant::now() + max_wait;
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen: Vec<Option<String>> = vec![None; observers.len()];
    tokio::pin!(cancel);

    loop {
        tokio::select! {
            () = &mut cancel => return Err(CaptureError::Aborted),
            () = tokio::time::sleep_until(deadline) => {
                return Err(CaptureError::TimedOut { secs: max_wait.as_secs() });
            }
            _ = interval.tick() => {
                let mut closed = false;
                for (index, observer) in observers.iter_mut().enumerate() {
                    match observer.poll().await {
                        Observation::Closed => {
                            debug!(observer = observer.name(), "observer reports session closed");
                            closed = true;
                        }
                        Observation::Urls(urls) => {
                            for url in urls {
                                if last_seen[index].as_deref() != Some(url.as_str()) {
                                    debug!(
                                        observer = observer.name(),
                                        url = %truncate_for_log(&url),
                                        "url changed"
                                    );
                                }
                                if let Some(code) = extract_code(&url) {
                                    debug!(observer = observer.name(), "authorization code observed");
                                    return Ok(code);
                                }
                                last_seen[index] = Some(url);
                            }
                        }
                    }
                }
                if closed {
                    return Err(CaptureError::SessionClosed);
                }
            }
        }
    }
}

/// Shortens `url` to [`LOGGED_URL_MAX_CHARS`] characters for log output.
#[must_use]
pub fn truncate_for_log(url: &str) -> String {
    match url.char_indices().nth(LOGGED_URL_MAX_CHARS) {
        Some((byte_index, _)) => format!("{}...", &url[..byte_index]),
        None => url.to_string(),
    }
}
