//! Automated authorization-code capture through a controlled Chrome window.
//!
//! The user logs in inside a visible browser. Two observers watch for the
//! redirect carrying the code: the page's current URL, and every outgoing
//! network request (the final `pixiv://` redirect never commits as a
//! navigation, but it is still requested).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, EventRequestWillBeSent};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::capture::{CaptureError, CodeCapture, interrupt_signal};
use super::observer::{Observation, UrlObserver, watch_for_code};

/// Poll interval for both observers.
pub const CAPTURE_TICK: Duration = Duration::from_secs(1);

/// Default upper bound on how long the user has to complete login.
pub const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 600;

/// Browser-driven [`CodeCapture`].
#[derive(Debug, Clone)]
pub struct BrowserCapture {
    max_wait: Duration,
    chrome_executable: Option<PathBuf>,
}

impl Default for BrowserCapture {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CAPTURE_TIMEOUT_SECS))
    }
}

impl BrowserCapture {
    /// Capture that gives the user at most `max_wait` to log in.
    #[must_use]
    pub fn new(max_wait: Duration) -> Self {
        Self {
            max_wait,
            chrome_executable: None,
        }
    }

    /// Uses a specific Chrome/Chromium binary instead of auto-detection.
    #[must_use]
    pub fn with_chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }
}

#[async_trait]
impl CodeCapture for BrowserCapture {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn capture(&mut self, authorize_url: &str) -> Result<String, CaptureError> {
        let mut session = BrowserSession::launch(self.chrome_executable.as_ref()).await?;

        let result = match session.observers(authorize_url).await {
            Ok(mut observers) => {
                watch_for_code(&mut observers, CAPTURE_TICK, self.max_wait, interrupt_signal()).await
            }
            Err(error) => Err(error),
        };

        session.shutdown().await;
        result
    }
}

/// A launched browser plus its background tasks.
///
/// [`BrowserSession::shutdown`] closes the browser; `Drop` aborts the tasks
/// if shutdown was never reached.
struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    forward_task: Option<JoinHandle<()>>,
}

impl BrowserSession {
    async fn launch(chrome_executable: Option<&PathBuf>) -> Result<Self, CaptureError> {
        let mut builder = BrowserConfig::builder().with_head().window_size(1000, 800);
        if let Some(path) = chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(CaptureError::Automation)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|error| CaptureError::Automation(format!("could not launch Chrome: {error}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(error) = event {
                    debug!(error = %error, "browser handler stopped");
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
            forward_task: None,
        })
    }

    /// Opens the login page and returns the address-bar and network observers.
    async fn observers(
        &mut self,
        authorize_url: &str,
    ) -> Result<Vec<Box<dyn UrlObserver>>, CaptureError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(automation_error)?;

        page.execute(EnableParams::default())
            .await
            .map_err(automation_error)?;
        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(automation_error)?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.forward_task = Some(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                if tx.send(event.request.url.clone()).is_err() {
                    break;
                }
            }
        }));

        page.goto(authorize_url).await.map_err(automation_error)?;

        Ok(vec![
            Box::new(AddressBarObserver { page }),
            Box::new(NetworkObserver { requests: rx }),
        ])
    }

    async fn shutdown(mut self) {
        if let Err(error) = self.browser.close().await {
            debug!(error = %error, "browser close failed (already closed?)");
        }
        if let Err(error) = self.browser.wait().await {
            warn!(error = %error, "browser process did not exit cleanly");
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler_task.abort();
        if let Some(task) = &self.forward_task {
            task.abort();
        }
    }
}

fn automation_error(error: chromiumoxide::error::CdpError) -> CaptureError {
    CaptureError::Automation(error.to_string())
}

struct AddressBarObserver {
    page: Page,
}

#[async_trait]
impl UrlObserver for AddressBarObserver {
    fn name(&self) -> &'static str {
        "address-bar"
    }

    async fn poll(&mut self) -> Observation {
        match self.page.url().await {
            Ok(Some(url)) => Observation::Urls(vec![url]),
            Ok(None) => Observation::Urls(Vec::new()),
            Err(error) => {
                debug!(error = %error, "address bar unavailable");
                Observation::Closed
            }
        }
    }
}

struct NetworkObserver {
    requests: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl UrlObserver for NetworkObserver {
    fn name(&self) -> &'static str {
        "network"
    }

    async fn poll(&mut self) -> Observation {
        let mut urls = Vec::new();
        loop {
            match self.requests.try_recv() {
                Ok(url) => urls.push(url),
                Err(TryRecvError::Empty) => return Observation::Urls(urls),
                Err(TryRecvError::Disconnected) if urls.is_empty() => return Observation::Closed,
                Err(TryRecvError::Disconnected) => return Observation::Urls(urls),
            }
        }
    }
}
