//! Authorization-code capture strategies.
//!
//! The authorization step needs the one-time `code` the login page hands to
//! the app's redirect URI. [`CodeCapture`] abstracts how that code is
//! obtained; [`CaptureChain`] runs the automated strategy first and falls back
//! to the manual one.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};
use url::form_urlencoded;

use crate::api::constants::LOGIN_CLIENT;

/// Errors produced by a capture strategy.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The browser session ended before a code was observed.
    #[error("browser session closed before an authorization code was captured")]
    SessionClosed,

    /// The automation layer failed (launch, navigation, protocol error).
    #[error("browser automation failed: {0}")]
    Automation(String),

    /// The user interrupted the flow (Ctrl-C or end of input).
    #[error("authorization aborted by user")]
    Aborted,

    /// No code was observed within the configured wait.
    #[error("timed out after {secs}s waiting for an authorization code")]
    TimedOut {
        /// Configured wait in seconds.
        secs: u64,
    },

    /// Terminal I/O for the manual prompt failed.
    #[error("prompt I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Whether this failure should stop the whole authorization flow instead
    /// of falling back to another strategy.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// One way of obtaining an authorization code for an authorize URL.
#[async_trait]
pub trait CodeCapture: Send {
    /// Short name for log lines.
    fn name(&self) -> &'static str;

    /// Obtains the code for `authorize_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError`] when no code could be obtained.
    async fn capture(&mut self, authorize_url: &str) -> Result<String, CaptureError>;
}

/// Resolves on Ctrl-C. Never resolves if the signal handler cannot be
/// installed.
pub(crate) async fn interrupt_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Builds the login URL carrying the PKCE challenge.
#[must_use]
pub fn build_authorize_url(login_url: &str, code_challenge: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("code_challenge", code_challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("client", LOGIN_CLIENT)
        .finish();
    format!("{login_url}?{query}")
}

/// Extracts a non-empty `code` query parameter from a URL-ish string.
///
/// Works for full URLs, custom-scheme redirect URIs (`pixiv://...?code=`),
/// and bare query strings. Fragments are ignored.
#[must_use]
pub fn extract_code(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or_default();
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, value)| key == "code" && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}

/// Automated-then-manual capture.
pub struct CaptureChain {
    automated: Option<Box<dyn CodeCapture>>,
    manual: Box<dyn CodeCapture>,
}

impl CaptureChain {
    /// Chain with an optional automated strategy ahead of the manual one.
    #[must_use]
    pub fn new(automated: Option<Box<dyn CodeCapture>>, manual: Box<dyn CodeCapture>) -> Self {
        Self { automated, manual }
    }

    /// Manual-only chain.
    #[must_use]
    pub fn manual_only(manual: Box<dyn CodeCapture>) -> Self {
        Self::new(None, manual)
    }
}

impl std::fmt::Debug for CaptureChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureChain")
            .field("automated", &self.automated.as_ref().map(|c| c.name()))
            .field("manual", &self.manual.name())
            .finish()
    }
}

#[async_trait]
impl CodeCapture for CaptureChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn capture(&mut self, authorize_url: &str) -> Result<String, CaptureError> {
        if let Some(automated) = self.automated.as_mut() {
            info!("Opening browser for login ({})...", automated.name());
            match automated.capture(authorize_url).await {
                Ok(code) => return Ok(code),
                Err(error) if error.is_abort() => return Err(error),
                Err(error) => {
                    warn!(error = %error, "automated capture failed, falling back to manual entry");
                }
            }
        }
        self.manual.capture(authorize_url).await
    }
}
