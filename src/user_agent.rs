//! Shared User-Agent strings for API and asset HTTP clients.
//!
//! The app API only answers clients that present themselves as the official
//! Android app, so the API User-Agent is a fixed constant rather than a
//! per-version tool identifier. Image hosts, on the other hand, expect a
//! regular desktop browser.

/// User-Agent presented to the OAuth token endpoint and the app API.
///
/// Latest app version can be found via `GET /v1/application-info/android`.
pub const APP_USER_AGENT: &str = "PixivAndroidApp/5.0.234 (Android 11; Pixel 5)";

/// Browser User-Agent used for image downloads from the CDN.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default User-Agent for API requests.
#[must_use]
pub(crate) fn default_api_user_agent() -> &'static str {
    APP_USER_AGENT
}

/// Default User-Agent for asset downloads.
#[must_use]
pub(crate) fn default_download_user_agent() -> &'static str {
    BROWSER_USER_AGENT
}
