//! OAuth authentication: PKCE, code capture, token grants, and persistence.
//!
//! # Architecture
//!
//! - [`TokenSessionManager`] - Owns the session; refreshes or runs the login flow
//! - [`OAuthClient`] - Token endpoint client (code exchange, refresh grant)
//! - [`CodeCapture`] - Async trait for obtaining an authorization code
//! - [`CaptureChain`] - Automated capture first, manual prompt as fallback
//! - [`RefreshTokenStore`] - Single-line refresh-token file with env override
//!
//! With the `browser-capture` feature, `BrowserCapture` drives a visible
//! Chrome window and watches for the redirect carrying the code.

#[cfg(feature = "browser-capture")]
mod browser;
mod capture;
mod error;
mod manual;
mod oauth;
mod observer;
mod pkce;
mod session;
mod storage;

#[cfg(feature = "browser-capture")]
pub use browser::{BrowserCapture, CAPTURE_TICK, DEFAULT_CAPTURE_TIMEOUT_SECS};
pub use capture::{CaptureChain, CaptureError, CodeCapture, build_authorize_url, extract_code};
pub use error::AuthError;
pub use manual::{ManualCapture, ManualInput, interpret_manual_input};
pub use oauth::{Credential, OAuthClient};
pub use observer::{LOGGED_URL_MAX_CHARS, Observation, UrlObserver, truncate_for_log, watch_for_code};
pub use pkce::{PkcePair, challenge_for};
pub use session::{ACCESS_TOKEN_REFRESH_MARGIN, TokenSessionManager};
pub use storage::{
    APP_CONFIG_DIR_NAME, REFRESH_TOKEN_ENV, RefreshTokenStore, StorageError, TokenSource,
    default_config_dir, default_token_path,
};
