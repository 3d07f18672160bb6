//! Shared HTTP client construction policy.
//!
//! Both the API client and the asset downloader build their `reqwest::Client`
//! here so timeout and compression settings stay consistent.

use std::time::Duration;

use reqwest::Client;

/// Default connect timeout for every client (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default per-request timeout for API calls (30 seconds).
pub const API_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Per-request timeout for image downloads (15 seconds).
pub const DOWNLOAD_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Builds an HTTP client with the given User-Agent and timeouts.
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] when the client cannot be built.
pub fn build_http_client(
    user_agent: &str,
    connect_timeout_secs: u64,
    request_timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(request_timeout_secs))
        .gzip(true)
        .user_agent(user_agent)
        .build()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client_with_defaults_succeeds() {
        let client = build_http_client("test-agent", CONNECT_TIMEOUT_SECS, API_REQUEST_TIMEOUT_SECS);
        assert!(client.is_ok(), "client should build: {:?}", client.err());
    }

    #[test]
    fn test_build_http_client_with_download_timeout_succeeds() {
        assert!(
            build_http_client("Mozilla/5.0", CONNECT_TIMEOUT_SECS, DOWNLOAD_REQUEST_TIMEOUT_SECS)
                .is_ok()
        );
    }
}
