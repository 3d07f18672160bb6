//! Error types for the app API and token endpoint.

use thiserror::Error;

use super::cursor::CursorError;

/// Errors that can occur while talking to the remote API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response. Rate limiting (429) lands here too.
    #[error("HTTP {status} from {url}{}", message_suffix(.message))]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Server-provided error message, if one could be extracted.
        message: Option<String>,
    },

    /// Response body was not the JSON shape we expect.
    #[error("invalid response from {url}: {source}")]
    InvalidResponse {
        /// The URL whose response failed to parse.
        url: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Token endpoint answered without an `access_token`.
    #[error("token endpoint rejected the grant: {message}")]
    TokenRejected {
        /// Summary of the server's error body.
        message: String,
    },

    /// No usable access token for an authenticated request.
    #[error("not authenticated: {reason}")]
    Unauthorized {
        /// Why the session could not provide a token.
        reason: String,
    },

    /// Continuation cursor could not be turned into request parameters.
    #[error(transparent)]
    Cursor(#[from] CursorError),
}

impl ApiError {
    /// Creates a network or timeout error from a reqwest error.
    pub fn from_transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16, message: Option<String>) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            message,
        }
    }

    /// Creates an invalid-response error.
    pub fn invalid_response(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidResponse {
            url: url.into(),
            source,
        }
    }

    /// Creates a token-rejected error.
    pub fn token_rejected(message: impl Into<String>) -> Self {
        Self::TokenRejected {
            message: message.into(),
        }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Returns `true` for transport-level failures (network, timeout, HTTP status).
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. }
        )
    }
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|message| format!(": {message}"))
        .unwrap_or_default()
}
