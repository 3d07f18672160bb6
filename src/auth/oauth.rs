//! OAuth token endpoint client (authorization-code and refresh-token grants).

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::form_urlencoded;

use crate::api::constants::{CLIENT_ID, CLIENT_SECRET};
use crate::api::{ApiError, Endpoints};
use crate::http::{API_REQUEST_TIMEOUT_SECS, CONNECT_TIMEOUT_SECS, build_http_client};
use crate::user_agent;

/// Access-token lifetime assumed when the server omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Result of a successful grant. Only `refresh_token` is ever persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Short-lived bearer token for API calls.
    pub access_token: String,
    /// Long-lived token for the next refresh grant.
    pub refresh_token: String,
    /// Access-token lifetime.
    pub expires_in: Duration,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    has_error: Option<bool>,
    errors: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

/// Client for the token endpoint.
///
/// Every request carries the fixed client identity, `include_policy=true`,
/// and the app User-Agent.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: Client,
    token_url: String,
    redirect_uri: String,
}

impl OAuthClient {
    /// Creates a client for `endpoints`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn new(endpoints: &Endpoints) -> Result<Self, ApiError> {
        let http = build_http_client(
            user_agent::default_api_user_agent(),
            CONNECT_TIMEOUT_SECS,
            API_REQUEST_TIMEOUT_SECS,
        )
        .map_err(|source| ApiError::from_transport(endpoints.auth_token_url.clone(), source))?;
        Ok(Self {
            http,
            token_url: endpoints.auth_token_url.clone(),
            redirect_uri: endpoints.redirect_uri.clone(),
        })
    }

    /// Exchanges an authorization code and its PKCE verifier for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::TokenRejected`] when the response has no
    /// `access_token`, or a transport error.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<Credential, ApiError> {
        let body = self.form(&[
            ("code", code),
            ("code_verifier", code_verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", &self.redirect_uri),
        ]);
        self.post(body, None).await
    }

    /// Performs a refresh-token grant.
    ///
    /// If the server does not rotate the refresh token, the returned
    /// credential carries the one that was sent.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::TokenRejected`] when the response has no
    /// `access_token`, or a transport error.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<Credential, ApiError> {
        let body = self.form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);
        self.post(body, Some(refresh_token)).await
    }

    fn form(&self, grant: &[(&str, &str)]) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", CLIENT_ID)
            .append_pair("client_secret", CLIENT_SECRET)
            .append_pair("include_policy", "true")
            .extend_pairs(grant.iter())
            .finish()
    }

    async fn post(
        &self,
        body: String,
        previous_refresh_token: Option<&str>,
    ) -> Result<Credential, ApiError> {
        let response = self
            .http
            .post(&self.token_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|source| ApiError::from_transport(self.token_url.clone(), source))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| ApiError::from_transport(self.token_url.clone(), source))?;
        debug!(status = status.as_u16(), "token endpoint responded");

        let parsed: TokenResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(ApiError::http_status(&self.token_url, status.as_u16(), None));
            }
            Err(source) => return Err(ApiError::invalid_response(&self.token_url, source)),
        };

        // Decided by body shape, not status: a 200 without a token is a failure.
        let Some(access_token) = parsed.access_token.filter(|t| !t.is_empty()) else {
            return Err(ApiError::token_rejected(summarize_rejection(
                status.as_u16(),
                parsed.has_error,
                parsed.errors.as_ref().or(parsed.error.as_ref()),
            )));
        };

        let refresh_token = match (parsed.refresh_token.filter(|t| !t.is_empty()), previous_refresh_token) {
            (Some(rotated), _) => rotated,
            (None, Some(previous)) => previous.to_string(),
            (None, None) => {
                return Err(ApiError::token_rejected(
                    "response carried an access token but no refresh token",
                ));
            }
        };

        Ok(Credential {
            access_token,
            refresh_token,
            expires_in: Duration::from_secs(parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)),
        })
    }
}

fn summarize_rejection(
    status: u16,
    has_error: Option<bool>,
    errors: Option<&serde_json::Value>,
) -> String {
    let detail = errors
        .and_then(find_message)
        .unwrap_or_else(|| "no access_token in response".to_string());
    match has_error {
        Some(true) => format!("HTTP {status}, has_error: {detail}"),
        _ => format!("HTTP {status}: {detail}"),
    }
}

/// First `message` string anywhere in an error body, or the whole value.
fn find_message(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) if !text.is_empty() => Some(text.clone()),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|message| message.as_str())
            .filter(|message| !message.is_empty())
            .map(ToString::to_string)
            .or_else(|| map.values().find_map(find_message)),
        serde_json::Value::Array(items) => items.iter().find_map(find_message),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_carries_client_identity() {
        let client = OAuthClient::new(&Endpoints::with_base_url("http://localhost:1"));
        let Ok(client) = client else {
            panic!("client should build");
        };
        let body = client.form(&[("grant_type", "refresh_token"), ("refresh_token", "r/t+1")]);
        assert!(body.starts_with("client_id=MOBrBDS8blbauoSck0ZfDbtuzpyT&client_secret="));
        assert!(body.contains("include_policy=true"));
        assert!(body.contains("grant_type=refresh_token"));
        assert!(body.contains("refresh_token=r%2Ft%2B1"));
    }

    #[test]
    fn test_summarize_rejection_uses_nested_message() {
        let errors = json!({"system": {"message": "Invalid refresh token", "code": 1508}});
        let summary = summarize_rejection(400, Some(true), Some(&errors));
        assert_eq!(summary, "HTTP 400, has_error: Invalid refresh token");
    }

    #[test]
    fn test_summarize_rejection_without_details() {
        assert_eq!(
            summarize_rejection(200, None, None),
            "HTTP 200: no access_token in response"
        );
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential {
            access_token: "secret-access".to_string(),
            refresh_token: "secret-refresh".to_string(),
            expires_in: Duration::from_secs(3600),
        };
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("secret"));
    }
}
