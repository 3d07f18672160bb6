//! HTTP client for the app API search endpoint.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::constants::Endpoints;
use super::cursor::SearchParams;
use super::error::ApiError;
use super::models::{RawSearchResponse, SearchPage};
use super::SearchBackend;
use crate::auth::TokenSessionManager;
use crate::http::{CONNECT_TIMEOUT_SECS, build_http_client};
use crate::user_agent;

/// Client for the illustration search endpoint.
///
/// Created once per run and reused across pages for connection pooling.
#[derive(Debug, Clone)]
pub struct AppApiClient {
    http: Client,
    search_url: String,
}

impl AppApiClient {
    /// Creates a client for the given endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn new(endpoints: &Endpoints, request_timeout_secs: u64) -> Result<Self, ApiError> {
        let search_url = endpoints.search_url();
        let http = build_http_client(
            user_agent::default_api_user_agent(),
            CONNECT_TIMEOUT_SECS,
            request_timeout_secs,
        )
        .map_err(|source| ApiError::from_transport(search_url.clone(), source))?;
        Ok(Self { http, search_url })
    }

    /// Issues one search request with an explicit access token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for transport failures, non-success statuses, and
    /// unparseable bodies.
    #[instrument(skip(self, access_token, params), fields(offset = params.offset()))]
    pub async fn search_illust(
        &self,
        access_token: &str,
        params: &SearchParams,
    ) -> Result<SearchPage, ApiError> {
        let url = format!("{}?{}", self.search_url, params.to_query_string());
        debug!(url = %url, "requesting search page");

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|source| ApiError::from_transport(url.clone(), source))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ApiError::from_transport(url.clone(), source))?;

        if !status.is_success() {
            return Err(ApiError::http_status(
                url,
                status.as_u16(),
                extract_error_message(&body),
            ));
        }

        let raw: RawSearchResponse =
            serde_json::from_str(&body).map_err(|source| ApiError::invalid_response(&url, source))?;
        let page = SearchPage::from(raw);
        debug!(
            items = page.items.len(),
            has_next = page.next_url.is_some(),
            "received search page"
        );
        Ok(page)
    }
}

/// Search backend that draws access tokens from a session manager.
///
/// The session refreshes the access token transparently when it nears
/// expiry, so long crawls keep working past the token lifetime.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedSearch<'a> {
    client: &'a AppApiClient,
    session: &'a TokenSessionManager,
}

impl<'a> AuthenticatedSearch<'a> {
    /// Pairs a search client with an authenticated session.
    #[must_use]
    pub fn new(client: &'a AppApiClient, session: &'a TokenSessionManager) -> Self {
        Self { client, session }
    }
}

#[async_trait]
impl SearchBackend for AuthenticatedSearch<'_> {
    async fn fetch_page(&self, params: &SearchParams) -> Result<SearchPage, ApiError> {
        let access_token = self
            .session
            .access_token()
            .await
            .map_err(|error| ApiError::unauthorized(error.to_string()))?;
        self.client.search_illust(&access_token, params).await
    }
}

/// Error envelope returned by the app API on failure.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    user_message: Option<String>,
    reason: Option<String>,
}

fn extract_error_message(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let error = envelope.error?;
    [error.message, error.user_message, error.reason]
        .into_iter()
        .flatten()
        .map(|message| message.trim().to_string())
        .find(|message| !message.is_empty())
}
