//! Authenticated session lifecycle.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::capture::{CodeCapture, build_authorize_url};
use super::error::AuthError;
use super::oauth::{Credential, OAuthClient};
use super::pkce::PkcePair;
use super::storage::{REFRESH_TOKEN_ENV, RefreshTokenStore, TokenSource};
use crate::api::Endpoints;
use crate::log_sink::LogSink;

/// Refresh this long before the access token's stated expiry.
pub const ACCESS_TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct ActiveSession {
    credential: Credential,
    obtained_at: Instant,
    source: TokenSource,
}

impl ActiveSession {
    fn needs_refresh(&self) -> bool {
        self.expired_after(self.obtained_at.elapsed())
    }

    fn expired_after(&self, elapsed: Duration) -> bool {
        elapsed
            >= self
                .credential
                .expires_in
                .saturating_sub(ACCESS_TOKEN_REFRESH_MARGIN)
    }
}

/// Owns the refresh token, the current access token, and the login flow.
///
/// Constructed once per run and passed by reference to the crawl.
pub struct TokenSessionManager {
    oauth: OAuthClient,
    store: RefreshTokenStore,
    login_url: String,
    capture: Mutex<Box<dyn CodeCapture>>,
    active: Mutex<Option<ActiveSession>>,
    log: Arc<dyn LogSink>,
}

impl fmt::Debug for TokenSessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSessionManager")
            .field("store", &self.store.path())
            .field("login_url", &self.login_url)
            .finish_non_exhaustive()
    }
}

impl TokenSessionManager {
    /// Creates a manager. No network traffic happens until a session is
    /// requested.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Token`] if the HTTP client cannot be built.
    pub fn new(
        endpoints: &Endpoints,
        store: RefreshTokenStore,
        capture: Box<dyn CodeCapture>,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            oauth: OAuthClient::new(endpoints)?,
            store,
            login_url: endpoints.login_url.clone(),
            capture: Mutex::new(capture),
            active: Mutex::new(None),
            log,
        })
    }

    /// The refresh-token store in use.
    #[must_use]
    pub fn store(&self) -> &RefreshTokenStore {
        &self.store
    }

    /// Establishes an authenticated session.
    ///
    /// Tries the stored (or environment) refresh token first. If there is none,
    /// or the refresh fails, runs the full authorization flow, persists the
    /// new refresh token, and retries the refresh grant with it exactly once.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Aborted`] if the user interrupts authorization
    /// - [`AuthError::Failed`] if the retry after authorization also fails
    /// - [`AuthError::Storage`] if the token file cannot be read or written
    #[instrument(skip(self))]
    pub async fn ensure_session(&self) -> Result<(), AuthError> {
        if self.active.lock().await.is_some() {
            return Ok(());
        }

        match self.store.load()? {
            Some((token, source)) => {
                self.log.log("Refreshing session with saved token...");
                match self.apply_refresh(&token, source).await {
                    Ok(()) => {
                        self.log.log("Authenticated.");
                        return Ok(());
                    }
                    Err(error) => {
                        warn!(error = %error, "stored refresh token was not accepted");
                        self.log
                            .log(&format!("Saved token rejected ({error}); starting login."));
                    }
                }
            }
            None => {
                self.log.log("No saved refresh token; starting login.");
            }
        }

        self.authorize().await
    }

    /// Runs the authorization-code flow regardless of stored state.
    ///
    /// # Errors
    ///
    /// Same as [`Self::ensure_session`].
    #[instrument(skip(self))]
    pub async fn login(&self) -> Result<(), AuthError> {
        self.authorize().await
    }

    /// Performs one refresh grant with an explicit token and persists the
    /// rotated token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Token`] if the grant fails.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.apply_refresh(refresh_token.trim(), TokenSource::File)
            .await
    }

    /// Current access token, refreshed first when it is near expiry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Failed`] if there is no session, or
    /// [`AuthError::Token`] if the refresh grant fails.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut active = self.active.lock().await;
        let Some(session) = active.as_ref() else {
            return Err(AuthError::failed("no active session"));
        };
        if !session.needs_refresh() {
            return Ok(session.credential.access_token.clone());
        }

        debug!("access token near expiry, refreshing");
        let refresh_token = session.credential.refresh_token.clone();
        let source = session.source;
        let refreshed = self.grant_refresh(&refresh_token, source).await?;
        let access_token = refreshed.credential.access_token.clone();
        *active = Some(refreshed);
        Ok(access_token)
    }

    /// Whether a session has been established.
    pub async fn is_authenticated(&self) -> bool {
        self.active.lock().await.is_some()
    }

    async fn authorize(&self) -> Result<(), AuthError> {
        let pkce = PkcePair::generate();
        let authorize_url = build_authorize_url(&self.login_url, pkce.challenge());

        let code = {
            let mut capture = self.capture.lock().await;
            capture.capture(&authorize_url).await?
        };
        self.log.log("Authorization code received; exchanging for tokens...");

        let credential = self.oauth.exchange_code(&code, pkce.verifier()).await?;
        self.store.store(&credential.refresh_token)?;
        info!(path = %self.store.path().display(), "refresh token saved");

        match self.apply_refresh(&credential.refresh_token, TokenSource::File).await {
            Ok(()) => {
                self.log.log("Authenticated.");
                Ok(())
            }
            Err(error) => Err(AuthError::failed(format!(
                "refresh with the newly issued token failed: {error}"
            ))),
        }
    }

    async fn apply_refresh(&self, refresh_token: &str, source: TokenSource) -> Result<(), AuthError> {
        let session = self.grant_refresh(refresh_token, source).await?;
        *self.active.lock().await = Some(session);
        Ok(())
    }

    /// One refresh grant plus persistence. Does not touch `active`, so callers
    /// holding its lock can use it.
    async fn grant_refresh(
        &self,
        refresh_token: &str,
        source: TokenSource,
    ) -> Result<ActiveSession, AuthError> {
        let credential = self.oauth.refresh(refresh_token).await?;
        self.store.store(&credential.refresh_token)?;

        let rotated = credential.refresh_token != refresh_token;
        if rotated && source == TokenSource::Environment {
            warn!(
                path = %self.store.path().display(),
                "{REFRESH_TOKEN_ENV} is now stale; the rotated token was saved to the token file"
            );
            self.log.log(&format!(
                "Note: {REFRESH_TOKEN_ENV} was rotated by the server and is now stale; \
                 the new token was saved to {}.",
                self.store.path().display()
            ));
        }

        // After rotation the file holds the live token, even if it came from env.
        let source = if rotated { TokenSource::File } else { source };
        Ok(ActiveSession {
            credential,
            obtained_at: Instant::now(),
            source,
        })
    }
}
