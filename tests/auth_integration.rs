//! Integration tests for the token session against a mock token endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pixiv_sorter_core::auth::{CaptureError, CodeCapture, OAuthClient};
use pixiv_sorter_core::{
    ApiError, AuthError, Endpoints, MemoryLogSink, RefreshTokenStore, TokenSessionManager,
};
mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Capture that returns a fixed outcome and remembers the URL it was given.
struct ScriptedCapture {
    outcome: Option<Result<String, CaptureError>>,
    seen_url: Arc<Mutex<Option<String>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedCapture {
    fn code(code: &str) -> (Box<dyn CodeCapture>, Arc<Mutex<Option<String>>>) {
        Self::with_outcome(Ok(code.to_string()))
    }

    fn aborting() -> (Box<dyn CodeCapture>, Arc<Mutex<Option<String>>>) {
        Self::with_outcome(Err(CaptureError::Aborted))
    }

    fn with_outcome(
        outcome: Result<String, CaptureError>,
    ) -> (Box<dyn CodeCapture>, Arc<Mutex<Option<String>>>) {
        let seen_url = Arc::new(Mutex::new(None));
        let capture = Self {
            outcome: Some(outcome),
            seen_url: Arc::clone(&seen_url),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        (Box::new(capture), seen_url)
    }

    fn counted_code(code: &str) -> (Box<dyn CodeCapture>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let capture = Self {
            outcome: Some(Ok(code.to_string())),
            seen_url: Arc::new(Mutex::new(None)),
            calls: Arc::clone(&calls),
        };
        (Box::new(capture), calls)
    }
}

#[async_trait]
impl CodeCapture for ScriptedCapture {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn capture(&mut self, authorize_url: &str) -> Result<String, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_url.lock().unwrap() = Some(authorize_url.to_string());
        self.outcome
            .take()
            .unwrap_or(Err(CaptureError::Automation("capture used twice".to_string())))
    }
}

fn token_body(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 3600,
        "token_type": "bearer",
    })
}

fn session(
    server: &MockServer,
    store: RefreshTokenStore,
    capture: Box<dyn CodeCapture>,
    log: &MemoryLogSink,
) -> TokenSessionManager {
    let endpoints = Endpoints::with_base_url(&server.uri());
    TokenSessionManager::new(&endpoints, store, capture, Arc::new(log.clone())).unwrap()
}

#[tokio::test]
async fn test_refresh_rotation_replaces_stored_token() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let token_path = temp_dir.path().join("refresh_token");
    std::fs::write(&token_path, "old-token\n").unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-token"))
        .and(body_string_contains("include_policy=true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", "new-token")))
        .expect(1)
        .mount(&server)
        .await;

    let log = MemoryLogSink::new();
    let (capture, seen_url) = ScriptedCapture::aborting();
    let manager = session(&server, RefreshTokenStore::new(&token_path), capture, &log);

    manager.ensure_session().await.unwrap();

    assert!(manager.is_authenticated().await);
    assert_eq!(manager.access_token().await.unwrap(), "access-1");
    assert_eq!(std::fs::read_to_string(&token_path).unwrap().trim(), "new-token");
    assert!(seen_url.lock().unwrap().is_none(), "no login flow expected");
    assert!(log.contains("Authenticated."));
}

#[tokio::test]
async fn test_rejected_token_falls_back_to_authorization() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let token_path = temp_dir.path().join("refresh_token");
    std::fs::write(&token_path, "stale\n").unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("refresh_token=stale"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "has_error": true,
            "errors": {"system": {"message": "Invalid refresh token"}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-a", "fresh")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("refresh_token=fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-b", "fresh-2")))
        .expect(1)
        .mount(&server)
        .await;

    let log = MemoryLogSink::new();
    let (capture, seen_url) = ScriptedCapture::code("the-code");
    let manager = session(&server, RefreshTokenStore::new(&token_path), capture, &log);

    manager.ensure_session().await.unwrap();

    assert_eq!(manager.access_token().await.unwrap(), "access-b");
    assert_eq!(std::fs::read_to_string(&token_path).unwrap().trim(), "fresh-2");

    let authorize_url = seen_url.lock().unwrap().clone().unwrap();
    assert!(authorize_url.starts_with(&format!("{}/web/v1/login?", server.uri())));
    assert!(authorize_url.contains("code_challenge="));
    assert!(authorize_url.contains("code_challenge_method=S256"));
    assert!(authorize_url.contains("client=pixiv-android"));
    assert!(log.contains("Saved token rejected"));
}

#[tokio::test]
async fn test_aborted_capture_aborts_session_without_writing_store() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let token_path = temp_dir.path().join("refresh_token");

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a", "r")))
        .expect(0)
        .mount(&server)
        .await;

    let log = MemoryLogSink::new();
    let (capture, _) = ScriptedCapture::aborting();
    let manager = session(&server, RefreshTokenStore::new(&token_path), capture, &log);

    let error = manager.ensure_session().await.unwrap_err();
    assert!(error.is_aborted(), "unexpected error: {error}");
    assert!(!manager.is_authenticated().await);
    assert!(!token_path.exists());
}

#[tokio::test]
async fn test_env_override_is_used_and_rotation_lands_in_file() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let token_path = temp_dir.path().join("refresh_token");

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("refresh_token=from-env"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access", "rotated")))
        .expect(1)
        .mount(&server)
        .await;

    let store =
        RefreshTokenStore::new(&token_path).with_env_override(Some("from-env".to_string()));
    let log = MemoryLogSink::new();
    let (capture, _) = ScriptedCapture::aborting();
    let manager = session(&server, store, capture, &log);

    manager.ensure_session().await.unwrap();
    assert_eq!(std::fs::read_to_string(&token_path).unwrap().trim(), "rotated");
}

#[tokio::test]
async fn test_token_endpoint_success_status_without_access_token_is_rejected() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "has_error": true,
            "errors": {"system": {"message": "Invalid grant"}}
        })))
        .mount(&server)
        .await;

    let client = OAuthClient::new(&Endpoints::with_base_url(&server.uri())).unwrap();
    let error = client.refresh("whatever").await.unwrap_err();

    match error {
        ApiError::TokenRejected { message } => assert!(message.contains("Invalid grant")),
        other => panic!("expected TokenRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_explicit_refresh_stores_rotated_token() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let token_path = temp_dir.path().join("nested").join("refresh_token");

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("refresh_token=given"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access", "next")))
        .expect(1)
        .mount(&server)
        .await;

    let log = MemoryLogSink::new();
    let (capture, _) = ScriptedCapture::aborting();
    let manager = session(&server, RefreshTokenStore::new(&token_path), capture, &log);

    manager.refresh("given").await.unwrap();
    assert_eq!(std::fs::read_to_string(&token_path).unwrap().trim(), "next");
}

#[tokio::test]
async fn test_refresh_failure_after_code_exchange_is_auth_failure() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let token_path = temp_dir.path().join("refresh_token");

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=one-shot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-a", "issued")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=issued"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "has_error": true,
            "errors": {"system": {"message": "Invalid refresh token"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let log = MemoryLogSink::new();
    let (capture, calls) = ScriptedCapture::counted_code("one-shot");
    let manager = session(&server, RefreshTokenStore::new(&token_path), capture, &log);

    let error = manager.ensure_session().await.unwrap_err();

    assert!(matches!(error, AuthError::Failed { .. }), "unexpected error: {error:?}");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "login must not be retried");
    assert!(!manager.is_authenticated().await);
    assert_eq!(std::fs::read_to_string(&token_path).unwrap().trim(), "issued");
}

#[tokio::test]
async fn test_access_token_near_expiry_refreshes_with_rotated_token() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let token_path = temp_dir.path().join("refresh_token");
    std::fs::write(&token_path, "r0\n").unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("refresh_token=r0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a1",
            "refresh_token": "r1",
            "expires_in": 1,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_string_contains("refresh_token=r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a2", "r2")))
        .expect(1)
        .mount(&server)
        .await;

    let log = MemoryLogSink::new();
    let (capture, seen_url) = ScriptedCapture::aborting();
    let manager = session(&server, RefreshTokenStore::new(&token_path), capture, &log);

    manager.ensure_session().await.unwrap();
    assert_eq!(std::fs::read_to_string(&token_path).unwrap().trim(), "r1");

    assert_eq!(manager.access_token().await.unwrap(), "a2");
    assert_eq!(std::fs::read_to_string(&token_path).unwrap().trim(), "r2");
    assert_eq!(manager.access_token().await.unwrap(), "a2", "fresh token is reused");
    assert!(seen_url.lock().unwrap().is_none());
}
