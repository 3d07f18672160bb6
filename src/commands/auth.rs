//! Auth command handlers: login, refresh, and clear the stored refresh token.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use pixiv_sorter_core::auth::{CaptureChain, CodeCapture, ManualCapture};
use pixiv_sorter_core::{
    AuthError, Endpoints, LogSink, RefreshTokenStore, TokenSessionManager, TracingLogSink,
};
use tracing::{info, warn};

use crate::app_config::{Settings, SettingsOverrides, load_default_file_config};
use crate::cli::LoginArgs;

pub async fn run_auth_login_command(args: &LoginArgs) -> Result<()> {
    let settings = resolve_settings(&args.overrides())?;
    let session = build_session_manager(&Endpoints::default(), &settings, Arc::new(TracingLogSink))?;

    session.login().await.map_err(auth_failure)?;
    info!(path = %session.store().path().display(), "Refresh token stored");
    Ok(())
}

pub async fn run_auth_refresh_command(refresh_token: &str, token_file: Option<PathBuf>) -> Result<()> {
    let settings = resolve_settings(&SettingsOverrides {
        token_file,
        browser_capture: Some(false),
        ..SettingsOverrides::default()
    })?;
    let session = build_session_manager(&Endpoints::default(), &settings, Arc::new(TracingLogSink))?;

    session.refresh(refresh_token).await.map_err(auth_failure)?;
    info!(path = %session.store().path().display(), "Rotated refresh token stored");
    Ok(())
}

pub fn run_auth_clear_command(token_file: Option<PathBuf>) -> Result<()> {
    let settings = resolve_settings(&SettingsOverrides {
        token_file,
        ..SettingsOverrides::default()
    })?;
    let store = RefreshTokenStore::from_env(settings.token_file)
        .context("Failed to resolve refresh-token location")?;

    let removed = store
        .clear()
        .map_err(|error| anyhow!("Failed to clear stored refresh token: {error}"))?;
    if removed {
        info!(path = %store.path().display(), "Cleared stored refresh token");
    } else {
        info!("No stored refresh token found");
    }
    if store.has_env_override() {
        warn!("PIXIV_REFRESH_TOKEN is still set and will be used on the next run");
    }

    Ok(())
}

fn resolve_settings(overrides: &SettingsOverrides) -> Result<Settings> {
    let loaded = load_default_file_config()?;
    Ok(Settings::resolve(overrides, loaded.config.as_ref()))
}

/// Session manager wired to the configured token file and capture chain.
pub(crate) fn build_session_manager(
    endpoints: &Endpoints,
    settings: &Settings,
    log: Arc<dyn LogSink>,
) -> Result<TokenSessionManager> {
    let store = RefreshTokenStore::from_env(settings.token_file.clone())
        .context("Failed to resolve refresh-token location")?;
    TokenSessionManager::new(endpoints, store, build_code_capture(settings), log)
        .context("Failed to initialize token session")
}

fn build_code_capture(settings: &Settings) -> Box<dyn CodeCapture> {
    let manual: Box<dyn CodeCapture> = Box::new(ManualCapture::stdio());
    let automated = if settings.browser_capture {
        automated_capture(settings)
    } else {
        None
    };
    Box::new(CaptureChain::new(automated, manual))
}

#[cfg(feature = "browser-capture")]
fn automated_capture(settings: &Settings) -> Option<Box<dyn CodeCapture>> {
    use std::time::Duration;

    use pixiv_sorter_core::auth::BrowserCapture;

    Some(Box::new(BrowserCapture::new(Duration::from_secs(
        settings.capture_timeout_secs,
    ))))
}

#[cfg(not(feature = "browser-capture"))]
fn automated_capture(_settings: &Settings) -> Option<Box<dyn CodeCapture>> {
    warn!("built without browser-capture; using the manual login prompt");
    None
}

pub(crate) fn auth_failure(error: AuthError) -> anyhow::Error {
    if error.is_aborted() {
        anyhow!("Authorization aborted")
    } else {
        anyhow::Error::new(error).context("Authentication failed")
    }
}
