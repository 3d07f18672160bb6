//! Refresh-token persistence.
//!
//! The long-lived refresh token is stored as a single-line file at
//! `~/.config/pixiv-sorter/refresh_token` (or
//! `$XDG_CONFIG_HOME/pixiv-sorter/refresh_token`). The `PIXIV_REFRESH_TOKEN`
//! environment variable, when set, takes priority on load.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Directory name under the user config root.
pub const APP_CONFIG_DIR_NAME: &str = "pixiv-sorter";

/// Environment variable that overrides the stored refresh token.
pub const REFRESH_TOKEN_ENV: &str = "PIXIV_REFRESH_TOKEN";

const TOKEN_FILE_NAME: &str = "refresh_token";

/// Errors for refresh-token storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No suitable user config directory is available.
    #[error("unable to determine config directory (set XDG_CONFIG_HOME or HOME)")]
    ConfigDirUnavailable,
    /// Filesystem I/O failed.
    #[error("refresh token file {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where a loaded refresh token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// The `PIXIV_REFRESH_TOKEN` environment variable.
    Environment,
    /// The on-disk store.
    File,
}

/// Single-line file store for the refresh token.
#[derive(Debug, Clone)]
pub struct RefreshTokenStore {
    path: PathBuf,
    env_override: Option<String>,
}

impl RefreshTokenStore {
    /// Store backed by `path`, with no environment override.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env_override: None,
        }
    }

    /// Store at `path` (or the default location) honoring `PIXIV_REFRESH_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConfigDirUnavailable`] if no path was given and
    /// no config directory can be resolved.
    pub fn from_env(path: Option<PathBuf>) -> Result<Self, StorageError> {
        let path = match path {
            Some(path) => path,
            None => default_token_path()?,
        };
        let env_override = env::var(REFRESH_TOKEN_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Ok(Self { path, env_override })
    }

    /// Replaces the environment override (mainly for tests and embedding hosts).
    #[must_use]
    pub fn with_env_override(mut self, token: Option<String>) -> Self {
        self.env_override = token.filter(|value| !value.trim().is_empty());
        self
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an environment override is active.
    #[must_use]
    pub fn has_env_override(&self) -> bool {
        self.env_override.is_some()
    }

    /// Loads the candidate refresh token: environment override first, then file.
    ///
    /// Returns `Ok(None)` when neither is present or the file is blank.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file exists but cannot be read.
    pub fn load(&self) -> Result<Option<(String, TokenSource)>, StorageError> {
        if let Some(token) = &self.env_override {
            return Ok(Some((token.clone(), TokenSource::Environment)));
        }

        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.lines().next().unwrap_or_default().trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some((token.to_string(), TokenSource::File)))
                }
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(StorageError::io(&self.path, error)),
        }
    }

    /// Persists `token`, replacing any previous value.
    ///
    /// Writes to a sibling temp file first and renames it into place so a
    /// crash never leaves a truncated token behind.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the directory or file cannot be written.
    pub fn store(&self, token: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|error| StorageError::io(parent, error))?;
        }

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, format!("{}\n", token.trim()))
            .map_err(|error| StorageError::io(&tmp_path, error))?;
        set_owner_only_permissions(&tmp_path)?;
        fs::rename(&tmp_path, &self.path).map_err(|error| {
            let _ = fs::remove_file(&tmp_path);
            StorageError::io(&self.path, error)
        })?;
        debug!(path = %self.path.display(), "refresh token persisted");
        Ok(())
    }

    /// Removes the stored token. Returns whether a file was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool, StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(StorageError::io(&self.path, error)),
        }
    }
}

/// Default refresh-token path.
///
/// # Errors
///
/// Returns [`StorageError::ConfigDirUnavailable`] if no usable config dir is found.
pub fn default_token_path() -> Result<PathBuf, StorageError> {
    Ok(default_config_dir()?.join(TOKEN_FILE_NAME))
}

/// Application config directory (`$XDG_CONFIG_HOME/pixiv-sorter` or
/// `$HOME/.config/pixiv-sorter`).
///
/// # Errors
///
/// Returns [`StorageError::ConfigDirUnavailable`] if neither variable is usable.
pub fn default_config_dir() -> Result<PathBuf, StorageError> {
    resolve_config_dir(
        sanitize_env_path(env::var_os("XDG_CONFIG_HOME")),
        sanitize_env_path(env::var_os("HOME")),
        sanitize_env_path(env::var_os("APPDATA")),
    )
}

fn sanitize_env_path(value: Option<OsString>) -> Option<PathBuf> {
    let value = value?;
    if value.to_string_lossy().trim().is_empty() {
        return None;
    }

    Some(PathBuf::from(value))
}

fn resolve_config_dir(
    xdg_config_home: Option<PathBuf>,
    home: Option<PathBuf>,
    app_data: Option<PathBuf>,
) -> Result<PathBuf, StorageError> {
    if let Some(xdg) = xdg_config_home {
        return Ok(xdg.join(APP_CONFIG_DIR_NAME));
    }
    if let Some(home) = home {
        return Ok(home.join(".config").join(APP_CONFIG_DIR_NAME));
    }
    if let Some(app_data) = app_data {
        return Ok(app_data.join(APP_CONFIG_DIR_NAME));
    }
    Err(StorageError::ConfigDirUnavailable)
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|error| StorageError::io(path, error))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_none() {
        let tempdir = TempDir::new().unwrap();
        let store = RefreshTokenStore::new(tempdir.path().join("refresh_token"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_store_then_load_returns_file_token() {
        let tempdir = TempDir::new().unwrap();
        let store = RefreshTokenStore::new(tempdir.path().join("nested/refresh_token"));
        store.store("  abc123  ").unwrap();
        assert_eq!(
            store.load().unwrap(),
            Some(("abc123".to_string(), TokenSource::File))
        );
    }

    #[test]
    fn test_store_overwrites_previous_value() {
        let tempdir = TempDir::new().unwrap();
        let path = tempdir.path().join("refresh_token");
        let store = RefreshTokenStore::new(&path);
        store.store("old").unwrap();
        store.store("new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_blank_file_is_none() {
        let tempdir = TempDir::new().unwrap();
        let path = tempdir.path().join("refresh_token");
        fs::write(&path, "   \n").unwrap();
        assert!(RefreshTokenStore::new(&path).load().unwrap().is_none());
    }

    #[test]
    fn test_env_override_wins_over_file() {
        let tempdir = TempDir::new().unwrap();
        let store = RefreshTokenStore::new(tempdir.path().join("refresh_token"))
            .with_env_override(Some("from-env".to_string()));
        store.store("from-file").unwrap();
        assert!(store.has_env_override());
        assert_eq!(
            store.load().unwrap(),
            Some(("from-env".to_string(), TokenSource::Environment))
        );
    }

    #[test]
    fn test_blank_env_override_is_ignored() {
        let tempdir = TempDir::new().unwrap();
        let store = RefreshTokenStore::new(tempdir.path().join("refresh_token"))
            .with_env_override(Some("  ".to_string()));
        assert!(!store.has_env_override());
    }

    #[test]
    fn test_clear_reports_whether_file_existed() {
        let tempdir = TempDir::new().unwrap();
        let store = RefreshTokenStore::new(tempdir.path().join("refresh_token"));
        assert!(!store.clear().unwrap());
        store.store("token").unwrap();
        assert!(store.clear().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_store_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tempdir = TempDir::new().unwrap();
        let path = tempdir.path().join("refresh_token");
        RefreshTokenStore::new(&path).store("secret").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_resolve_config_dir_prefers_xdg() {
        let dir = resolve_config_dir(
            Some(PathBuf::from("/xdg")),
            Some(PathBuf::from("/home/u")),
            None,
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/xdg/pixiv-sorter"));
    }

    #[test]
    fn test_resolve_config_dir_falls_back_to_home() {
        let dir = resolve_config_dir(None, Some(PathBuf::from("/home/u")), None).unwrap();
        assert_eq!(dir, PathBuf::from("/home/u/.config/pixiv-sorter"));
    }

    #[test]
    fn test_resolve_config_dir_none_available() {
        assert!(matches!(
            resolve_config_dir(None, None, None),
            Err(StorageError::ConfigDirUnavailable)
        ));
    }

    #[test]
    fn test_sanitize_env_path_rejects_blank() {
        assert!(sanitize_env_path(Some(OsString::from("  "))).is_none());
        assert!(sanitize_env_path(None).is_none());
        assert_eq!(
            sanitize_env_path(Some(OsString::from("/x"))),
            Some(PathBuf::from("/x"))
        );
    }
}
