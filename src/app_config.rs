//! Application configuration loading for CLI defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use pixiv_sorter_core::auth::default_config_dir;

pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_THRESHOLD: u64 = 1000;
pub const DEFAULT_PAGES: u32 = 5;
pub const DEFAULT_DELAY_SECS: f64 = 2.5;
pub const DEFAULT_START_PAGE: u32 = 1;
pub const DEFAULT_OUTPUT_DIR: &str = "results";
pub const DEFAULT_DOWNLOAD_DIR: &str = "download";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 600;

/// TOML-backed file configuration for search defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Minimum bookmark count.
    pub threshold: Option<u64>,
    /// Pages per search (same range as CLI).
    pub pages: Option<u32>,
    /// Delay between page requests in seconds.
    pub delay_secs: Option<f64>,
    /// 1-based start page.
    pub start_page: Option<u32>,
    /// Include age-restricted items.
    pub r18: Option<bool>,
    /// Ignore `pages` and crawl until results run out.
    pub no_limit: Option<bool>,
    /// Download accepted images.
    pub auto_download: Option<bool>,
    /// Report directory.
    pub output_dir: Option<PathBuf>,
    /// Base directory for downloads.
    pub download_dir: Option<PathBuf>,
    /// Refresh-token file.
    pub token_file: Option<PathBuf>,
    /// API request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Try the automated browser login before the manual prompt.
    pub browser_capture: Option<bool>,
    /// Seconds to wait for the browser login.
    pub capture_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(pages) = self.pages
            && pages == 0
        {
            bail!("Invalid config value for `pages`: {pages}. Expected at least 1");
        }

        if let Some(start_page) = self.start_page
            && start_page == 0
        {
            bail!("Invalid config value for `start_page`: {start_page}. Expected at least 1");
        }

        if let Some(delay) = self.delay_secs
            && !(0.0..=60.0).contains(&delay)
        {
            bail!("Invalid config value for `delay_secs`: {delay}. Expected range: 0..=60");
        }

        validate_timeout_secs("request_timeout_secs", self.request_timeout_secs)?;
        validate_timeout_secs("capture_timeout_secs", self.capture_timeout_secs)?;

        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/pixiv-sorter/config.toml`
/// 2. `$HOME/.config/pixiv-sorter/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    default_config_dir()
        .ok()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
        loaded_from_file: true,
    })
}

pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Values given explicitly on the command line. `None` defers to the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsOverrides {
    pub threshold: Option<u64>,
    pub pages: Option<u32>,
    pub delay_secs: Option<f64>,
    pub start_page: Option<u32>,
    pub r18: Option<bool>,
    pub no_limit: Option<bool>,
    pub auto_download: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
    pub token_file: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub browser_capture: Option<bool>,
    pub capture_timeout_secs: Option<u64>,
}

/// Effective settings: CLI, then config file, then built-in defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub threshold: u64,
    pub pages: u32,
    pub delay: Duration,
    pub start_page: u32,
    pub r18: bool,
    pub no_limit: bool,
    pub auto_download: bool,
    pub output_dir: PathBuf,
    pub download_dir: PathBuf,
    /// `None` means the default token location.
    pub token_file: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub browser_capture: bool,
    pub capture_timeout_secs: u64,
}

impl Settings {
    #[must_use]
    pub fn resolve(cli: &SettingsOverrides, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();
        let delay_secs = cli
            .delay_secs
            .or(file.delay_secs)
            .unwrap_or(DEFAULT_DELAY_SECS);

        Self {
            threshold: cli.threshold.or(file.threshold).unwrap_or(DEFAULT_THRESHOLD),
            pages: cli.pages.or(file.pages).unwrap_or(DEFAULT_PAGES),
            delay: Duration::from_secs_f64(delay_secs.clamp(0.0, 60.0)),
            start_page: cli
                .start_page
                .or(file.start_page)
                .unwrap_or(DEFAULT_START_PAGE),
            r18: cli.r18.or(file.r18).unwrap_or(false),
            no_limit: cli.no_limit.or(file.no_limit).unwrap_or(false),
            auto_download: cli.auto_download.or(file.auto_download).unwrap_or(false),
            output_dir: cli
                .output_dir
                .clone()
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            download_dir: cli
                .download_dir
                .clone()
                .or(file.download_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR)),
            token_file: cli.token_file.clone().or(file.token_file),
            request_timeout_secs: cli
                .request_timeout_secs
                .or(file.request_timeout_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            browser_capture: cli
                .browser_capture
                .or(file.browser_capture)
                .unwrap_or(cfg!(feature = "browser-capture")),
            capture_timeout_secs: cli
                .capture_timeout_secs
                .or(file.capture_timeout_secs)
                .unwrap_or(DEFAULT_CAPTURE_TIMEOUT_SECS),
        }
    }
}
