//! Config command handlers: show effective configuration.

use anyhow::Result;
use pixiv_sorter_core::auth::default_token_path;

use crate::app_config::{Settings, SettingsOverrides, load_default_file_config};

pub fn run_config_show_command() -> Result<()> {
    let loaded_config = load_default_file_config()?;
    let effective = Settings::resolve(&SettingsOverrides::default(), loaded_config.config.as_ref());

    let resolved_path = loaded_config.path.as_ref().map_or_else(
        || "<unresolved>".to_string(),
        |path| path.display().to_string(),
    );
    let token_file = match &effective.token_file {
        Some(path) => path.display().to_string(),
        None => default_token_path().map_or_else(
            |_| "<unresolved>".to_string(),
            |path| path.display().to_string(),
        ),
    };

    println!("config_path = {resolved_path}");
    println!(
        "config_file = {}",
        if loaded_config.loaded_from_file {
            "loaded"
        } else {
            "not found (using defaults)"
        }
    );
    println!("threshold = {}", effective.threshold);
    println!("pages = {}", effective.pages);
    println!("delay_secs = {}", effective.delay.as_secs_f64());
    println!("start_page = {}", effective.start_page);
    println!("r18 = {}", effective.r18);
    println!("no_limit = {}", effective.no_limit);
    println!("auto_download = {}", effective.auto_download);
    println!("output_dir = {}", effective.output_dir.display());
    println!("download_dir = {}", effective.download_dir.display());
    println!("token_file = {token_file}");
    println!("request_timeout_secs = {}", effective.request_timeout_secs);
    println!("browser_capture = {}", effective.browser_capture);
    println!("capture_timeout_secs = {}", effective.capture_timeout_secs);

    Ok(())
}
