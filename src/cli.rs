//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use pixiv_sorter_core::{SearchTarget, SortOrder};

use crate::app_config::SettingsOverrides;

/// Crawl Pixiv search results and keep only the popular ones.
///
/// Searches illustrations by tag, walks the result pages, and writes an HTML
/// gallery of every item whose bookmark count reaches the threshold.
#[derive(Parser, Debug)]
#[command(name = "pixiv-sorter")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search and write a gallery of popular results
    Search(SearchArgs),

    /// Manage the stored refresh token
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SearchArgs {
    /// Search word (tag or keyword); prompted for when omitted
    pub word: Option<String>,

    /// Minimum bookmark count to keep an item [default: 1000]
    #[arg(short = 't', long)]
    pub threshold: Option<u64>,

    /// Number of pages to search [default: 5]
    #[arg(short = 'p', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: Option<u32>,

    /// Delay between pages in seconds [default: 2.5]
    #[arg(short = 'd', long, value_parser = parse_delay_secs)]
    pub delay: Option<f64>,

    /// Start from this page number [default: 1]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub start_page: Option<u32>,

    /// Include age-restricted content
    #[arg(long)]
    pub r18: bool,

    /// Keep searching until results run out (overrides --pages)
    #[arg(long)]
    pub no_limit: bool,

    /// Download the original image of every accepted item
    #[arg(long)]
    pub download: bool,

    /// Directory for the HTML report [default: results]
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Base directory for downloaded images [default: download]
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Fields the word is matched against (partial, exact, title)
    #[arg(long, default_value_t = SearchTarget::default())]
    pub target: SearchTarget,

    /// Result ordering (date_desc, date_asc, popular_desc)
    #[arg(long, default_value_t = SortOrder::default())]
    pub sort: SortOrder,

    #[command(flatten)]
    pub login: LoginArgs,

    /// Do not open the report in the default browser
    #[arg(long)]
    pub no_open: bool,

    /// API request timeout in seconds (1-3600) [default: 30]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub request_timeout: Option<u64>,
}

impl SearchArgs {
    /// Values given explicitly on the command line.
    #[must_use]
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            threshold: self.threshold,
            pages: self.pages,
            delay_secs: self.delay,
            start_page: self.start_page,
            r18: self.r18.then_some(true),
            no_limit: self.no_limit.then_some(true),
            auto_download: self.download.then_some(true),
            output_dir: self.output_dir.clone(),
            download_dir: self.download_dir.clone(),
            request_timeout_secs: self.request_timeout,
            ..self.login.overrides()
        }
    }
}

/// Options shared by every command that may need to log in.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct LoginArgs {
    /// Refresh-token file [default: <config dir>/pixiv-sorter/refresh_token]
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// Skip the automated browser login and paste the code by hand
    #[arg(long)]
    pub manual_login: bool,

    /// Seconds to wait for the browser login (1-3600) [default: 600]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub capture_timeout: Option<u64>,
}

impl LoginArgs {
    #[must_use]
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            token_file: self.token_file.clone(),
            browser_capture: self.manual_login.then_some(false),
            capture_timeout_secs: self.capture_timeout,
            ..SettingsOverrides::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Run the login flow and store the refresh token
    Login(LoginArgs),

    /// Exchange a refresh token and store the rotated one
    Refresh {
        /// Refresh token to exchange
        refresh_token: String,

        /// Refresh-token file [default: <config dir>/pixiv-sorter/refresh_token]
        #[arg(long)]
        token_file: Option<PathBuf>,
    },

    /// Delete the stored refresh token
    Clear {
        /// Refresh-token file [default: <config dir>/pixiv-sorter/refresh_token]
        #[arg(long)]
        token_file: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
}

fn parse_delay_secs(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if !(0.0..=60.0).contains(&value) {
        return Err(format!("{value} is not in 0..=60"));
    }
    Ok(value)
}
