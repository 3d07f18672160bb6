//! CLI entry point for pixiv-sorter.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app_config;
mod cli;
mod commands;

use cli::{Args, AuthCommand, Command, ConfigCommand};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Args may carry a refresh token, so only the verbosity is logged.
    debug!(verbose = args.verbose, quiet = args.quiet, "CLI arguments parsed");

    match args.command {
        Command::Search(search) => commands::run_search_command(&search).await,
        Command::Auth { command } => match command {
            AuthCommand::Login(login) => commands::run_auth_login_command(&login).await,
            AuthCommand::Refresh {
                refresh_token,
                token_file,
            } => commands::run_auth_refresh_command(&refresh_token, token_file).await,
            AuthCommand::Clear { token_file } => commands::run_auth_clear_command(token_file),
        },
        Command::Config {
            command: ConfigCommand::Show,
        } => commands::run_config_show_command(),
    }
}
