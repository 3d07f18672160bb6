//! CLI command handlers.

mod auth;
mod config;
mod search;

pub use auth::{run_auth_clear_command, run_auth_login_command, run_auth_refresh_command};
pub use config::run_config_show_command;
pub use search::run_search_command;
