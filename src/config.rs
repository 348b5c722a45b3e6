// Configuration
// Priority: CLI > ENV (.env via dotenvy) > defaults

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// EV Market session agent
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Marketplace API base URL
    #[arg(
        short = 'u',
        long,
        env = "EVMARKET_API_BASE_URL",
        default_value = "http://localhost:8080"
    )]
    pub base_url: String,

    /// Path to the session store database
    #[arg(short = 's', long, env = "EVMARKET_STORE_FILE")]
    pub store_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// Clear the stored session and exit
    #[arg(long)]
    pub logout: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub store_file: PathBuf,
    pub log_level: String,
    pub http_timeout: u64,
    pub logout: bool,
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let store_file = args
            .store_file
            .map(|s| expand_tilde(&s))
            .unwrap_or_else(default_store_file);

        Ok(Config {
            base_url: args.base_url.trim_end_matches('/').to_string(),
            store_file,
            log_level: args.log_level,
            http_timeout: args.http_timeout,
            logout: args.logout,
        })
    }

    /// Validate configuration, creating the store directory if needed.
    pub fn validate(&self) -> Result<()> {
        if let Some(parent) = self.store_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create store directory: {}", parent.display())
                })?;
            }
        }

        Ok(())
    }
}

/// Default session store location under the user's home directory.
fn default_store_file() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".evmarket/session.sqlite3"))
        .unwrap_or_else(|| PathBuf::from("session.sqlite3"))
}

/// Expand tilde (~) in file paths to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}
