use std::path::PathBuf;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Shared directory lead files are written to.
    pub output_dir: PathBuf,
    /// Directory holding job history and engine state files.
    pub data_dir: PathBuf,
    pub max_concurrent_jobs: usize,
    /// Headless browser binary for the map-listing engine.
    pub chrome_binary: String,
    /// Search helper command for the primary search engine.
    pub search_cli_command: String,
    /// Seconds a single stage invocation may run before counting as failed.
    pub unit_timeout_secs: u64,
    /// CountriesNow-compatible base URL; metadata checks are skipped if unset.
    pub countries_api_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            output_dir: env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| "leads".to_string())
                .into(),
            data_dir: env::var("DATA_DIR")
                .unwrap_or_else(|_| "data".to_string())
                .into(),
            max_concurrent_jobs: env::var("MAX_CONCURRENT_JOBS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("MAX_CONCURRENT_JOBS must be a valid number")?,
            chrome_binary: env::var("CHROME_BINARY").unwrap_or_else(|_| "chromium".to_string()),
            search_cli_command: env::var("SEARCH_CLI_COMMAND")
                .unwrap_or_else(|_| "google-search".to_string()),
            unit_timeout_secs: env::var("UNIT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .context("UNIT_TIMEOUT_SECS must be a valid number")?,
            countries_api_url: env::var("COUNTRIES_API_URL").ok(),
        })
    }
}
