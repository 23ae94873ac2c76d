//! Environment-driven configuration.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_NBU_BASE_URL: &str = "https://bank.gov.ua";
pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Shared secret for the trigger endpoint. Empty ⇒ auth disabled.
    pub api_token: String,
    pub bind: String,
    pub port: u16,
    pub service_account_path: PathBuf,
    pub spreadsheet_id: String,
    pub worksheet: String,
    /// Base URLs are overridable so tests can point at a local fake.
    pub nbu_base_url: String,
    pub sheets_base_url: String,
    pub fetch_attempts: usize,
    pub fetch_backoff_ms: u64,
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Read the full configuration from the environment.
    ///
    /// `SPREADSHEET_ID` is the only required variable.
    pub fn from_env() -> Result<Self> {
        let spreadsheet_id = env::var("SPREADSHEET_ID")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("SPREADSHEET_ID must be set")?;

        Ok(Self {
            api_token: env_str("API_TOKEN", ""),
            bind: env_str("BIND_ADDR", "0.0.0.0"),
            port: env_parsed("PORT", 8080),
            service_account_path: PathBuf::from(env_str(
                "GOOGLE_SERVICE_ACCOUNT_JSON",
                "service_account.json",
            )),
            spreadsheet_id,
            worksheet: env_str("WORKSHEET_NAME", "rates"),
            nbu_base_url: env_str("NBU_BASE_URL", DEFAULT_NBU_BASE_URL),
            sheets_base_url: env_str("SHEETS_BASE_URL", DEFAULT_SHEETS_BASE_URL),
            fetch_attempts: env_parsed("NBU_RETRIES", 4),
            fetch_backoff_ms: env_parsed("NBU_BACKOFF_MS", 800),
        })
    }
}
