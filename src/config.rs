//! Environment-driven configuration, in the shape of the teacher's
//! `Config::from_env` — required fields error out with a clear message,
//! optional fields fall back to documented defaults.

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// `FINMIND_TOKEN` — optional; upgrades rate limits on the fallback
    /// source when present (spec §6).
    pub finmind_token: Option<String>,
    /// `DB_PATH` — directory holding `fundamentals.db`, `quality.db`,
    /// `price.db`. Defaults to `data`.
    pub db_path: String,
    /// Directory for cache entries. Defaults to `cache`.
    pub cache_dir: String,
    /// Directory for progress ledgers and error logs. Defaults to `data`.
    pub progress_dir: String,
    /// Per-factor fetch concurrency (spec §5: default 3-5).
    pub fetch_concurrency: usize,
    /// HTTP client timeout in seconds (spec §5: default 30s).
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let fetch_concurrency = std::env::var("FETCH_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);

        let http_timeout_secs = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Config {
            finmind_token: std::env::var("FINMIND_TOKEN").ok(),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "data".to_string()),
            cache_dir: std::env::var("CACHE_DIR").unwrap_or_else(|_| "cache".to_string()),
            progress_dir: std::env::var("PROGRESS_DIR").unwrap_or_else(|_| "data".to_string()),
            fetch_concurrency,
            http_timeout_secs,
        })
    }

    pub fn fundamentals_db_path(&self) -> String {
        format!("{}/fundamentals.db", self.db_path)
    }

    pub fn quality_db_path(&self) -> String {
        format!("{}/quality.db", self.db_path)
    }

    pub fn price_db_path(&self) -> String {
        format!("{}/price.db", self.db_path)
    }

    pub fn error_log_path(&self, date: chrono::NaiveDate) -> String {
        format!("logs/error-{}.log", date.format("%Y-%m-%d"))
    }

    pub fn progress_ledger_path(&self, session: &str) -> String {
        format!("{}/progress_{}.json", self.progress_dir, session)
    }
}

pub fn parse_date(s: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| AppError::UserInputError(format!("invalid date: {s}")))
}
