//! Crate-wide error taxonomy.
//!
//! Mirrors the error kinds the upper layers must branch on explicitly
//! (quota, invalid back-test input, schema mismatch, bad CLI input) while
//! letting everything else flow through via `#[from]` the way `anyhow`
//! would, so `?` keeps working at call sites that don't care about the
//! distinction.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Upstream provider returned HTTP 402 for this dataset. The batch
    /// executor treats this as a fast-stop signal, not a crash.
    #[error("quota exceeded for dataset {dataset}")]
    QuotaExceeded { dataset: String },

    /// Network failure, 5xx, or malformed JSON from an upstream adapter.
    /// Retried by the batch executor's backoff policy.
    #[error("transient fetch failure: {0}")]
    TransientFetchFailure(String),

    /// Back-test precondition failed (non-positive/non-finite price, or
    /// empty trading calendar after filtering to [start, end]).
    #[error("invalid price data: {0}")]
    InvalidPriceData(String),

    /// Storage engine's expected tables/columns are missing on open.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Invalid CLI input (unparseable date, out-of-range weight, etc).
    #[error("invalid input: {0}")]
    UserInputError(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True for the one error kind the batch executor must branch on to
    /// fast-stop (spec §4.3, §7).
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, AppError::QuotaExceeded { .. })
    }
}
