//! The seam between the sync loop and whichever service quotes daily rates.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// Failure modes of a single rate lookup.
///
/// Every variant is retried under the same policy today; the split exists so
/// a finer policy (for example short-circuiting `NoData`) can be layered on
/// later without string matching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream returned HTTP {status}")]
    Status { status: reqwest::StatusCode },
    #[error("request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },
    #[error("no rate published for {date}")]
    NoData { date: NaiveDate },
    #[error("malformed upstream payload: {detail}")]
    Malformed { detail: String },
    #[error("rate fetch failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<FetchError>,
    },
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Quote the tracked currency's rate for one calendar day.
    async fn fetch_rate(&self, date: NaiveDate) -> Result<f64, FetchError>;
}
