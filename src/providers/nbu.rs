use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::providers::util::with_retry;
use crate::rate_provider::{FetchError, RateProvider};
use crate::record::CURRENCY;

const EXCHANGE_ENDPOINT: &str = "/NBUStatService/v1/statdirectory/exchange";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub const DEFAULT_ATTEMPTS: usize = 4;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(800);

/// Daily exchange rates from the NBU statistics directory.
///
/// The directory is flaky around publication time: gateway errors, empty
/// bodies and slow responses all happen, so every failure retries under the
/// same budget. A consistently empty payload still means the date has no
/// published rate and surfaces as `FetchError::NoData` once the budget runs
/// out.
pub struct NbuProvider {
    base_url: String,
    attempts: usize,
    backoff: Duration,
}

/// One entry of the exchange directory payload. Only the rate is used.
#[derive(Debug, Deserialize)]
struct NbuQuote {
    rate: f64,
}

impl NbuProvider {
    pub fn new(base_url: &str) -> Self {
        Self::with_policy(base_url, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF)
    }

    /// Override the retry budget, mainly to keep tests off the real pauses.
    pub fn with_policy(base_url: &str, attempts: usize, backoff: Duration) -> Self {
        NbuProvider {
            base_url: base_url.to_string(),
            attempts,
            backoff,
        }
    }

    async fn request_rate(
        &self,
        client: &reqwest::Client,
        url: &str,
        date_param: &str,
        date: NaiveDate,
    ) -> Result<f64, FetchError> {
        let response = client
            .get(url)
            .query(&[("valcode", CURRENCY), ("date", date_param), ("json", "")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Gateway errors (502/503/504) and everything else non-2xx land
            // here; both classes retry under the same policy.
            return Err(FetchError::Status { status });
        }

        let quotes: Vec<NbuQuote> = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed {
                detail: e.to_string(),
            })?;

        match quotes.first() {
            Some(quote) => Ok(quote.rate),
            None => Err(FetchError::NoData { date }),
        }
    }
}

#[async_trait]
impl RateProvider for NbuProvider {
    #[instrument(name = "NbuRateFetch", skip(self), fields(date = %date))]
    async fn fetch_rate(&self, date: NaiveDate) -> Result<f64, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("nbusync/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let url = format!("{}{}", self.base_url, EXCHANGE_ENDPOINT);
        let date_param = date.format("%Y%m%d").to_string();
        debug!("Requesting NBU rate from {} for {}", url, date_param);

        with_retry(
            || async { self.request_rate(&client, &url, &date_param, date).await },
            self.attempts,
            self.backoff,
        )
        .await
        .map_err(|last| FetchError::Exhausted {
            attempts: self.attempts,
            last: Box::new(last),
        })
    }
}
