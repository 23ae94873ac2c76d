//! Drives one sync invocation: walk the range, fetch each day, upsert once.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::dates::DateRange;
use crate::rate_provider::RateProvider;
use crate::record::RateRecord;
use crate::store::RecordStore;
use crate::upsert::upsert_records;

/// Most failures echoed back to the caller; the count stays exact.
pub const MAX_REPORTED_ERRORS: usize = 20;

/// One day the provider could not quote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayFailure {
    pub date: NaiveDate,
    pub error: String,
}

/// Everything one invocation did.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub rows_written: usize,
    pub errors: Vec<DayFailure>,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl SyncOutcome {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Wire form of an outcome; the error list is truncated, the count is not.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub ok: bool,
    pub rows_written: usize,
    pub errors_count: usize,
    pub errors: Vec<DayFailure>,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl From<SyncOutcome> for SyncResponse {
    fn from(outcome: SyncOutcome) -> Self {
        let errors_count = outcome.errors.len();
        let mut errors = outcome.errors;
        errors.truncate(MAX_REPORTED_ERRORS);
        Self {
            ok: errors_count == 0,
            rows_written: outcome.rows_written,
            errors_count,
            errors,
            from: outcome.from,
            to: outcome.to,
        }
    }
}

/// Sync every day in `[from, to]`, strictly in order.
///
/// A day whose fetch fails (after the provider's own retries) is recorded
/// and skipped; the loop always visits the full range. All successes are
/// written through a single upsert pass, stamped with the shared `now`
/// timestamp fixed at invocation start. Only a store failure returns `Err`.
pub async fn sync_range(
    provider: &dyn RateProvider,
    store: &dyn RecordStore,
    from: NaiveDate,
    to: NaiveDate,
    now: DateTime<Utc>,
) -> Result<SyncOutcome> {
    let started = std::time::Instant::now();
    let mut records = Vec::new();
    let mut errors = Vec::new();

    info!(%from, %to, "Sync starting");

    for day in DateRange::new(from, to) {
        match provider.fetch_rate(day).await {
            Ok(rate) => records.push(RateRecord::new(day, rate, now)),
            Err(e) => {
                warn!("No rate for {}: {}", day, e);
                errors.push(DayFailure {
                    date: day,
                    error: e.to_string(),
                });
            }
        }
    }

    if !records.is_empty() {
        upsert_records(store, &records).await?;
    }

    info!(
        rows_written = records.len(),
        errors = errors.len(),
        elapsed = format!("{:.1}s", started.elapsed().as_secs_f64()),
        "Sync finished"
    );

    Ok(SyncOutcome {
        rows_written: records.len(),
        errors,
        from,
        to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_provider::FetchError;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Provider answering from a fixed table; everything else is "no data".
    struct ScriptedProvider {
        rates: HashMap<NaiveDate, f64>,
    }

    impl ScriptedProvider {
        fn new(rates: &[(&str, f64)]) -> Self {
            Self {
                rates: rates
                    .iter()
                    .map(|(date, rate)| (date.parse().unwrap(), *rate))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl RateProvider for ScriptedProvider {
        async fn fetch_rate(&self, date: NaiveDate) -> Result<f64, FetchError> {
            self.rates
                .get(&date)
                .copied()
                .ok_or(FetchError::NoData { date })
        }
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_full_range_success() {
        let provider = ScriptedProvider::new(&[
            ("2024-01-01", 39.4),
            ("2024-01-02", 39.5),
            ("2024-01-03", 39.6),
        ]);
        let store = MemoryStore::with_rows(vec![]);

        let outcome = sync_range(
            &provider,
            &store,
            day("2024-01-01"),
            day("2024-01-03"),
            Utc::now(),
        )
        .await
        .unwrap();

        assert!(outcome.ok());
        assert_eq!(outcome.rows_written, 3);
        assert!(outcome.errors.is_empty());
        assert_eq!(store.rows().await.len(), 4);
    }

    #[tokio::test]
    async fn test_existing_day_is_overwritten_not_duplicated() {
        let provider = ScriptedProvider::new(&[
            ("2024-01-01", 39.4),
            ("2024-01-02", 39.5),
            ("2024-01-03", 39.6),
        ]);
        let store = MemoryStore::with_rows(vec![row(&[
            "2024-01-02",
            "USD",
            "39.0",
            "NBU",
            "old",
        ])]);

        let outcome = sync_range(
            &provider,
            &store,
            day("2024-01-01"),
            day("2024-01-03"),
            Utc::now(),
        )
        .await
        .unwrap();

        assert!(outcome.ok());
        let rows = store.rows().await;
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1][0], "2024-01-02");
        assert_eq!(rows[1][2], "39.5");
    }

    #[tokio::test]
    async fn test_one_failing_day_does_not_abort_the_rest() {
        let provider = ScriptedProvider::new(&[("2024-01-01", 39.4), ("2024-01-03", 39.6)]);
        let store = MemoryStore::with_rows(vec![]);

        let outcome = sync_range(
            &provider,
            &store,
            day("2024-01-01"),
            day("2024-01-03"),
            Utc::now(),
        )
        .await
        .unwrap();

        assert!(!outcome.ok());
        assert_eq!(outcome.rows_written, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].date, day("2024-01-02"));
        assert_eq!(store.rows().await.len(), 3);
    }

    #[tokio::test]
    async fn test_every_day_is_accounted_for_exactly_once() {
        let provider = ScriptedProvider::new(&[("2024-01-02", 39.5), ("2024-01-04", 39.7)]);
        let store = MemoryStore::with_rows(vec![]);

        let from = day("2024-01-01");
        let to = day("2024-01-05");
        let outcome = sync_range(&provider, &store, from, to, Utc::now())
            .await
            .unwrap();

        let total_days = (to - from).num_days() as usize + 1;
        assert_eq!(outcome.rows_written + outcome.errors.len(), total_days);
    }

    #[tokio::test]
    async fn test_rerun_of_same_range_is_idempotent() {
        let provider = ScriptedProvider::new(&[("2024-01-01", 39.4), ("2024-01-02", 39.5)]);
        let store = MemoryStore::with_rows(vec![]);

        for _ in 0..2 {
            sync_range(
                &provider,
                &store,
                day("2024-01-01"),
                day("2024-01-02"),
                Utc::now(),
            )
            .await
            .unwrap();
        }

        // Second pass updates in place; the sheet does not grow.
        assert_eq!(store.rows().await.len(), 3);
    }

    #[tokio::test]
    async fn test_all_records_share_one_observed_at() {
        let provider = ScriptedProvider::new(&[("2024-01-01", 39.4), ("2024-01-02", 39.5)]);
        let store = MemoryStore::with_rows(vec![]);

        sync_range(
            &provider,
            &store,
            day("2024-01-01"),
            day("2024-01-02"),
            Utc::now(),
        )
        .await
        .unwrap();

        let rows = store.rows().await;
        assert_eq!(rows[1][4], rows[2][4]);
    }

    #[test]
    fn test_response_caps_error_list_but_not_count() {
        let errors: Vec<DayFailure> = DateRange::new(day("2024-01-01"), day("2024-01-25"))
            .map(|date| DayFailure {
                date,
                error: "no data".to_string(),
            })
            .collect();
        let outcome = SyncOutcome {
            rows_written: 0,
            errors,
            from: day("2024-01-01"),
            to: day("2024-01-25"),
        };

        let response = SyncResponse::from(outcome);
        assert!(!response.ok);
        assert_eq!(response.errors_count, 25);
        assert_eq!(response.errors.len(), MAX_REPORTED_ERRORS);
        assert_eq!(response.errors[0].date, day("2024-01-01"));
    }
}
