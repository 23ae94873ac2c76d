//! Write side of the sync: match incoming records against the sheet and
//! update or append accordingly.

use anyhow::Result;
use std::collections::HashMap;
use tracing::debug;

use crate::record::RateRecord;
use crate::store::RecordStore;

/// 1-based row number for every `(date, currency)` key already in the sheet.
///
/// Row 1 is the header and is skipped. Rows missing either key cell are
/// ignored. A key that appears twice maps to its later row — a sheet with
/// accidental duplicates is genuinely ambiguous, and the later row wins.
fn build_index(rows: &[Vec<String>]) -> HashMap<(String, String), usize> {
    let mut index = HashMap::new();
    for (offset, row) in rows.iter().skip(1).enumerate() {
        if let (Some(date), Some(currency)) = (row.first(), row.get(1)) {
            if !date.is_empty() && !currency.is_empty() {
                index.insert((date.clone(), currency.clone()), offset + 2);
            }
        }
    }
    index
}

/// Upsert `records` into the store, keyed by `(date, currency)`.
///
/// The sheet is read once up front. Matched keys are overwritten in place,
/// one write each; the rest are appended in input order with a single call.
/// Not transactional: a store failure mid-way leaves the earlier updates
/// committed and the rest unwritten.
pub async fn upsert_records(store: &dyn RecordStore, records: &[RateRecord]) -> Result<()> {
    let existing = build_index(&store.read_all().await?);
    let mut to_append = Vec::new();

    for record in records {
        match existing.get(&record.key()) {
            Some(&row_number) => {
                debug!("Overwriting row {} for {}", row_number, record.date);
                store.update_row(row_number, record.to_row()).await?;
            }
            None => to_append.push(record.to_row()),
        }
    }

    if !to_append.is_empty() {
        debug!("Appending {} new rows", to_append.len());
        store.append_rows(to_append).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn record(date: &str, rate: f64) -> RateRecord {
        RateRecord::new(date.parse().unwrap(), rate, Utc::now())
    }

    #[test]
    fn test_index_skips_header_and_numbers_rows_from_two() {
        let rows = vec![
            row(&["date", "ccy", "rate_to_uah", "source", "updated_at"]),
            row(&["2024-01-01", "USD", "39.4", "NBU", "t"]),
            row(&["2024-01-02", "USD", "39.5", "NBU", "t"]),
        ];

        let index = build_index(&rows);
        assert_eq!(index.len(), 2);
        assert_eq!(
            index[&("2024-01-01".to_string(), "USD".to_string())],
            2
        );
        assert_eq!(
            index[&("2024-01-02".to_string(), "USD".to_string())],
            3
        );
    }

    #[test]
    fn test_index_ignores_rows_with_blank_key_cells() {
        let rows = vec![
            row(&["date", "ccy"]),
            row(&["", "USD", "39.4"]),
            row(&["2024-01-01", "", "39.4"]),
            row(&["2024-01-02"]),
            row(&["2024-01-03", "USD", "39.6"]),
        ];

        let index = build_index(&rows);
        assert_eq!(index.len(), 1);
        assert_eq!(
            index[&("2024-01-03".to_string(), "USD".to_string())],
            5
        );
    }

    #[test]
    fn test_index_duplicate_key_last_wins() {
        let rows = vec![
            row(&["date", "ccy"]),
            row(&["2024-01-01", "USD", "39.4"]),
            row(&["2024-01-01", "USD", "39.9"]),
        ];

        let index = build_index(&rows);
        assert_eq!(index.len(), 1);
        assert_eq!(
            index[&("2024-01-01".to_string(), "USD".to_string())],
            3
        );
    }

    #[tokio::test]
    async fn test_upsert_appends_to_fresh_sheet() {
        let store = MemoryStore::with_rows(vec![]);
        let records = vec![record("2024-01-01", 39.4), record("2024-01-02", 39.5)];

        upsert_records(&store, &records).await.unwrap();

        let rows = store.rows().await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][0], "2024-01-01");
        assert_eq!(rows[2][0], "2024-01-02");
    }

    #[tokio::test]
    async fn test_upsert_overwrites_matching_key_without_growth() {
        let store = MemoryStore::with_rows(vec![row(&[
            "2024-01-02",
            "USD",
            "39.0",
            "NBU",
            "old",
        ])]);

        upsert_records(&store, &[record("2024-01-02", 39.5)])
            .await
            .unwrap();

        let rows = store.rows().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][2], "39.5");
    }

    #[tokio::test]
    async fn test_upsert_mixes_updates_and_appends() {
        let store = MemoryStore::with_rows(vec![row(&[
            "2024-01-02",
            "USD",
            "39.0",
            "NBU",
            "old",
        ])]);
        let records = vec![
            record("2024-01-01", 39.4),
            record("2024-01-02", 39.5),
            record("2024-01-03", 39.6),
        ];

        upsert_records(&store, &records).await.unwrap();

        let rows = store.rows().await;
        assert_eq!(rows.len(), 4);
        // Existing key updated in place, new keys appended in input order.
        assert_eq!(rows[1][0], "2024-01-02");
        assert_eq!(rows[1][2], "39.5");
        assert_eq!(rows[2][0], "2024-01-01");
        assert_eq!(rows[3][0], "2024-01-03");
    }
}
