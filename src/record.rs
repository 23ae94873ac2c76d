//! Exchange-rate observations and their sheet row form.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Tag written to the `source` column for every row this service produces.
pub const SOURCE: &str = "NBU";

/// The one currency this sync tracks.
pub const CURRENCY: &str = "USD";

/// Header row of the backing sheet, columns A to E.
pub const HEADER: [&str; 5] = ["date", "ccy", "rate_to_uah", "source", "updated_at"];

/// One exchange-rate observation, keyed by `(date, currency)` in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RateRecord {
    pub date: NaiveDate,
    pub currency: String,
    /// UAH per one unit of the foreign currency.
    pub rate: f64,
    pub source: String,
    /// When the sync ran. Shared by every record of one invocation.
    pub observed_at: DateTime<Utc>,
}

impl RateRecord {
    pub fn new(date: NaiveDate, rate: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            date,
            currency: CURRENCY.to_string(),
            rate,
            source: SOURCE.to_string(),
            observed_at,
        }
    }

    /// Composite key identifying this record within the sheet.
    pub fn key(&self) -> (String, String) {
        (self.date.to_string(), self.currency.clone())
    }

    /// Five cell strings in sheet column order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.date.to_string(),
            self.currency.clone(),
            self.rate.to_string(),
            self.source.clone(),
            self.observed_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        ]
    }
}
