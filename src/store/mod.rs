pub mod memory;
pub mod sheets;

use anyhow::Result;
use async_trait::async_trait;

/// A tabular store with a header row, 1-based row numbers and positional
/// columns A to E.
///
/// Errors propagate unchanged. Unlike the rate fetch there is no retry at
/// this layer: once credentials are valid, writes are assumed reliable.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every row in the sheet, header included.
    async fn read_all(&self) -> Result<Vec<Vec<String>>>;

    /// Overwrite one existing row's five columns. `row_number` is 1-based,
    /// counts the header as row 1 and must reference an existing row.
    async fn update_row(&self, row_number: usize, values: Vec<String>) -> Result<()>;

    /// Add rows at the end, preserving order. Callers skip the call entirely
    /// for an empty batch.
    async fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<()>;

    /// Write the five-column header into row 1.
    async fn write_header(&self) -> Result<()>;
}
