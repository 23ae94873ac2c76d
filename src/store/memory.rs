use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::record::HEADER;
use crate::store::RecordStore;

fn header_row() -> Vec<String> {
    HEADER.iter().map(|s| s.to_string()).collect()
}

/// In-memory sheet, used by tests in place of the Sheets backend.
pub struct MemoryStore {
    rows: Mutex<Vec<Vec<String>>>,
}

impl MemoryStore {
    /// An entirely empty sheet, not even a header.
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
        }
    }

    /// A sheet with the header plus the given data rows.
    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        let mut all = vec![header_row()];
        all.extend(rows);
        Self {
            rows: Mutex::new(all),
        }
    }

    /// Snapshot of the current sheet contents.
    pub async fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().await.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read_all(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.rows.lock().await.clone())
    }

    async fn update_row(&self, row_number: usize, values: Vec<String>) -> Result<()> {
        let mut rows = self.rows.lock().await;
        if row_number == 0 || row_number > rows.len() {
            bail!(
                "row {} does not exist (sheet has {} rows)",
                row_number,
                rows.len()
            );
        }
        rows[row_number - 1] = values;
        Ok(())
    }

    async fn append_rows(&self, new_rows: Vec<Vec<String>>) -> Result<()> {
        self.rows.lock().await.extend(new_rows);
        Ok(())
    }

    async fn write_header(&self) -> Result<()> {
        let mut rows = self.rows.lock().await;
        if rows.is_empty() {
            rows.push(header_row());
        } else {
            rows[0] = header_row();
        }
        Ok(())
    }
}
