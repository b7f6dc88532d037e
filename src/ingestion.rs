use crate::aggregator::TransactionStore;
use crate::error::{ForecastError, Result};
use crate::schema::TransactionRecord;
use chrono::NaiveDate;

/// A [`TransactionStore`] backed by an in-memory list of records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Vec<TransactionRecord>,
    unavailable: bool,
}

impl InMemoryStore {
    pub fn new(records: Vec<TransactionRecord>) -> Self {
        Self {
            records,
            unavailable: false,
        }
    }

    /// Makes every fetch fail with [`ForecastError::DataAccess`].
    pub fn unavailable() -> Self {
        Self {
            records: Vec::new(),
            unavailable: true,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl TransactionStore for InMemoryStore {
    async fn fetch_transactions(
        &self,
        scope_id: &str,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Vec<TransactionRecord>> {
        if self.unavailable {
            return Err(ForecastError::DataAccess(
                "in-memory store marked unavailable".to_string(),
            ));
        }

        Ok(self
            .records
            .iter()
            .filter(|r| r.scope_id == scope_id)
            .filter(|r| {
                let date = r.timestamp.date();
                window_start <= date && date <= window_end
            })
            .cloned()
            .collect())
    }
}
