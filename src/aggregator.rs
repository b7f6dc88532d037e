use crate::error::{ForecastError, Result};
use crate::schema::{AggregatedPoint, TransactionRecord};
use crate::utils::sub_months;
use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use std::collections::BTreeMap;

/// Read access to the external transaction store.
///
/// Implementations report any store-level failure as [`ForecastError::DataAccess`].
/// Records may come back in any order.
#[allow(async_fn_in_trait)]
pub trait TransactionStore {
    async fn fetch_transactions(
        &self,
        scope_id: &str,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Vec<TransactionRecord>>;
}

/// Inclusive date window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistoryWindow {
    /// The trailing window of `months` months ending on `as_of`.
    pub fn trailing(as_of: NaiveDate, months: u32) -> Result<Self> {
        Ok(Self {
            start: sub_months(as_of, months)?,
            end: as_of,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Groups records by (year, month, category), summing amounts.
///
/// Records outside `window` are dropped even if the store returned them.
/// Output is ordered by year, month, then category.
pub fn aggregate_transactions(
    records: &[TransactionRecord],
    window: HistoryWindow,
) -> Vec<AggregatedPoint> {
    let mut groups: BTreeMap<(i32, u32, &str), f64> = BTreeMap::new();

    for record in records {
        let date = record.timestamp.date();
        if !window.contains(date) {
            continue;
        }
        *groups
            .entry((date.year(), date.month(), record.category.as_str()))
            .or_insert(0.0) += record.amount;
    }

    groups
        .into_iter()
        .map(|((year, month, category), total_amount)| AggregatedPoint {
            year,
            month,
            category: category.to_string(),
            total_amount,
        })
        .collect()
}

pub struct HistoricalAggregator<S> {
    store: S,
    window_months: u32,
}

impl<S: TransactionStore> HistoricalAggregator<S> {
    pub fn new(store: S, window_months: u32) -> Self {
        Self {
            store,
            window_months,
        }
    }

    pub async fn load(&self, scope_id: &str, as_of: NaiveDate) -> Result<Vec<AggregatedPoint>> {
        let window = HistoryWindow::trailing(as_of, self.window_months)?;
        info!(
            "Loading transactions for scope {} between {} and {}",
            scope_id, window.start, window.end
        );

        let records = self
            .store
            .fetch_transactions(scope_id, window.start, window.end)
            .await
            .map_err(|e| match e {
                ForecastError::DataAccess(_) => e,
                other => ForecastError::DataAccess(other.to_string()),
            })?;

        let points = aggregate_transactions(&records, window);
        debug!(
            "Aggregated {} transactions into {} (year, month, category) points",
            records.len(),
            points.len()
        );

        Ok(points)
    }
}
