//! Turns sparse (year, month, category) aggregates into dense monthly series.

use crate::error::{ForecastError, Result};
use crate::schema::{
    AggregatedPoint, CategorySeries, HistoricalSeries, MonthlySeries, SeriesPoint, Sufficiency,
};
use crate::utils::{month_start, month_starts_in_period};
use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;

pub const TOTAL_SERIES_NAME: &str = "Total";

/// A category observed in fewer distinct months than this has no usable span.
const MIN_DISTINCT_MONTHS: usize = 2;

pub struct SeriesBuilder {
    min_nonzero_months: usize,
}

impl SeriesBuilder {
    pub fn new(min_nonzero_months: usize) -> Self {
        Self { min_nonzero_months }
    }

    pub fn build(&self, points: &[AggregatedPoint]) -> Result<HistoricalSeries> {
        if points.is_empty() {
            return Err(ForecastError::EmptyHistory);
        }

        let mut observed: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        for point in points {
            let month = month_start(point.year, point.month)?;
            *observed
                .entry(point.category.as_str())
                .or_default()
                .entry(month)
                .or_insert(0.0) += point.total_amount;
        }

        let mut categories = BTreeMap::new();
        for (name, months) in &observed {
            let series = densify(name, months)?;
            let verdict = self.classify(months.len(), &series);
            debug!(
                "Category '{}': {} months spanned, {} with activity, {:?}",
                name,
                series.len(),
                series.nonzero_months(),
                verdict
            );
            categories.insert(name.to_string(), CategorySeries { series, verdict });
        }

        let total = build_total(&observed)?;

        Ok(HistoricalSeries { categories, total })
    }

    fn classify(&self, distinct_months: usize, series: &MonthlySeries) -> Sufficiency {
        if distinct_months < MIN_DISTINCT_MONTHS {
            return Sufficiency::Insufficient;
        }
        if series.nonzero_months() >= self.min_nonzero_months {
            Sufficiency::Sufficient
        } else {
            Sufficiency::Insufficient
        }
    }
}

/// Fills every month between the first and last observed month, gaps as zero.
fn densify(name: &str, months: &BTreeMap<NaiveDate, f64>) -> Result<MonthlySeries> {
    let (first, last) = match (months.keys().next(), months.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Ok(MonthlySeries {
                name: name.to_string(),
                points: Vec::new(),
            })
        }
    };

    let points = month_starts_in_period(first, last)?
        .into_iter()
        .map(|month| SeriesPoint {
            month,
            value: months.get(&month).copied().unwrap_or(0.0),
        })
        .collect();

    Ok(MonthlySeries {
        name: name.to_string(),
        points,
    })
}

/// Element-wise sum across categories over the global span.
fn build_total(observed: &BTreeMap<&str, BTreeMap<NaiveDate, f64>>) -> Result<MonthlySeries> {
    let mut combined: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for months in observed.values() {
        for (month, value) in months {
            *combined.entry(*month).or_insert(0.0) += value;
        }
    }
    densify(TOTAL_SERIES_NAME, &combined)
}
