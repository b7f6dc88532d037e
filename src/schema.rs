use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single categorized transaction as stored by the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub timestamp: NaiveDateTime,
    pub category: String,
    pub amount: f64,
    pub scope_id: String,
}

/// Sum of all transactions sharing a (year, month, category).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    pub year: i32,
    pub month: u32,
    pub category: String,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Always the first day of the month
    pub month: NaiveDate,
    pub value: f64,
}

/// Contiguous, one-month-spaced series for a category or the combined total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySeries {
    pub name: String,
    pub points: Vec<SeriesPoint>,
}

impl MonthlySeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_month(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.month)
    }

    pub fn last_month(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.month)
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn value_at(&self, month: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&month, |p| p.month)
            .ok()
            .map(|idx| self.points[idx].value)
    }

    pub fn nonzero_months(&self) -> usize {
        self.points.iter().filter(|p| p.value > 0.0).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sufficiency {
    Sufficient,
    Insufficient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySeries {
    pub series: MonthlySeries,
    pub verdict: Sufficiency,
}

/// Output of the series builder: one series per category plus the combined total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub categories: BTreeMap<String, CategorySeries>,
    pub total: MonthlySeries,
}

impl HistoricalSeries {
    pub fn sufficient(&self) -> impl Iterator<Item = &MonthlySeries> {
        self.categories
            .values()
            .filter(|c| c.verdict == Sufficiency::Sufficient)
            .map(|c| &c.series)
    }

    pub fn insufficient(&self) -> InsufficientList {
        self.categories
            .iter()
            .filter(|(_, c)| c.verdict == Sufficiency::Insufficient)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub month: NaiveDate,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Per-category forecasts (chronological points) plus the independent total forecast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastSet {
    pub categories: BTreeMap<String, Vec<ForecastPoint>>,
    pub total: Vec<ForecastPoint>,
}

pub type InsufficientList = BTreeSet<String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

pub type ChartSeries = BTreeMap<String, Vec<ChartPoint>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForecastTable {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_rows")]
    #[schemars(
        with = "Vec<Vec<String>>",
        description = "One row per category and month; every cell is a string"
    )]
    pub rows: Vec<Vec<String>>,
}

/// The report shape requested from the text generator (everything except chart data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedReport {
    #[schemars(description = "Three sentence overview of financial health, key patterns and anomalies")]
    pub executive_summary: String,

    #[serde(default)]
    #[schemars(description = "Category name to a 2-3 sentence explanation of its forecast")]
    pub category_analysis: BTreeMap<String, String>,

    #[serde(default)]
    pub forecast_table: ForecastTable,

    #[serde(default)]
    #[schemars(description = "How the forecast amount and estimate range were derived")]
    pub calculation_explanation: String,

    #[serde(default)]
    pub insights: Vec<String>,
}

/// Terminal artifact returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub executive_summary: String,
    pub category_analysis: BTreeMap<String, String>,
    pub forecast_table: ForecastTable,
    pub calculation_explanation: String,
    pub insights: Vec<String>,
    pub chart_data: ChartSeries,
}

impl ReportPayload {
    pub fn from_generated(report: GeneratedReport, chart_data: ChartSeries) -> Self {
        Self {
            executive_summary: report.executive_summary,
            category_analysis: report.category_analysis,
            forecast_table: report.forecast_table,
            calculation_explanation: report.calculation_explanation,
            insights: report.insights,
            chart_data,
        }
    }
}

// Generators occasionally emit bare numbers or nulls in table cells.
fn deserialize_rows<'de, D>(deserializer: D) -> std::result::Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows: Vec<Vec<serde_json::Value>> = Vec::deserialize(deserializer)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect())
}
