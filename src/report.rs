use crate::schema::{ForecastSet, ForecastTable, InsufficientList};
use crate::utils::{format_currency, month_label};
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::BTreeSet;

pub const INSUFFICIENT_DATA: &str = "Insufficient Data";

/// Everything the report synthesizer needs from one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct ReportRequest<'a> {
    pub forecasts: &'a ForecastSet,
    pub insufficient: &'a InsufficientList,
    pub as_of: NaiveDate,
    pub currency_symbol: &'a str,
    pub audience: &'a str,
    pub annual_inflation_rate: f64,
}

impl ReportRequest<'_> {
    /// Every category observed historically, forecast or not.
    pub fn all_categories(&self) -> BTreeSet<&str> {
        self.forecasts
            .categories
            .keys()
            .chain(self.insufficient.iter())
            .map(String::as_str)
            .collect()
    }
}

pub fn table_headers(currency_symbol: &str) -> Vec<String> {
    vec![
        "Category".to_string(),
        "Date".to_string(),
        format!("Forecast Amount ({})", currency_symbol),
        format!("Estimate Range ({})", currency_symbol),
    ]
}

/// Renders the forecast table: six rows per forecast category and a single
/// "Insufficient Data" row per insufficient category, alphabetically by category.
pub fn build_forecast_table(request: &ReportRequest<'_>) -> ForecastTable {
    let symbol = request.currency_symbol;
    let mut rows = Vec::new();

    for category in request.all_categories() {
        match request.forecasts.categories.get(category) {
            Some(points) => {
                for point in points {
                    rows.push(vec![
                        category.to_string(),
                        month_label(point.month),
                        format_currency(symbol, point.point_estimate),
                        format!(
                            "{} - {}",
                            format_currency(symbol, point.lower_bound),
                            format_currency(symbol, point.upper_bound)
                        ),
                    ]);
                }
            }
            None => rows.push(vec![
                category.to_string(),
                "-".to_string(),
                INSUFFICIENT_DATA.to_string(),
                INSUFFICIENT_DATA.to_string(),
            ]),
        }
    }

    ForecastTable {
        headers: table_headers(symbol),
        rows,
    }
}

/// Checks a generator-produced table against the reporting rules: exact headers,
/// four cells per row, only observed categories, one row per forecast month for
/// every forecast category and "Insufficient Data" rows for the rest.
pub fn table_is_complete(table: &ForecastTable, request: &ReportRequest<'_>) -> bool {
    if table.headers != table_headers(request.currency_symbol) {
        return false;
    }
    if table.rows.iter().any(|row| row.len() != 4) {
        return false;
    }

    let known = request.all_categories();
    if let Some(row) = table.rows.iter().find(|row| !known.contains(row[0].trim())) {
        debug!("Generated table lists unknown category '{}'", row[0]);
        return false;
    }

    known.into_iter().all(|category| {
        let rows: Vec<&Vec<String>> = table
            .rows
            .iter()
            .filter(|row| row[0].trim() == category)
            .collect();
        match request.forecasts.categories.get(category) {
            Some(points) => {
                rows.len() == points.len() && !rows.iter().any(|row| marks_insufficient(row))
            }
            None => !rows.is_empty() && rows.iter().all(|row| fully_marked_insufficient(row)),
        }
    })
}

fn marks_insufficient(row: &[String]) -> bool {
    row[2].trim() == INSUFFICIENT_DATA || row[3].trim() == INSUFFICIENT_DATA
}

fn fully_marked_insufficient(row: &[String]) -> bool {
    row[2].trim() == INSUFFICIENT_DATA && row[3].trim() == INSUFFICIENT_DATA
}

/// Keeps the generator's table when complete, otherwise substitutes the rendered one.
pub fn reconcile_forecast_table(table: ForecastTable, request: &ReportRequest<'_>) -> ForecastTable {
    if table_is_complete(&table, request) {
        table
    } else {
        warn!("Generated forecast table is incomplete; using the computed table instead");
        build_forecast_table(request)
    }
}
