use crate::error::{ForecastError, Result};
use chrono::{Datelike, Months, NaiveDate};

/// Normalizes any date to the first day of its month.
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn month_start(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        ForecastError::DateError(format!("Invalid year/month combination: {}-{}", year, month))
    })
}

pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months)).ok_or_else(|| {
        ForecastError::DateError(format!("Adding {} months to {} overflows", months, date))
    })
}

pub fn sub_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_sub_months(Months::new(months)).ok_or_else(|| {
        ForecastError::DateError(format!("Subtracting {} months from {} overflows", months, date))
    })
}

pub fn next_month_start(date: NaiveDate) -> Result<NaiveDate> {
    add_months(first_of_month(date), 1)
}

pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    let year_diff = end.year() - start.year();
    let month_diff = end.month() as i32 - start.month() as i32;
    year_diff * 12 + month_diff
}

/// Every month start from `start` to `end`, both inclusive.
pub fn month_starts_in_period(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::new();
    let end = first_of_month(end);
    let mut current = first_of_month(start);

    while current <= end {
        dates.push(current);
        current = next_month_start(current)?;
    }

    Ok(dates)
}

/// Human readable month label used in charts and tables, e.g. "Mar 2025".
pub fn month_label(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

/// Long form period name, e.g. "October 2026".
pub fn period_name(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

/// Formats an amount as `"<symbol> 12,345.67"`, negative amounts as `"<symbol> -12.00"`.
pub fn format_currency(symbol: &str, value: f64) -> String {
    let rounded = format!("{:.2}", value.abs());
    let (whole, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && rounded != "0.00" { "-" } else { "" };
    format!("{} {}{}.{}", symbol, sign, grouped, fraction)
}
