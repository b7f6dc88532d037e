// Generation request for the narrative forecast report

use crate::error::Result;
use crate::report::{build_forecast_table, table_headers, ReportRequest, INSUFFICIENT_DATA};
use crate::schema::{ForecastPoint, GeneratedReport};
use crate::utils::period_name;
use schemars::schema_for;
use serde_json::{json, Map, Value};

const REPORT_REQUIREMENTS: &str = r#"
**REPORT REQUIREMENTS**
1. Executive Summary:
   - A 3-sentence overview of financial health.
   - Key spending patterns and anomalies.
2. Category Analysis:
   - For every forecast category, give a clear 6-month trend in simple business language
     and a 2-3 sentence explanation of *why* the forecast behaves as it does
     (seasonal peaks, inflation, business growth).
   - Do NOT write a separate sentence for each insufficient category. Instead, end
     category_analysis with one "Reminder" entry listing all insufficient categories and
     asking the user to record more transactions for better accuracy.
   - Give 2 actionable, budget-level recommendations based on the forecasts.
3. Forecast Table:
   - Copy the FORECAST TABLE below exactly. Every category must appear, including
     insufficient ones.
4. Calculation Explanation:
   - A 1-2 sentence note on how the forecast amount (point estimate) and the estimate
     range (confidence interval) were derived.
5. Actionable Insights:
   - Top 3 cost-saving opportunities (plain text, no bold).
   - Budget risk assessment.
   - Recommended adjustments.
"#;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn render_points(points: &[ForecastPoint]) -> Value {
    Value::Array(
        points
            .iter()
            .map(|p| {
                json!({
                    "date": p.month.format("%Y-%m-%d").to_string(),
                    "forecast": round2(p.point_estimate),
                    "lower": round2(p.lower_bound),
                    "upper": round2(p.upper_bound),
                })
            })
            .collect(),
    )
}

/// Forecast numbers as pretty JSON: per-category series plus the combined total.
pub fn render_forecast_data(request: &ReportRequest<'_>) -> Result<String> {
    let categories: Map<String, Value> = request
        .forecasts
        .categories
        .iter()
        .map(|(name, points)| (name.clone(), render_points(points)))
        .collect();

    let data = json!({
        "categories": categories,
        "total": render_points(&request.forecasts.total),
    });

    Ok(serde_json::to_string_pretty(&data)?)
}

pub fn build_forecast_prompt(request: &ReportRequest<'_>) -> Result<String> {
    let symbol = request.currency_symbol;
    let forecast_data = render_forecast_data(request)?;
    let insufficient: Vec<&String> = request.insufficient.iter().collect();
    let table = serde_json::to_string_pretty(&build_forecast_table(request))?;
    let headers = serde_json::to_string(&table_headers(symbol))?;
    let schema = serde_json::to_string_pretty(&schema_for!(GeneratedReport))?;

    Ok(format!(
        r#"
Act as an expert financial analyst writing for a {audience} audience.
Generate a comprehensive forecast report from the expense forecasts below.
Format all monetary values with '{symbol}' instead of '$'. Use only simple, business-friendly language.

## FORECAST DATA
Monthly forecasts for the next {horizon} months per category, with the combined total.
"forecast" is the expected amount, "lower"/"upper" bound the likely range.
```json
{forecast_data}
```

## INSUFFICIENT DATA
The following categories had insufficient data for reliable prediction: {insufficient}
{requirements}
## FORECAST TABLE
```json
{table}
```

**Instructions:**
1. All monetary values must start with {symbol} and use a comma as thousands separator (e.g., {symbol} 12,000.00).
2. The table "headers" must be exactly: {headers}
3. Rows for insufficient categories must show "{marker}" in both amount columns.
4. Do not use technical terms like yhat, yhat_lower or yhat_upper.
5. Use the numbers above as given; do not recompute them.

**ANALYSIS PARAMETERS**
- Current period: {period}
- Consider {inflation}% annual inflation rate
- Factor in seasonal trends (e.g., higher travel in December)
- Account for business growth projections

**OUTPUT FORMAT**
Return a single strict JSON object matching this schema and nothing else:
```json
{schema}
```
"#,
        audience = request.audience,
        symbol = symbol,
        horizon = horizon(request),
        forecast_data = forecast_data,
        insufficient = serde_json::to_string(&insufficient)?,
        requirements = REPORT_REQUIREMENTS,
        table = table,
        headers = headers,
        marker = INSUFFICIENT_DATA,
        period = period_name(request.as_of),
        inflation = round2(request.annual_inflation_rate * 100.0),
        schema = schema,
    ))
}

fn horizon(request: &ReportRequest<'_>) -> usize {
    request
        .forecasts
        .categories
        .values()
        .map(Vec::len)
        .chain(std::iter::once(request.forecasts.total.len()))
        .max()
        .unwrap_or(0)
}
