use chrono::{NaiveDate, NaiveDateTime};
use financial_forecast_builder::*;
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Flat forecast at the last observed value; fails for the configured series.
struct LastValueModel {
    failing: Vec<String>,
}

struct LastValueFit {
    last_month: NaiveDate,
    value: f64,
}

impl LastValueModel {
    fn new() -> Self {
        Self {
            failing: Vec::new(),
        }
    }

    fn failing_on(name: &str) -> Self {
        Self {
            failing: vec![name.to_string()],
        }
    }
}

impl SeriesModel for LastValueModel {
    fn fit(&self, series: &MonthlySeries) -> Result<Box<dyn FittedModel>> {
        if self.failing.contains(&series.name) {
            return Err(ForecastError::ModelFit {
                series: series.name.clone(),
                reason: "singular design matrix".to_string(),
            });
        }
        let last = series.points.last().ok_or(ForecastError::ModelFit {
            series: series.name.clone(),
            reason: "empty series".to_string(),
        })?;
        Ok(Box::new(LastValueFit {
            last_month: last.month,
            value: last.value,
        }))
    }
}

impl FittedModel for LastValueFit {
    fn predict(&self, horizon: usize) -> Result<Vec<ForecastPoint>> {
        (1..=horizon as u32)
            .map(|h| {
                Ok(ForecastPoint {
                    month: utils::add_months(self.last_month, h)?,
                    point_estimate: self.value,
                    lower_bound: self.value - 50.0,
                    upper_bound: self.value + 50.0,
                })
            })
            .collect()
    }
}

/// Replays a fixed reply and records every prompt it receives.
struct ScriptedGenerator {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl TextGenerator for &ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(ForecastError::Generation)
    }
}

const GOOD_REPLY: &str = r#"Here is the report you asked for:
```json
{
  "executive_summary": "Rent dominates spending and stays flat.",
  "category_analysis": {"Rent": "Rent holds steady at RM 1,200.00 per month."},
  "calculation_explanation": "Each forecast continues the recent level.",
  "insights": ["Review the lease before renewal."]
}
```"#;

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn record(ts: NaiveDateTime, category: &str, amount: f64) -> TransactionRecord {
    TransactionRecord {
        timestamp: ts,
        category: category.to_string(),
        amount,
        scope_id: "acme".to_string(),
    }
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

/// One category active in four months, two categories seen in a single month each.
fn scenario_records() -> Vec<TransactionRecord> {
    vec![
        record(at(2024, 1, 3), "Rent", 1200.0),
        record(at(2024, 2, 3), "Rent", 1200.0),
        record(at(2024, 3, 3), "Rent", 1150.0),
        record(at(2024, 3, 28), "Rent", 50.0),
        record(at(2024, 4, 3), "Rent", 1200.0),
        record(at(2024, 2, 14), "Gifts", 90.0),
        record(at(2024, 3, 9), "Travel", 640.0),
    ]
}

fn pipeline<'g>(
    records: Vec<TransactionRecord>,
    generator: &'g ScriptedGenerator,
    model: LastValueModel,
) -> ForecastPipeline<InMemoryStore, &'g ScriptedGenerator, LastValueModel> {
    ForecastPipeline::with_model(
        ForecastConfig::default(),
        InMemoryStore::new(records),
        generator,
        model,
    )
    .unwrap()
}

#[tokio::test]
async fn test_single_sufficient_category_scenario() {
    let generator = ScriptedGenerator::replying(GOOD_REPLY);
    let pipeline = pipeline(scenario_records(), &generator, LastValueModel::new());

    let outcome = pipeline.build_forecasts("acme", as_of()).await.unwrap();
    assert_eq!(
        outcome.forecasts.categories.keys().collect::<Vec<_>>(),
        vec!["Rent"]
    );
    assert_eq!(
        outcome.insufficient,
        ["Gifts", "Travel"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
    );
    assert_eq!(outcome.forecasts.categories["Rent"].len(), 6);
    assert_eq!(
        outcome.forecasts.categories["Rent"][0].month,
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    );
    assert_eq!(outcome.forecasts.total.len(), 6);

    let report = pipeline.generate_forecast_as_of("acme", as_of()).await.unwrap();

    let table_categories: BTreeSet<&str> = report
        .forecast_table
        .rows
        .iter()
        .map(|row| row[0].as_str())
        .collect();
    assert_eq!(table_categories, ["Gifts", "Rent", "Travel"].into_iter().collect());
    assert_eq!(
        report.forecast_table.headers,
        vec![
            "Category",
            "Date",
            "Forecast Amount (RM)",
            "Estimate Range (RM)"
        ]
    );
    for name in ["Gifts", "Travel"] {
        let row = report
            .forecast_table
            .rows
            .iter()
            .find(|row| row[0] == name)
            .unwrap();
        assert_eq!(row[2], INSUFFICIENT_DATA);
        assert_eq!(row[3], INSUFFICIENT_DATA);
    }
    let rent_rows: Vec<_> = report
        .forecast_table
        .rows
        .iter()
        .filter(|row| row[0] == "Rent")
        .collect();
    assert_eq!(rent_rows.len(), 6);
    assert_eq!(rent_rows[0][1], "May 2024");
    assert_eq!(rent_rows[0][2], "RM 1,200.00");
    assert_eq!(rent_rows[0][3], "RM 1,150.00 - RM 1,250.00");

    assert_eq!(report.chart_data.keys().collect::<Vec<_>>(), vec!["Rent"]);
    assert_eq!(report.executive_summary, "Rent dominates spending and stays flat.");
    assert_eq!(report.insights, vec!["Review the lease before renewal."]);
}

#[tokio::test]
async fn test_prompt_lists_insufficient_categories_and_period() {
    let generator = ScriptedGenerator::replying(GOOD_REPLY);
    let pipeline = pipeline(scenario_records(), &generator, LastValueModel::new());

    pipeline.generate_forecast_as_of("acme", as_of()).await.unwrap();

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains("[\"Gifts\",\"Travel\"]"));
    assert!(prompt.contains("Current period: June 2024"));
    assert!(prompt.contains("Malaysian"));
    assert!(prompt.contains("Consider 8% annual inflation rate"));
    assert!(prompt.contains(INSUFFICIENT_DATA));
    assert!(!prompt.contains("chart_data"));
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let records: Vec<TransactionRecord> = (1..=12)
        .flat_map(|m| {
            vec![
                record(at(2023, m, 5), "Rent", 1500.0 + m as f64 * 5.0),
                record(at(2023, m, 18), "Utilities", 200.0 + (m % 4) as f64 * 30.0),
            ]
        })
        .collect();
    let generator = ScriptedGenerator::replying(GOOD_REPLY);
    let pipeline = ForecastPipeline::new(
        ForecastConfig::default(),
        InMemoryStore::new(records),
        &generator,
    )
    .unwrap();

    let first = pipeline.generate_forecast_as_of("acme", as_of()).await.unwrap();
    let second = pipeline.generate_forecast_as_of("acme", as_of()).await.unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    let prompts = generator.prompts();
    assert_eq!(prompts[0], prompts[1]);
}

#[tokio::test]
async fn test_unavailable_store_is_data_access_error() {
    let generator = ScriptedGenerator::replying(GOOD_REPLY);
    let pipeline = ForecastPipeline::with_model(
        ForecastConfig::default(),
        InMemoryStore::unavailable(),
        &generator,
        LastValueModel::new(),
    )
    .unwrap();

    let err = pipeline
        .generate_forecast_as_of("acme", as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, ForecastError::DataAccess(_)));
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn test_history_outside_window_or_scope_is_empty() {
    let mut records = vec![record(at(2021, 3, 1), "Rent", 1000.0)];
    records.push(TransactionRecord {
        scope_id: "other-company".to_string(),
        ..record(at(2024, 3, 1), "Rent", 1000.0)
    });
    let generator = ScriptedGenerator::replying(GOOD_REPLY);
    let pipeline = pipeline(records, &generator, LastValueModel::new());

    let err = pipeline
        .generate_forecast_as_of("acme", as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, ForecastError::EmptyHistory));
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn test_generator_failure_is_generation_error() {
    let generator = ScriptedGenerator::failing("quota exceeded");
    let pipeline = pipeline(scenario_records(), &generator, LastValueModel::new());

    let err = pipeline
        .generate_forecast_as_of("acme", as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, ForecastError::Generation(ref msg) if msg.contains("quota")));
    assert_eq!(generator.prompts().len(), 1);
}

#[tokio::test]
async fn test_output_without_json_is_extraction_error() {
    let raw = "I'm sorry, I can't produce that report right now.";
    let generator = ScriptedGenerator::replying(raw);
    let pipeline = pipeline(scenario_records(), &generator, LastValueModel::new());

    let err = pipeline
        .generate_forecast_as_of("acme", as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, ForecastError::Extraction { .. }));
    assert_eq!(err.raw_output(), Some(raw));
    assert_eq!(generator.prompts().len(), 1);
}

#[tokio::test]
async fn test_malformed_json_is_parse_error_with_raw_text() {
    let raw = "Report: {\"executive_summary\": \"cut off";
    let generator = ScriptedGenerator::replying(raw);
    let pipeline = pipeline(scenario_records(), &generator, LastValueModel::new());

    let err = pipeline
        .generate_forecast_as_of("acme", as_of())
        .await
        .unwrap_err();
    assert!(matches!(err, ForecastError::JsonParse { .. }));
    assert_eq!(err.raw_output(), Some(raw));
}

#[tokio::test]
async fn test_highlights_pick_two_largest_categories() {
    let mut records = Vec::new();
    for m in 1..=5 {
        records.push(record(at(2024, m, 2), "Rent", 1200.0));
        records.push(record(at(2024, m, 6), "Salaries", 9000.0));
        records.push(record(at(2024, m, 9), "Utilities", 300.0));
        records.push(record(at(2024, m, 12), "Software", 450.0));
    }
    let generator = ScriptedGenerator::replying(GOOD_REPLY);
    let pipeline = pipeline(records, &generator, LastValueModel::new());

    let report = pipeline.generate_forecast_as_of("acme", as_of()).await.unwrap();

    assert_eq!(
        report.chart_data.keys().collect::<Vec<_>>(),
        vec!["Rent", "Salaries"]
    );
    let salaries = &report.chart_data["Salaries"];
    assert_eq!(salaries.len(), 6);
    assert_eq!(salaries[0].label, "Jun 2024");
    assert_eq!(salaries[5].label, "Nov 2024");
    assert!((salaries[0].value - 9000.0).abs() < 1e-9);
}

#[test]
fn test_total_series_is_sum_of_categories() {
    let records = vec![
        record(at(2024, 1, 3), "Rent", 1000.0),
        record(at(2024, 3, 3), "Rent", 1000.0),
        record(at(2024, 2, 10), "Food", 120.0),
        record(at(2024, 2, 20), "Food", 80.0),
        record(at(2024, 4, 10), "Food", 150.0),
    ];
    let window = HistoryWindow::trailing(as_of(), 24).unwrap();
    let points = aggregate_transactions(&records, window);
    let history = SeriesBuilder::new(3).build(&points).unwrap();

    assert_eq!(history.total.len(), 4);
    for point in &history.total.points {
        let expected: f64 = history
            .categories
            .values()
            .filter_map(|c| c.series.value_at(point.month))
            .sum();
        assert!((point.value - expected).abs() < 1e-9);
    }
    assert_eq!(history.total.values(), vec![1000.0, 200.0, 1000.0, 150.0]);
    // Rent spans Jan..Mar with February filled as zero
    assert_eq!(history.categories["Rent"].series.values(), vec![1000.0, 0.0, 1000.0]);
    assert_eq!(history.categories["Rent"].verdict, Sufficiency::Insufficient);
}

#[tokio::test]
async fn test_failed_fit_demotes_category() {
    let mut records = scenario_records();
    for m in 1..=4 {
        records.push(record(at(2024, m, 20), "Utilities", 310.0));
    }
    let generator = ScriptedGenerator::replying(GOOD_REPLY);
    let pipeline = pipeline(records, &generator, LastValueModel::failing_on("Utilities"));

    let report = pipeline.generate_forecast_as_of("acme", as_of()).await.unwrap();

    let utilities: Vec<_> = report
        .forecast_table
        .rows
        .iter()
        .filter(|row| row[0] == "Utilities")
        .collect();
    assert_eq!(utilities.len(), 1);
    assert_eq!(utilities[0][2], INSUFFICIENT_DATA);
    assert!(!report.chart_data.contains_key("Utilities"));
    assert!(generator.prompts()[0].contains("\"Utilities\""));
}

#[tokio::test]
async fn test_failed_total_fit_still_produces_report() {
    let generator = ScriptedGenerator::replying(GOOD_REPLY);
    let pipeline = pipeline(
        scenario_records(),
        &generator,
        LastValueModel::failing_on(TOTAL_SERIES_NAME),
    );

    let outcome = pipeline.build_forecasts("acme", as_of()).await.unwrap();
    assert!(outcome.forecasts.total.is_empty());
    assert!(outcome.forecasts.categories.contains_key("Rent"));

    let report = pipeline.generate_forecast_as_of("acme", as_of()).await;
    assert!(report.is_ok());
}

#[test]
fn test_config_from_partial_json() {
    let config = ForecastConfig::from_json_str(
        r#"{"horizon_months": 3, "currency_symbol": "USD", "model": {"kind": "holt_winters", "alpha": 0.5, "beta": 0.1, "gamma": 0.2, "interval_width": 0.9}}"#,
    )
    .unwrap();
    assert_eq!(config.horizon_months, 3);
    assert_eq!(config.window_months, 24);
    assert_eq!(config.currency_symbol, "USD");
    assert!(matches!(config.model, ModelSpec::HoltWinters { .. }));
}
