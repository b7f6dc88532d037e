use chrono::{Datelike, Local, Months, NaiveDate};
use dotenv::dotenv;
use financial_forecast_builder::llm::GeminiClient;
use financial_forecast_builder::{ForecastConfig, ForecastPipeline, InMemoryStore, TransactionRecord};
use std::error::Error;

const SCOPE: &str = "demo-company";

fn sample_records(as_of: NaiveDate) -> Vec<TransactionRecord> {
    let mut records = Vec::new();
    let start = NaiveDate::from_ymd_opt(as_of.year(), as_of.month(), 1)
        .and_then(|d| d.checked_sub_months(Months::new(20)));
    let Some(start) = start else {
        return records;
    };

    for offset in 0..20u32 {
        let Some(month) = start.checked_add_months(Months::new(offset)) else {
            continue;
        };
        let season = ((month.month() as f64 - 1.0) / 12.0 * std::f64::consts::TAU).sin();
        let entries = [
            ("Office Rent", 4, 8_500.0),
            ("Utilities", 12, 1_150.0 + 220.0 * season),
            ("Salaries", 25, 42_000.0 + 350.0 * offset as f64),
            ("Marketing", 15, 3_000.0 + 1_200.0 * season.max(0.0)),
        ];
        for (category, day, amount) in entries {
            if let Some(ts) = month.with_day(day).and_then(|d| d.and_hms_opt(10, 0, 0)) {
                records.push(TransactionRecord {
                    timestamp: ts,
                    category: category.to_string(),
                    amount,
                    scope_id: SCOPE.to_string(),
                });
            }
        }
    }

    // A single one-off spend stays in the report as insufficient data
    if let Some(ts) = start
        .checked_add_months(Months::new(14))
        .and_then(|d| d.and_hms_opt(15, 30, 0))
    {
        records.push(TransactionRecord {
            timestamp: ts,
            category: "Equipment".to_string(),
            amount: 12_400.0,
            scope_id: SCOPE.to_string(),
        });
    }

    records
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    println!("📈 Financial Forecast Report Demonstration");
    println!("═══════════════════════════════════════════════════════════════\n");

    let config = match std::env::var("FORECAST_CONFIG") {
        Ok(path) => ForecastConfig::from_path(path)?,
        Err(_) => ForecastConfig::default(),
    };

    let as_of = Local::now().date_naive();
    let store = InMemoryStore::new(sample_records(as_of));
    println!("   📋 Loaded {} sample transactions for {}", store.len(), SCOPE);

    let client = GeminiClient::from_env()?;
    println!("   🤖 Using model {}\n", client.model());

    let pipeline = ForecastPipeline::new(config, store, client)?;

    let outcome = pipeline.build_forecasts(SCOPE, as_of).await?;
    println!("   ✅ Forecast categories: {}", outcome.forecasts.categories.len());
    for name in &outcome.insufficient {
        println!("   ⚠️  Insufficient data: {}", name);
    }
    println!();

    match pipeline.generate_forecast_as_of(SCOPE, as_of).await {
        Ok(report) => {
            println!("═══════════════════════════════════════════════════════════════");
            println!("📝 Report");
            println!("═══════════════════════════════════════════════════════════════\n");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            if let Some(raw) = e.raw_output() {
                eprintln!("\n--- Raw generator output ---\n{}", raw);
            }
        }
    }

    Ok(())
}
