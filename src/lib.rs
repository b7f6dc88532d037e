//! # Financial Forecast Builder
//!
//! Turns a company's categorized transaction history into a forward-looking
//! forecast report: per-category and total projections for the next months,
//! paired with a structured narrative written by an external text generator.
//!
//! ## Pipeline
//!
//! - **Aggregation**: transactions in a trailing window are summed per (year, month, category)
//! - **Series building**: each category becomes a contiguous monthly series with gaps as zero,
//!   plus a combined total; categories with too few active months are marked insufficient
//! - **Forecasting**: sufficient series are fitted with a seasonal model and projected with
//!   uncertainty bounds; per-category failures are demoted rather than aborting the run
//! - **Highlights**: the largest forecast categories become chart series
//! - **Synthesis**: a generation request embeds the numbers, the generator is called once,
//!   and a report is recovered from its free-form output
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_forecast_builder::*;
//!
//! let store = InMemoryStore::new(records);
//! let generator = llm::GeminiClient::from_env()?;
//! let pipeline = ForecastPipeline::new(ForecastConfig::default(), store, generator)?;
//!
//! let report = pipeline.generate_forecast("company-42").await?;
//! println!("{}", report.executive_summary);
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod extraction;
pub mod forecasting;
pub mod highlights;
pub mod ingestion;
pub mod model;
pub mod prompts;
pub mod report;
pub mod schema;
pub mod seasonality;
pub mod series;
pub mod synthesizer;
pub mod utils;

#[cfg(feature = "gemini")]
pub mod llm;

pub use aggregator::{aggregate_transactions, HistoricalAggregator, HistoryWindow, TransactionStore};
pub use config::{ForecastConfig, ModelSpec};
pub use error::{ForecastError, Result};
pub use extraction::{extract_json, strip_code_fences};
pub use forecasting::{ForecastOutcome, ForecastingEngine};
pub use highlights::select_highlights;
pub use ingestion::InMemoryStore;
pub use model::{FittedModel, HoltWintersModel, SeasonalTrendModel, SeriesModel};
pub use report::{build_forecast_table, ReportRequest, INSUFFICIENT_DATA};
pub use schema::*;
pub use series::{SeriesBuilder, TOTAL_SERIES_NAME};
pub use synthesizer::{ReportSynthesizer, TextGenerator};

use chrono::{Local, NaiveDate};
use log::info;

pub struct ForecastPipeline<S, G, M = ModelSpec> {
    config: ForecastConfig,
    aggregator: HistoricalAggregator<S>,
    builder: SeriesBuilder,
    engine: ForecastingEngine<M>,
    synthesizer: ReportSynthesizer<G>,
}

impl<S, G> ForecastPipeline<S, G, ModelSpec>
where
    S: TransactionStore,
    G: TextGenerator,
{
    /// Builds a pipeline using the model described by `config.model`.
    pub fn new(config: ForecastConfig, store: S, generator: G) -> Result<Self> {
        let model = config.model.clone();
        Self::with_model(config, store, generator, model)
    }
}

impl<S, G, M> ForecastPipeline<S, G, M>
where
    S: TransactionStore,
    G: TextGenerator,
    M: SeriesModel + 'static,
{
    pub fn with_model(config: ForecastConfig, store: S, generator: G, model: M) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            aggregator: HistoricalAggregator::new(store, config.window_months),
            builder: SeriesBuilder::new(config.min_nonzero_months),
            engine: ForecastingEngine::new(model, config.horizon_months, config.min_total_points),
            synthesizer: ReportSynthesizer::new(generator),
            config,
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Runs the full pipeline for `scope_id` with today as the reference date.
    pub async fn generate_forecast(&self, scope_id: &str) -> Result<ReportPayload> {
        self.generate_forecast_as_of(scope_id, Local::now().date_naive())
            .await
    }

    pub async fn generate_forecast_as_of(
        &self,
        scope_id: &str,
        as_of: NaiveDate,
    ) -> Result<ReportPayload> {
        let outcome = self.build_forecasts(scope_id, as_of).await?;

        let chart_data = select_highlights(&outcome.forecasts, self.config.highlight_count);
        let request = ReportRequest {
            forecasts: &outcome.forecasts,
            insufficient: &outcome.insufficient,
            as_of,
            currency_symbol: &self.config.currency_symbol,
            audience: &self.config.audience,
            annual_inflation_rate: self.config.annual_inflation_rate,
        };

        info!("Synthesizing forecast report for scope {}", scope_id);
        self.synthesizer.synthesize(&request, chart_data).await
    }

    /// Aggregation, series building and forecasting, without report synthesis.
    pub async fn build_forecasts(&self, scope_id: &str, as_of: NaiveDate) -> Result<ForecastOutcome> {
        let points = self.aggregator.load(scope_id, as_of).await?;
        let history = self.builder.build(&points)?;

        info!(
            "Built {} category series over {} months for scope {}",
            history.categories.len(),
            history.total.len(),
            scope_id
        );

        Ok(self.engine.forecast(&history).await)
    }
}
