use crate::error::{ForecastError, Result};
use crate::extraction::extract_json;
use crate::prompts::build_forecast_prompt;
use crate::report::{reconcile_forecast_table, ReportRequest};
use crate::schema::{ChartSeries, GeneratedReport, ReportPayload};
use log::{debug, info};

/// External free-form text generator. Output is untrusted text.
#[allow(async_fn_in_trait)]
pub trait TextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct ReportSynthesizer<G> {
    generator: G,
}

impl<G: TextGenerator> ReportSynthesizer<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Calls the generator exactly once and recovers a report from its output.
    ///
    /// Malformed output is returned as an error carrying the raw text; it is never retried.
    pub async fn synthesize(
        &self,
        request: &ReportRequest<'_>,
        chart_data: ChartSeries,
    ) -> Result<ReportPayload> {
        let prompt = build_forecast_prompt(request)?;
        debug!("Generation request is {} characters", prompt.len());

        let raw = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| match e {
                ForecastError::Generation(_) => e,
                other => ForecastError::Generation(other.to_string()),
            })?;
        info!("Received {} characters from text generator", raw.len());

        let value = extract_json(&raw)?;
        let mut report: GeneratedReport =
            serde_json::from_value(value).map_err(|source| ForecastError::JsonParse {
                source,
                raw: raw.clone(),
            })?;

        report.forecast_table = reconcile_forecast_table(report.forecast_table, request);

        Ok(ReportPayload::from_generated(report, chart_data))
    }
}
