use crate::error::{ForecastError, Result};
use crate::model::SeriesModel;
use crate::schema::{ForecastPoint, ForecastSet, HistoricalSeries, InsufficientList, MonthlySeries};
use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;

/// Forecasts plus every category that ended up without one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastOutcome {
    pub forecasts: ForecastSet,
    pub insufficient: InsufficientList,
}

pub struct ForecastingEngine<M> {
    model: Arc<M>,
    horizon: usize,
    min_total_points: usize,
}

impl<M: SeriesModel + 'static> ForecastingEngine<M> {
    pub fn new(model: M, horizon: usize, min_total_points: usize) -> Self {
        Self {
            model: Arc::new(model),
            horizon,
            min_total_points,
        }
    }

    /// Fits and projects a single series synchronously.
    pub fn forecast_series(&self, series: &MonthlySeries) -> Result<Vec<ForecastPoint>> {
        fit_and_predict(self.model.as_ref(), series, self.horizon)
    }

    /// Forecasts the total and every sufficient category.
    ///
    /// Category fits fan out onto the blocking pool and are joined back in
    /// category order. A category whose fit fails is moved to the insufficient list.
    pub async fn forecast(&self, history: &HistoricalSeries) -> ForecastOutcome {
        let mut insufficient = history.insufficient();
        for name in &insufficient {
            warn!("Skipping category '{}': not enough data", name);
        }

        let candidates: Vec<MonthlySeries> = history.sufficient().cloned().collect();
        let names: Vec<String> = candidates.iter().map(|s| s.name.clone()).collect();
        info!(
            "Fitting {} category series (horizon {} months)",
            candidates.len(),
            self.horizon
        );

        let category_tasks = candidates
            .into_iter()
            .map(|series| self.spawn_fit(series))
            .collect::<Vec<_>>();

        let total_task = if history.total.len() >= self.min_total_points {
            Some(self.spawn_fit(history.total.clone()))
        } else {
            debug!(
                "Total series has {} points, fewer than {}; no total forecast",
                history.total.len(),
                self.min_total_points
            );
            None
        };

        let category_results = join_all(category_tasks).await;

        let mut forecasts = ForecastSet::default();
        for (name, joined) in names.into_iter().zip(category_results) {
            let result = joined.unwrap_or_else(|e| {
                Err(ForecastError::model_fit(&name, format!("fit task failed: {}", e)))
            });
            match result {
                Ok(points) => {
                    forecasts.categories.insert(name, points);
                }
                Err(e) => {
                    warn!("Demoting category '{}' to insufficient: {}", name, e);
                    insufficient.insert(name);
                }
            }
        }

        if let Some(task) = total_task {
            let result = task.await.unwrap_or_else(|e| {
                Err(ForecastError::model_fit(
                    &history.total.name,
                    format!("fit task failed: {}", e),
                ))
            });
            match result {
                Ok(points) => forecasts.total = points,
                Err(e) => warn!("Total series forecast unavailable: {}", e),
            }
        }

        debug!(
            "Forecast {} categories, {} insufficient",
            forecasts.categories.len(),
            insufficient.len()
        );

        ForecastOutcome {
            forecasts,
            insufficient,
        }
    }

    fn spawn_fit(
        &self,
        series: MonthlySeries,
    ) -> tokio::task::JoinHandle<Result<Vec<ForecastPoint>>> {
        let model = Arc::clone(&self.model);
        let horizon = self.horizon;
        tokio::task::spawn_blocking(move || fit_and_predict(model.as_ref(), &series, horizon))
    }
}

fn fit_and_predict<M: SeriesModel + ?Sized>(
    model: &M,
    series: &MonthlySeries,
    horizon: usize,
) -> Result<Vec<ForecastPoint>> {
    let points = model.fit(series)?.predict(horizon)?;

    if points.len() != horizon {
        return Err(ForecastError::model_fit(
            &series.name,
            format!("expected {} forecast points, got {}", horizon, points.len()),
        ));
    }
    if let Some(bad) = points
        .iter()
        .find(|p| !(p.lower_bound <= p.point_estimate && p.point_estimate <= p.upper_bound))
    {
        return Err(ForecastError::model_fit(
            &series.name,
            format!("inconsistent uncertainty band for {}", bad.month),
        ));
    }

    Ok(points)
}
