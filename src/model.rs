//! Statistical models used to project monthly series.
//!
//! Two models are provided behind the [`SeriesModel`] capability:
//!
//! - **SeasonalTrendModel**: linear trend plus additive yearly seasonality from
//!   calendar-month Fourier terms, fitted by penalised least squares. Seasonal
//!   terms enter only once the series covers a full year; shorter series (down
//!   to two months) get the trend alone.
//! - **HoltWintersModel**: additive triple exponential smoothing with a 12 month
//!   period. Needs at least two full years of history.
//!
//! Both report an uncertainty band `z·σ·sqrt(1 + h/n)` around the point estimate,
//! where σ is the in-sample error spread and `h` the step ahead.

use crate::config::ModelSpec;
use crate::error::{ForecastError, Result};
use crate::schema::{ForecastPoint, MonthlySeries};
use crate::seasonality::{interval_z, yearly_fourier_terms, MONTHS_PER_YEAR};
use crate::utils::add_months;
use chrono::NaiveDate;

/// Fits a model to a monthly series.
pub trait SeriesModel: Send + Sync {
    fn fit(&self, series: &MonthlySeries) -> Result<Box<dyn FittedModel>>;
}

/// A fitted model that projects forward from the last observed month.
pub trait FittedModel: Send {
    fn predict(&self, horizon: usize) -> Result<Vec<ForecastPoint>>;
}

impl SeriesModel for ModelSpec {
    fn fit(&self, series: &MonthlySeries) -> Result<Box<dyn FittedModel>> {
        match *self {
            ModelSpec::SeasonalTrend {
                fourier_order,
                seasonality_penalty,
                interval_width,
            } => SeasonalTrendModel {
                fourier_order,
                seasonality_penalty,
                interval_width,
            }
            .fit(series),
            ModelSpec::HoltWinters {
                alpha,
                beta,
                gamma,
                interval_width,
            } => HoltWintersModel {
                alpha,
                beta,
                gamma,
                interval_width,
            }
            .fit(series),
        }
    }
}

fn checked_observations(series: &MonthlySeries, min_points: usize) -> Result<(Vec<f64>, NaiveDate)> {
    if series.len() < min_points {
        return Err(ForecastError::model_fit(
            &series.name,
            format!(
                "at least {} monthly points required, got {}",
                min_points,
                series.len()
            ),
        ));
    }
    let values = series.values();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::model_fit(
            &series.name,
            "series contains non-finite values",
        ));
    }
    let last_month = series
        .last_month()
        .ok_or_else(|| ForecastError::model_fit(&series.name, "series is empty"))?;
    Ok((values, last_month))
}

fn band(point: f64, z: f64, sigma: f64, step: usize, n: usize) -> (f64, f64) {
    let half_width = z * sigma * (1.0 + step as f64 / n as f64).sqrt();
    (point - half_width, point + half_width)
}

// ---------------------------------------------------------------------------
// Trend + Fourier seasonality
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalTrendModel {
    pub fourier_order: usize,
    pub seasonality_penalty: f64,
    pub interval_width: f64,
}

impl Default for SeasonalTrendModel {
    fn default() -> Self {
        Self {
            fourier_order: 3,
            seasonality_penalty: 1.0,
            interval_width: 0.8,
        }
    }
}

#[derive(Debug, Clone)]
struct SeasonalTrendFit {
    name: String,
    coefficients: Vec<f64>,
    fourier_order: usize,
    n_observations: usize,
    last_month: NaiveDate,
    sigma: f64,
    z: f64,
}

impl SeasonalTrendFit {
    fn design_row(fourier_order: usize, time: f64, month: NaiveDate) -> Vec<f64> {
        let mut row = Vec::with_capacity(2 + 2 * fourier_order);
        row.push(1.0);
        row.push(time);
        row.extend(yearly_fourier_terms(month, fourier_order));
        row
    }

    fn time_scale(n_observations: usize) -> f64 {
        (n_observations.saturating_sub(1)).max(1) as f64
    }
}

impl SeriesModel for SeasonalTrendModel {
    fn fit(&self, series: &MonthlySeries) -> Result<Box<dyn FittedModel>> {
        let (values, last_month) = checked_observations(series, 2)?;
        let n = values.len();
        let scale = SeasonalTrendFit::time_scale(n);
        // Months never observed would otherwise be pure extrapolation of the harmonics
        let fourier_order = if n >= MONTHS_PER_YEAR {
            self.fourier_order
        } else {
            0
        };
        let p = 2 + 2 * fourier_order;

        let rows: Vec<Vec<f64>> = series
            .points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                SeasonalTrendFit::design_row(fourier_order, i as f64 / scale, point.month)
            })
            .collect();

        // Normal equations (XᵀX + λ·I_seasonal) β = Xᵀy; intercept and slope are unpenalised.
        let mut xtx = vec![vec![0.0; p]; p];
        let mut xty = vec![0.0; p];
        for (row, &y) in rows.iter().zip(&values) {
            for j in 0..p {
                xty[j] += row[j] * y;
                for k in 0..p {
                    xtx[j][k] += row[j] * row[k];
                }
            }
        }
        for (j, xtx_row) in xtx.iter_mut().enumerate().skip(2) {
            xtx_row[j] += self.seasonality_penalty;
        }

        let coefficients = solve_linear_system(xtx, xty).ok_or_else(|| {
            ForecastError::model_fit(&series.name, "normal equations are singular")
        })?;

        let ssr: f64 = rows
            .iter()
            .zip(&values)
            .map(|(row, &y)| (y - dot(row, &coefficients)).powi(2))
            .sum();
        let sigma = (ssr / n.saturating_sub(p).max(1) as f64).sqrt();
        if !sigma.is_finite() {
            return Err(ForecastError::model_fit(
                &series.name,
                "residual variance is not finite",
            ));
        }

        Ok(Box::new(SeasonalTrendFit {
            name: series.name.clone(),
            coefficients,
            fourier_order,
            n_observations: n,
            last_month,
            sigma,
            z: interval_z(self.interval_width),
        }))
    }
}

impl FittedModel for SeasonalTrendFit {
    fn predict(&self, horizon: usize) -> Result<Vec<ForecastPoint>> {
        let scale = Self::time_scale(self.n_observations);
        let mut forecasts = Vec::with_capacity(horizon);

        for step in 1..=horizon {
            let month = add_months(self.last_month, step as u32)?;
            let time = (self.n_observations - 1 + step) as f64 / scale;
            let row = Self::design_row(self.fourier_order, time, month);
            let point = dot(&row, &self.coefficients);
            if !point.is_finite() {
                return Err(ForecastError::model_fit(
                    &self.name,
                    "prediction is not finite",
                ));
            }
            let (lower_bound, upper_bound) =
                band(point, self.z, self.sigma, step, self.n_observations);
            forecasts.push(ForecastPoint {
                month,
                point_estimate: point,
                lower_bound,
                upper_bound,
            });
        }

        Ok(forecasts)
    }
}

// ---------------------------------------------------------------------------
// Holt-Winters (additive)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct HoltWintersModel {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub interval_width: f64,
}

#[derive(Debug, Clone)]
struct HoltWintersFit {
    name: String,
    level: f64,
    trend: f64,
    seasonal: Vec<f64>,
    n_observations: usize,
    last_month: NaiveDate,
    sigma: f64,
    z: f64,
}

impl SeriesModel for HoltWintersModel {
    fn fit(&self, series: &MonthlySeries) -> Result<Box<dyn FittedModel>> {
        let period = MONTHS_PER_YEAR;
        let (data, last_month) = checked_observations(series, period * 2)?;

        // Level from the first season, trend from the first two seasons
        let first_season_avg = data[..period].iter().sum::<f64>() / period as f64;
        let second_season_avg = data[period..2 * period].iter().sum::<f64>() / period as f64;
        let mut level = first_season_avg;
        let mut trend = (second_season_avg - first_season_avg) / period as f64;
        let mut seasonal: Vec<f64> = data[..period].iter().map(|v| v - level).collect();

        let mut squared_errors = 0.0;
        let mut error_count = 0usize;

        for (i, &value) in data.iter().enumerate().skip(period) {
            let season_idx = i % period;
            let prev_level = level;
            let prev_seasonal = seasonal[season_idx];

            let one_step = level + trend + prev_seasonal;
            squared_errors += (value - one_step).powi(2);
            error_count += 1;

            level = self.alpha * (value - prev_seasonal) + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (level - prev_level) + (1.0 - self.beta) * trend;
            seasonal[season_idx] =
                self.gamma * (value - level) + (1.0 - self.gamma) * prev_seasonal;
        }

        let sigma = (squared_errors / error_count.max(1) as f64).sqrt();
        if !(level.is_finite() && trend.is_finite() && sigma.is_finite()) {
            return Err(ForecastError::model_fit(
                &series.name,
                "smoothing diverged to non-finite state",
            ));
        }

        Ok(Box::new(HoltWintersFit {
            name: series.name.clone(),
            level,
            trend,
            seasonal,
            n_observations: data.len(),
            last_month,
            sigma,
            z: interval_z(self.interval_width),
        }))
    }
}

impl FittedModel for HoltWintersFit {
    fn predict(&self, horizon: usize) -> Result<Vec<ForecastPoint>> {
        let period = self.seasonal.len();
        let mut forecasts = Vec::with_capacity(horizon);

        for step in 1..=horizon {
            let month = add_months(self.last_month, step as u32)?;
            let season_idx = (self.n_observations + step - 1) % period;
            let point = self.level + step as f64 * self.trend + self.seasonal[season_idx];
            if !point.is_finite() {
                return Err(ForecastError::model_fit(
                    &self.name,
                    "prediction is not finite",
                ));
            }
            let (lower_bound, upper_bound) =
                band(point, self.z, self.sigma, step, self.n_observations);
            forecasts.push(ForecastPoint {
                month,
                point_estimate: point,
                lower_bound,
                upper_bound,
            });
        }

        Ok(forecasts)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Gaussian elimination with partial pivoting. `None` when the system is singular.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let magnitude = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tolerance = 1e-12 * magnitude.max(1.0);

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot_row][col].abs() < tolerance {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SeriesPoint;
    use crate::utils::{add_months, months_between};

    fn series_from(name: &str, start: NaiveDate, values: &[f64]) -> MonthlySeries {
        MonthlySeries {
            name: name.to_string(),
            points: values
                .iter()
                .enumerate()
                .map(|(i, &value)| SeriesPoint {
                    month: add_months(start, i as u32).unwrap(),
                    value,
                })
                .collect(),
        }
    }

    fn jan_2022() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
    }

    fn seasonal_values(months: usize) -> Vec<f64> {
        (0..months)
            .map(|i| {
                1000.0
                    + 5.0 * i as f64
                    + 200.0 * (2.0 * std::f64::consts::PI * (i % 12) as f64 / 12.0).sin()
            })
            .collect()
    }

    fn assert_well_formed(forecast: &[ForecastPoint], last: NaiveDate, horizon: usize) {
        assert_eq!(forecast.len(), horizon);
        for (i, point) in forecast.iter().enumerate() {
            assert_eq!(months_between(last, point.month), i as i32 + 1);
            assert!(point.lower_bound <= point.point_estimate);
            assert!(point.point_estimate <= point.upper_bound);
        }
    }

    #[test]
    fn test_solve_linear_system() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let b = vec![3.0, 5.0];
        let x = solve_linear_system(a, b).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);

        let singular = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve_linear_system(singular, vec![1.0, 2.0]).is_none());
    }

    #[test]
    fn test_seasonal_trend_extends_linear_series() {
        let values: Vec<f64> = (0..12).map(|i| 100.0 + 10.0 * i as f64).collect();
        let series = series_from("Rent", jan_2022(), &values);
        let fitted = SeasonalTrendModel::default().fit(&series).unwrap();
        let forecast = fitted.predict(6).unwrap();

        assert_well_formed(&forecast, series.last_month().unwrap(), 6);
        assert!(forecast[5].point_estimate > forecast[0].point_estimate);
        assert!((forecast[0].point_estimate - 220.0).abs() < 25.0);
    }

    #[test]
    fn test_seasonal_trend_captures_calendar_effects() {
        let values = seasonal_values(24);
        let series = series_from("Travel", jan_2022(), &values);
        let fitted = SeasonalTrendModel::default().fit(&series).unwrap();
        let forecast = fitted.predict(6).unwrap();

        // Jan..Jun 2024: the sine peaks in April (index 3)
        assert_eq!(forecast[0].month, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(forecast[3].point_estimate > forecast[0].point_estimate + 100.0);
        assert!(forecast[3].point_estimate > forecast[5].point_estimate);
    }

    #[test]
    fn test_seasonal_trend_fits_two_points() {
        let series = series_from("Total", jan_2022(), &[100.0, 140.0]);
        let fitted = SeasonalTrendModel::default().fit(&series).unwrap();
        let forecast = fitted.predict(6).unwrap();
        assert_well_formed(&forecast, series.last_month().unwrap(), 6);
    }

    #[test]
    fn test_short_series_stays_near_observed_range() {
        for values in [vec![100.0, 500.0, 80.0, 450.0], vec![100.0, 500.0, 80.0]] {
            let series = series_from("Utilities", jan_2022(), &values);
            let forecast = SeasonalTrendModel::default()
                .fit(&series)
                .unwrap()
                .predict(6)
                .unwrap();
            assert_well_formed(&forecast, series.last_month().unwrap(), 6);

            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            for point in &forecast {
                assert!(point.point_estimate > 0.0, "{:?}", point);
                assert!(point.point_estimate < 2.0 * max, "{:?}", point);
            }
            // The first band still reaches the observed values
            assert!(forecast[0].lower_bound <= max);
            assert!(forecast[0].upper_bound >= min);
        }
    }

    #[test]
    fn test_seasonal_trend_rejects_tiny_or_broken_series() {
        let single = series_from("Gifts", jan_2022(), &[10.0]);
        assert!(matches!(
            SeasonalTrendModel::default().fit(&single),
            Err(ForecastError::ModelFit { .. })
        ));

        let broken = series_from("Gifts", jan_2022(), &[10.0, f64::NAN, 12.0]);
        assert!(matches!(
            SeasonalTrendModel::default().fit(&broken),
            Err(ForecastError::ModelFit { .. })
        ));
    }

    #[test]
    fn test_bands_widen_with_horizon() {
        let values: Vec<f64> = (0..18)
            .map(|i| 500.0 + if i % 2 == 0 { 40.0 } else { -40.0 })
            .collect();
        let series = series_from("Food", jan_2022(), &values);
        let forecast = SeasonalTrendModel::default()
            .fit(&series)
            .unwrap()
            .predict(6)
            .unwrap();
        let width = |p: &ForecastPoint| p.upper_bound - p.lower_bound;
        assert!(width(&forecast[0]) > 0.0);
        assert!(width(&forecast[5]) > width(&forecast[0]));
    }

    #[test]
    fn test_holt_winters_requires_two_years() {
        let model = HoltWintersModel {
            alpha: 0.8,
            beta: 0.15,
            gamma: 0.1,
            interval_width: 0.8,
        };
        let short = series_from("Rent", jan_2022(), &seasonal_values(23));
        assert!(matches!(model.fit(&short), Err(ForecastError::ModelFit { .. })));

        let long = series_from("Rent", jan_2022(), &seasonal_values(30));
        let forecast = model.fit(&long).unwrap().predict(6).unwrap();
        assert_well_formed(&forecast, long.last_month().unwrap(), 6);
    }

    #[test]
    fn test_model_spec_dispatches() {
        let series = series_from("Rent", jan_2022(), &[1.0, 2.0, 3.0]);
        assert!(ModelSpec::default().fit(&series).is_ok());
        assert!(ModelSpec::holt_winters().fit(&series).is_err());
    }
}
