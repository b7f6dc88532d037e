use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Statistical model used for every series in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Linear trend with additive yearly seasonality from calendar-month Fourier terms.
    SeasonalTrend {
        fourier_order: usize,
        /// Ridge penalty on the seasonal coefficients; larger values shrink seasonality.
        seasonality_penalty: f64,
        interval_width: f64,
    },
    /// Additive Holt-Winters with a 12 month period. Needs two full years of history.
    HoltWinters {
        alpha: f64,
        beta: f64,
        gamma: f64,
        interval_width: f64,
    },
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::SeasonalTrend {
            fourier_order: 3,
            seasonality_penalty: 1.0,
            interval_width: 0.8,
        }
    }
}

impl ModelSpec {
    pub fn holt_winters() -> Self {
        Self::HoltWinters {
            alpha: 0.8,
            beta: 0.15,
            gamma: 0.1,
            interval_width: 0.8,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::SeasonalTrend {
                fourier_order,
                seasonality_penalty,
                interval_width,
            } => {
                if !(1..=6).contains(&fourier_order) {
                    return Err(ForecastError::InvalidConfig(format!(
                        "fourier_order {} must be between 1 and 6",
                        fourier_order
                    )));
                }
                if !(seasonality_penalty.is_finite() && seasonality_penalty > 0.0) {
                    return Err(ForecastError::InvalidConfig(format!(
                        "seasonality_penalty {} must be positive",
                        seasonality_penalty
                    )));
                }
                validate_interval_width(interval_width)
            }
            Self::HoltWinters {
                alpha,
                beta,
                gamma,
                interval_width,
            } => {
                for (name, value) in [("alpha", alpha), ("beta", beta), ("gamma", gamma)] {
                    if !(0.0 < value && value < 1.0) {
                        return Err(ForecastError::InvalidConfig(format!(
                            "{} {} must be between 0 and 1 (exclusive)",
                            name, value
                        )));
                    }
                }
                validate_interval_width(interval_width)
            }
        }
    }
}

fn validate_interval_width(width: f64) -> Result<()> {
    if !(0.0 < width && width < 1.0) {
        return Err(ForecastError::InvalidConfig(format!(
            "interval_width {} must be between 0 and 1 (exclusive)",
            width
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Trailing history window, in months, ending at the reference date
    pub window_months: u32,
    pub horizon_months: usize,
    /// A category needs at least this many months with positive spend to be modelled
    pub min_nonzero_months: usize,
    /// The combined total is forecast whenever it has at least this many points
    pub min_total_points: usize,
    pub highlight_count: usize,
    pub currency_symbol: String,
    pub audience: String,
    /// Fraction per year, e.g. 0.08 for 8%
    pub annual_inflation_rate: f64,
    pub model: ModelSpec,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window_months: 24,
            horizon_months: 6,
            min_nonzero_months: 3,
            min_total_points: 2,
            highlight_count: 2,
            currency_symbol: "RM".to_string(),
            audience: "Malaysian".to_string(),
            annual_inflation_rate: 0.08,
            model: ModelSpec::default(),
        }
    }
}

impl ForecastConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_months == 0 {
            return Err(ForecastError::InvalidConfig(
                "window_months must be at least 1".to_string(),
            ));
        }
        if self.horizon_months == 0 {
            return Err(ForecastError::InvalidConfig(
                "horizon_months must be at least 1".to_string(),
            ));
        }
        if self.min_total_points < 2 {
            return Err(ForecastError::InvalidConfig(format!(
                "min_total_points {} must be at least 2",
                self.min_total_points
            )));
        }
        if self.highlight_count == 0 {
            return Err(ForecastError::InvalidConfig(
                "highlight_count must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.annual_inflation_rate) {
            return Err(ForecastError::InvalidConfig(format!(
                "annual_inflation_rate {} must be in [0, 1)",
                self.annual_inflation_rate
            )));
        }
        if self.currency_symbol.trim().is_empty() {
            return Err(ForecastError::InvalidConfig(
                "currency_symbol must not be empty".to_string(),
            ));
        }
        self.model.validate()
    }
}
