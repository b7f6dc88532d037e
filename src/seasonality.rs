use chrono::{Datelike, NaiveDate};
use std::f64::consts::PI;

pub const MONTHS_PER_YEAR: usize = 12;

/// 0-based calendar month index (Jan = 0, Dec = 11).
pub fn month_of_year_index(date: NaiveDate) -> usize {
    date.month0() as usize
}

/// Yearly Fourier features for a calendar month: `[sin(2πk·m/12), cos(2πk·m/12)]` for k in 1..=order.
///
/// Features depend only on the calendar month, so the same month in different years
/// shares its seasonal effect.
pub fn yearly_fourier_terms(date: NaiveDate, order: usize) -> Vec<f64> {
    let position = month_of_year_index(date) as f64 / MONTHS_PER_YEAR as f64;
    let mut terms = Vec::with_capacity(order * 2);
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * position;
        terms.push(angle.sin());
        terms.push(angle.cos());
    }
    terms
}

/// Inverse of the standard normal CDF (Acklam's rational approximation).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Two-sided z multiplier for a central interval covering `width` of the mass.
pub fn interval_z(width: f64) -> f64 {
    normal_quantile(0.5 + width / 2.0)
}
