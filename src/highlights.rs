use crate::schema::{ChartPoint, ChartSeries, ForecastSet};
use crate::utils::month_label;

/// Picks the `count` categories with the largest summed point estimates
/// (ties by name, ascending) and renders their forecasts as chart series.
pub fn select_highlights(forecasts: &ForecastSet, count: usize) -> ChartSeries {
    let mut ranked: Vec<(&String, f64)> = forecasts
        .categories
        .iter()
        .map(|(name, points)| (name, points.iter().map(|p| p.point_estimate).sum()))
        .collect();

    ranked.sort_by(|(a_name, a_sum), (b_name, b_sum)| {
        b_sum.total_cmp(a_sum).then_with(|| a_name.cmp(b_name))
    });

    ranked
        .into_iter()
        .take(count)
        .map(|(name, _)| {
            let series = forecasts.categories[name]
                .iter()
                .map(|p| ChartPoint {
                    label: month_label(p.month),
                    value: p.point_estimate,
                })
                .collect();
            (name.clone(), series)
        })
        .collect()
}
