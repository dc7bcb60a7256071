//! Weighted least-squares trend fitting over a [`super::series::Series`]
//! window, per §4.3.

use crate::model::{SeriesPoint, Trend, TrendDirection};

const MIN_SAMPLES: usize = 3;
const STABLE_T_THRESHOLD: f64 = 1.5;
const INCREASING_SLOPE_THRESHOLD: f64 = 0.01;
const DECREASING_SLOPE_THRESHOLD: f64 = -0.01;

/// Fit a trend over `points` (already restricted to the analysis window),
/// where `duration_secs` is the window's nominal width, used for the
/// temporal-coverage confidence sub-score. Returns
/// [`Trend::insufficient_data`] for fewer than [`MIN_SAMPLES`] points.
pub fn fit(points: &[SeriesPoint], duration_secs: f64) -> Trend {
    if points.len() < MIN_SAMPLES {
        return Trend::insufficient_data();
    }

    let n = points.len() as f64;
    let t0 = points[0].timestamp_ns;
    let xs: Vec<f64> = points
        .iter()
        .map(|p| (p.timestamp_ns - t0) as f64 / 1_000_000_000.0)
        .collect();
    let ys: Vec<f64> = points.iter().map(|p| p.value).collect();

    let quality_sum: f64 = points.iter().map(|p| p.quality.max(0.0)).sum();
    let weights: Vec<f64> = if quality_sum > 0.0 {
        points
            .iter()
            .map(|p| p.quality.max(0.0) * n / quality_sum)
            .collect()
    } else {
        vec![1.0; points.len()]
    };

    let (slope, intercept, standard_error) = weighted_regression(&xs, &ys, &weights);
    let t_stat = slope.abs() / standard_error.max(1e-3);

    let direction = if t_stat < STABLE_T_THRESHOLD {
        TrendDirection::Stable
    } else if slope > INCREASING_SLOPE_THRESHOLD {
        TrendDirection::Increasing
    } else if slope < DECREASING_SLOPE_THRESHOLD {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    let confidence = confidence_score(points, &xs, &ys, t_stat, duration_secs);

    Trend {
        direction,
        slope,
        intercept,
        standard_error,
        confidence,
    }
}

/// Weighted least-squares fit of `y = slope*x + intercept`, plus the slope's
/// standard error from the weighted residuals.
fn weighted_regression(xs: &[f64], ys: &[f64], weights: &[f64]) -> (f64, f64, f64) {
    let w_sum: f64 = weights.iter().sum();
    let x_bar = xs.iter().zip(weights).map(|(x, w)| x * w).sum::<f64>() / w_sum;
    let y_bar = ys.iter().zip(weights).map(|(y, w)| y * w).sum::<f64>() / w_sum;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for ((x, y), w) in xs.iter().zip(ys).zip(weights) {
        let dx = x - x_bar;
        sxx += w * dx * dx;
        sxy += w * dx * (y - y_bar);
    }

    if sxx.abs() < 1e-12 {
        return (0.0, y_bar, 0.0);
    }

    let slope = sxy / sxx;
    let intercept = y_bar - slope * x_bar;

    let n = xs.len() as f64;
    let standard_error = if n > 2.0 {
        let residual_sum: f64 = xs
            .iter()
            .zip(ys)
            .zip(weights)
            .map(|((x, y), w)| {
                let resid = y - (slope * x + intercept);
                w * resid * resid
            })
            .sum();
        ((residual_sum / (n - 2.0)) / sxx).sqrt()
    } else {
        0.0
    };

    (slope, intercept, standard_error)
}

/// Unweighted OLS R², used only as a confidence sub-score (§4.3).
fn r_squared_unweighted(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let x_bar = xs.iter().sum::<f64>() / n;
    let y_bar = ys.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - x_bar;
        let dy = y - y_bar;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    if sxx.abs() < 1e-12 || syy.abs() < 1e-12 {
        return 0.0;
    }
    let slope = sxy / sxx;
    let intercept = y_bar - slope * x_bar;
    let ss_res: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| {
            let resid = y - (slope * x + intercept);
            resid * resid
        })
        .sum();
    (1.0 - ss_res / syy).clamp(0.0, 1.0)
}

/// Mean of five equally-weighted sub-scores, per §4.3.
fn confidence_score(points: &[SeriesPoint], xs: &[f64], ys: &[f64], t_stat: f64, duration_secs: f64) -> f64 {
    let sample_size_score = (points.len() as f64 / 10.0).min(1.0);
    let r_squared_score = r_squared_unweighted(xs, ys);
    let mean_quality_score = points.iter().map(|p| p.quality).sum::<f64>() / points.len() as f64;
    let span_secs = xs.last().copied().unwrap_or(0.0) - xs.first().copied().unwrap_or(0.0);
    let coverage_score = if duration_secs > 0.0 {
        (span_secs / duration_secs).min(1.0)
    } else {
        1.0
    };
    let significance_score = (t_stat / 2.0).min(1.0);

    (sample_size_score + r_squared_score + mean_quality_score + coverage_score + significance_score) / 5.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(ts_secs: i64, value: f64, quality: f64) -> SeriesPoint {
        SeriesPoint {
            value,
            quality,
            timestamp_ns: ts_secs * 1_000_000_000,
        }
    }

    #[test]
    fn insufficient_data_below_three_samples() {
        let points = vec![point(0, 1.0, 1.0), point(1, 2.0, 1.0)];
        let trend = fit(&points, 60.0);
        assert_eq!(trend.direction, TrendDirection::InsufficientData);
    }

    #[test]
    fn flat_series_is_stable() {
        let points: Vec<_> = (0..10).map(|i| point(i, 5.0, 1.0)).collect();
        let trend = fit(&points, 60.0);
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert!(trend.slope.abs() < 1e-6);
    }

    #[test]
    fn steadily_rising_series_is_increasing() {
        let points: Vec<_> = (0..30).map(|i| point(i, i as f64 * 2.0, 1.0)).collect();
        let trend = fit(&points, 60.0);
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!(trend.slope > 0.0);
    }

    #[test]
    fn steadily_falling_series_is_decreasing() {
        let points: Vec<_> = (0..30).map(|i| point(i, 100.0 - i as f64 * 2.0, 1.0)).collect();
        let trend = fit(&points, 60.0);
        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert!(trend.slope < 0.0);
    }

    #[test]
    fn confidence_is_bounded() {
        let points: Vec<_> = (0..30).map(|i| point(i, i as f64, 0.8)).collect();
        let trend = fit(&points, 60.0);
        assert!((0.0..=1.0).contains(&trend.confidence));
    }
}
