//! Short-horizon forecasting from a fitted [`crate::model::Trend`], per §4.3.

use crate::model::Trend;

const LOW_CONFIDENCE_FALLBACK: f64 = 0.1;
const CI_Z_SCORE: f64 = 1.96;
/// Uncertainty grows with the square root of elapsed time, normalized to a
/// one-minute horizon.
const UNCERTAINTY_HORIZON_SECS: f64 = 60.0;

#[derive(Debug, Clone, Copy)]
pub struct Forecast {
    pub predicted: f64,
    pub uncertainty: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub confidence: f64,
}

/// Predict the series value `forecast_ms` into the future. Falls back to
/// the series mean (with a fixed low confidence) when `trend.confidence`
/// doesn't clear `min_confidence`.
pub fn predict(trend: &Trend, series_mean: f64, series_std_dev: f64, forecast_ms: i64, min_confidence: f64) -> Forecast {
    let seconds = forecast_ms as f64 / 1000.0;

    if trend.confidence < min_confidence {
        return Forecast {
            predicted: series_mean,
            uncertainty: series_std_dev,
            ci_low: series_mean - CI_Z_SCORE * series_std_dev,
            ci_high: series_mean + CI_Z_SCORE * series_std_dev,
            confidence: LOW_CONFIDENCE_FALLBACK,
        };
    }

    let predicted = series_mean + trend.slope * seconds;
    let uncertainty = series_std_dev * (seconds.max(0.0) / UNCERTAINTY_HORIZON_SECS).sqrt();

    Forecast {
        predicted,
        uncertainty,
        ci_low: predicted - CI_Z_SCORE * uncertainty,
        ci_high: predicted + CI_Z_SCORE * uncertainty,
        confidence: trend.confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrendDirection;

    fn confident_trend(slope: f64, confidence: f64) -> Trend {
        Trend {
            direction: TrendDirection::Increasing,
            slope,
            intercept: 0.0,
            standard_error: 0.1,
            confidence,
        }
    }

    #[test]
    fn low_confidence_trend_falls_back_to_mean() {
        let trend = confident_trend(5.0, 0.1);
        let forecast = predict(&trend, 42.0, 3.0, 10_000, 0.5);
        assert_eq!(forecast.predicted, 42.0);
        assert_eq!(forecast.confidence, 0.1);
    }

    #[test]
    fn confident_trend_projects_forward() {
        let trend = confident_trend(2.0, 0.9);
        let forecast = predict(&trend, 100.0, 1.0, 5_000, 0.5);
        assert_eq!(forecast.predicted, 100.0 + 2.0 * 5.0);
        assert!(forecast.ci_low < forecast.predicted);
        assert!(forecast.ci_high > forecast.predicted);
    }

    #[test]
    fn longer_horizon_widens_uncertainty() {
        let trend = confident_trend(1.0, 0.9);
        let near = predict(&trend, 0.0, 2.0, 1_000, 0.5);
        let far = predict(&trend, 0.0, 2.0, 60_000, 0.5);
        assert!(far.uncertainty > near.uncertainty);
    }
}
