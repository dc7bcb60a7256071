//! Temporal Store (C3): bounded per-series history, trend fitting, anomaly
//! detection, and short-horizon forecasting.

mod anomaly;
mod forecast;
mod series;
mod trend;

pub use anomaly::{Anomaly, AnomalyKind};
pub use forecast::Forecast;
pub use series::Series;

use crate::model::{SeriesPoint, SourceKey, Trend};
use dashmap::DashMap;

/// Default trend analysis window, §4.3.
pub const DEFAULT_TREND_WINDOW_MS: i64 = 60_000;
/// Trend results are reused for this long before being recomputed, §4.3.
const TREND_CACHE_TTL_NS: i64 = 30_000_000_000;
/// Default per-series point capacity.
const DEFAULT_SERIES_CAPACITY: usize = 2048;

struct CachedTrend {
    trend: Trend,
    computed_at_ns: i64,
}

/// Concurrent collection of bounded time series, one per [`SourceKey`],
/// with cached trend analysis.
pub struct TemporalStore {
    series: DashMap<String, Series>,
    trend_cache: DashMap<String, CachedTrend>,
    capacity: usize,
}

impl Default for TemporalStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_CAPACITY)
    }
}

impl TemporalStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: DashMap::new(),
            trend_cache: DashMap::new(),
            capacity,
        }
    }

    /// Insert a new point for `key`, invalidating any cached trend.
    pub fn insert(&self, key: SourceKey, point: SeriesPoint) {
        let name = key.as_series_name();
        self.series
            .entry(name.clone())
            .or_insert_with(|| Series::new(self.capacity))
            .insert(point);
        self.trend_cache.remove(&name);
    }

    pub fn len(&self, key: SourceKey) -> usize {
        self.series.get(&key.as_series_name()).map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, key: SourceKey) -> bool {
        self.len(key) == 0
    }

    /// Fit (or reuse a cached fit of) the trend over the last `window_ms`
    /// of data for `key`, as of `now_ns`.
    pub fn trend(&self, key: SourceKey, now_ns: i64, window_ms: i64) -> Trend {
        let name = key.as_series_name();

        if let Some(cached) = self.trend_cache.get(&name) {
            if now_ns - cached.computed_at_ns < TREND_CACHE_TTL_NS {
                return cached.trend;
            }
        }

        let computed = match self.series.get(&name) {
            Some(series) => {
                let since = now_ns - window_ms * 1_000_000;
                let window_points = series.window(since, now_ns);
                trend::fit(window_points, window_ms as f64 / 1000.0)
            }
            None => Trend::insufficient_data(),
        };

        self.trend_cache.insert(
            name,
            CachedTrend {
                trend: computed,
                computed_at_ns: now_ns,
            },
        );
        computed
    }

    /// Detect anomalies across the full retained history for `key`.
    pub fn anomalies(&self, key: SourceKey) -> Vec<Anomaly> {
        match self.series.get(&key.as_series_name()) {
            Some(series) => anomaly::detect(series.points()),
            None => Vec::new(),
        }
    }

    /// Forecast `key`'s value `forecast_ms` into the future, as of `now_ns`.
    pub fn predict(&self, key: SourceKey, forecast_ms: i64, min_confidence: f64, now_ns: i64) -> Forecast {
        let trend = self.trend(key, now_ns, DEFAULT_TREND_WINDOW_MS);
        let (mean, std_dev) = match self.series.get(&key.as_series_name()) {
            Some(series) => (series.mean(), series.std_dev()),
            None => (0.0, 0.0),
        };
        forecast::predict(&trend, mean, std_dev, forecast_ms, min_confidence)
    }
}
