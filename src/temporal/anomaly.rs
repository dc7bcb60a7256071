//! Anomaly detection over a [`super::series::Series`], per §4.3.
//!
//! Three independent detectors — outliers, quality drops, trend breaks —
//! are run and merged into a single ranked list, capped at the top 5 by
//! score.

use crate::model::SeriesPoint;

/// Number of standard deviations a value must be from the series mean to
/// count as an outlier.
const OUTLIER_SIGMA_MULTIPLIER: f64 = 3.0;
const QUALITY_DROP_THRESHOLD: f64 = 0.3;
const TREND_BREAK_WINDOW: usize = 4;
const TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    Outlier,
    QualityDrop,
    TrendBreak,
}

#[derive(Debug, Clone, Copy)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub timestamp_ns: i64,
    pub value: f64,
    pub score: f64,
}

/// Detect anomalies across all three classes and return the top
/// [`TOP_N`] by score, descending.
pub fn detect(points: &[SeriesPoint]) -> Vec<Anomaly> {
    let mut found = Vec::new();
    found.extend(outliers(points));
    found.extend(quality_drops(points));
    found.extend(trend_breaks(points));

    found.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    found.truncate(TOP_N);
    found
}

fn mean_and_std(points: &[SeriesPoint]) -> (f64, f64) {
    let n = points.len() as f64;
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let mean = points.iter().map(|p| p.value).sum::<f64>() / n;
    let variance = points.iter().map(|p| (p.value - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn outliers(points: &[SeriesPoint]) -> Vec<Anomaly> {
    let (mean, sigma) = mean_and_std(points);
    if sigma < 1e-9 {
        return Vec::new();
    }
    points
        .iter()
        .filter_map(|p| {
            let distance = (p.value - mean).abs();
            if distance > OUTLIER_SIGMA_MULTIPLIER * sigma {
                Some(Anomaly {
                    kind: AnomalyKind::Outlier,
                    timestamp_ns: p.timestamp_ns,
                    value: p.value,
                    score: distance / sigma,
                })
            } else {
                None
            }
        })
        .collect()
}

fn quality_drops(points: &[SeriesPoint]) -> Vec<Anomaly> {
    points
        .iter()
        .filter_map(|p| {
            if p.quality < QUALITY_DROP_THRESHOLD {
                Some(Anomaly {
                    kind: AnomalyKind::QualityDrop,
                    timestamp_ns: p.timestamp_ns,
                    value: p.quality,
                    score: (QUALITY_DROP_THRESHOLD - p.quality) / QUALITY_DROP_THRESHOLD,
                })
            } else {
                None
            }
        })
        .collect()
}

/// A local 4-point slope estimate centered on `window[..]`, using the
/// endpoints of the window.
fn local_slope(window: &[SeriesPoint]) -> f64 {
    let first = window.first().expect("non-empty window");
    let last = window.last().expect("non-empty window");
    let dt = (last.timestamp_ns - first.timestamp_ns) as f64 / 1_000_000_000.0;
    if dt.abs() < 1e-9 {
        0.0
    } else {
        (last.value - first.value) / dt
    }
}

fn trend_breaks(points: &[SeriesPoint]) -> Vec<Anomaly> {
    if points.len() < TREND_BREAK_WINDOW + 1 {
        return Vec::new();
    }
    let (_, sigma) = mean_and_std(points);
    if sigma < 1e-9 {
        return Vec::new();
    }

    let slopes: Vec<(usize, f64)> = points
        .windows(TREND_BREAK_WINDOW)
        .enumerate()
        .map(|(i, w)| (i, local_slope(w)))
        .collect();

    let mut found = Vec::new();
    for pair in slopes.windows(2) {
        let (_, prev_slope) = pair[0];
        let (idx, curr_slope) = pair[1];
        let delta = (curr_slope - prev_slope).abs();
        if delta > sigma {
            let anchor = &points[idx + TREND_BREAK_WINDOW - 1];
            found.push(Anomaly {
                kind: AnomalyKind::TrendBreak,
                timestamp_ns: anchor.timestamp_ns,
                value: anchor.value,
                score: delta / sigma,
            });
        }
    }
    found
}
