//! Bounded, timestamp-ordered point sequence backing one [`super::TemporalStore`]
//! series.

use crate::model::SeriesPoint;

/// A single series: up to `capacity` [`SeriesPoint`]s ordered by
/// `timestamp_ns`. Insertion is binary-search-positioned so points arriving
/// slightly out of order still land correctly; once full, the oldest point
/// is dropped to make room for the newest.
#[derive(Debug, Clone)]
pub struct Series {
    points: Vec<SeriesPoint>,
    capacity: usize,
}

impl Series {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
        }
    }

    /// Insert `point`, keeping `points` sorted by `timestamp_ns`. Evicts the
    /// oldest point if the series is at capacity.
    pub fn insert(&mut self, point: SeriesPoint) {
        let idx = self
            .points
            .partition_point(|p| p.timestamp_ns <= point.timestamp_ns);
        self.points.insert(idx, point);
        if self.points.len() > self.capacity {
            self.points.remove(0);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    /// All points with `timestamp_ns` in `[since_ns, now_ns]`.
    pub fn window(&self, since_ns: i64, now_ns: i64) -> &[SeriesPoint] {
        let start = self.points.partition_point(|p| p.timestamp_ns < since_ns);
        let end = self.points.partition_point(|p| p.timestamp_ns <= now_ns);
        &self.points[start..end]
    }

    pub fn mean(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(|p| p.value).sum::<f64>() / self.points.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .points
            .iter()
            .map(|p| (p.value - mean).powi(2))
            .sum::<f64>()
            / self.points.len() as f64;
        variance.sqrt()
    }
}
