//! Mock mode, §4.8: "deterministic data generator with configurable
//! sample rate (default 200 Hz for eye-tracker, 30 Hz for aircraft, etc.);
//! used when no real device is reachable."
//!
//! Determinism means a function of `(key, tick)` only — no `rand`, no wall
//! clock reads — so the same tick always produces the same sample and
//! tests can assert exact values.

use crate::model::{GazePayload, PayloadData, Sample, SampleType, SourceDomain, SourceKey, TelemetryPayload};
use std::time::Duration;

/// Default per-key mock sample rates, §4.8.
pub fn default_rate_hz(key: SourceKey) -> f64 {
    match (key.source, key.sample_type) {
        (SourceDomain::Human, SampleType::Behavioral) => 200.0,
        (SourceDomain::Simulator, _) => 30.0,
        (SourceDomain::Human, _) => 50.0,
        (SourceDomain::External, _) => 1.0,
    }
}

/// Deterministic per-source sample generator used when Discovery falls
/// back to a mock device and no real transport is reachable.
pub struct MockGenerator {
    key: SourceKey,
    rate_hz: f64,
}

impl MockGenerator {
    pub fn new(key: SourceKey, rate_hz: f64) -> Self {
        Self { key, rate_hz }
    }

    pub fn with_default_rate(key: SourceKey) -> Self {
        Self::new(key, default_rate_hz(key))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz.max(0.001))
    }

    /// Produces the sample for tick `tick` at monotonic time `now_ns`. A
    /// smooth, bounded oscillation keeps values in a plausible range
    /// across an arbitrarily long run without drifting (important since
    /// `tick` only grows).
    pub fn next_sample(&self, tick: u64, now_ns: i64) -> Sample {
        let phase = (tick % 10_000) as f64 / self.rate_hz;
        let payload = match (self.key.source, self.key.sample_type) {
            (SourceDomain::Human, SampleType::Behavioral) => PayloadData::Gaze(GazePayload {
                x: 0.5 + 0.1 * (phase * std::f64::consts::TAU).sin(),
                y: 0.5 + 0.1 * (phase * std::f64::consts::TAU * 0.7).cos(),
                confidence: 0.9,
                worn: true,
                left_eye: None,
                right_eye: None,
            }),
            (SourceDomain::Simulator, SampleType::Telemetry) => PayloadData::Telemetry(TelemetryPayload {
                position: Some([phase * 10.0, 0.0, 1000.0]),
                velocity: Some([50.0, 0.0, 0.0]),
                acceleration: Some([0.0, 0.0, 0.0]),
                heading_deg: Some((phase * 5.0) % 360.0),
                speed: Some(50.0),
                complexity: Some(0.3),
            }),
            _ => PayloadData::Opaque {
                fields: std::collections::BTreeMap::from([(
                    "mock_value".to_string(),
                    0.5 + 0.5 * (phase * std::f64::consts::TAU).sin(),
                )]),
            },
        };

        Sample {
            key: self.key,
            timestamp_ns: now_ns,
            payload,
            ingest_time_ns: now_ns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKey;

    #[test]
    fn default_rates_match_spec_examples() {
        let gaze_key = SourceKey::new(SourceDomain::Human, SampleType::Behavioral);
        assert_eq!(default_rate_hz(gaze_key), 200.0);
        let telemetry_key = SourceKey::new(SourceDomain::Simulator, SampleType::Telemetry);
        assert_eq!(default_rate_hz(telemetry_key), 30.0);
    }

    #[test]
    fn same_tick_produces_identical_sample() {
        let gen = MockGenerator::with_default_rate(SourceKey::new(SourceDomain::Human, SampleType::Behavioral));
        let a = gen.next_sample(42, 1_000);
        let b = gen.next_sample(42, 1_000);
        match (a.payload, b.payload) {
            (PayloadData::Gaze(x), PayloadData::Gaze(y)) => {
                assert_eq!(x.x, y.x);
                assert_eq!(x.y, y.y);
            }
            _ => panic!("expected gaze payloads"),
        }
    }
}
