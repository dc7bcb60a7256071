//! The four scoring dimensions of §4.2: staleness, completeness,
//! consistency, plausibility.

use crate::model::{PayloadData, Sample, SampleType};

/// `1.0` if `age <= expected`, `0.0` if `age >= 10 * expected`, linear
/// between. `age_ms` and `expected_ms` must both be non-negative.
pub fn staleness(age_ms: f64, expected_ms: f64) -> f64 {
    if expected_ms <= 0.0 {
        return if age_ms <= 0.0 { 1.0 } else { 0.0 };
    }
    let cutoff = 10.0 * expected_ms;
    if age_ms <= expected_ms {
        1.0
    } else if age_ms >= cutoff {
        0.0
    } else {
        (cutoff - age_ms) / (cutoff - expected_ms)
    }
}

/// Required field names per `(source,type)`, per §4.2. Unknown types
/// require only `timestamp`, which every [`Sample`] carries structurally
/// (so it contributes a constant 1.0 to the fraction for those types).
fn required_fields(sample_type: SampleType) -> &'static [&'static str] {
    use SampleType::*;
    match sample_type {
        Physiological => &["heartRate"],
        Behavioral => &["blinkRate", "fixationDuration"],
        SelfReport => &["workload"],
        Performance => &["reactionTime"],
        Telemetry => &["position", "velocity"],
        Systems => &["engineRpm"],
        Dynamics => &["altitude", "airspeed"],
        Environment => &["visibility"],
        Weather => &["temperature", "windSpeed"],
        Traffic => &["nearbyCount"],
        Navigation => &["crossTrackError"],
        Communications => &["channelLoad"],
        Opaque => &[],
    }
}

/// Fraction of required fields present, non-null, and finite. `position`
/// and `velocity` are special-cased since they are vectors rather than
/// scalars in [`PayloadData::field`].
pub fn completeness(payload: &PayloadData, sample_type: SampleType) -> f64 {
    let required = required_fields(sample_type);
    if required.is_empty() {
        return 1.0;
    }

    let vector_present = |name: &str| -> Option<bool> {
        if let PayloadData::Telemetry(t) = payload {
            match name {
                "position" => return Some(t.position.map(|v| v.iter().all(|x| x.is_finite())).unwrap_or(false)),
                "velocity" => return Some(t.velocity.map(|v| v.iter().all(|x| x.is_finite())).unwrap_or(false)),
                _ => {}
            }
        }
        None
    };

    let mut present = 0usize;
    for &name in required {
        let ok = if let Some(v) = vector_present(name) {
            v
        } else {
            payload.field(name).is_some_and(f64::is_finite)
        };
        if ok {
            present += 1;
        }
    }
    present as f64 / required.len() as f64
}

/// One inconsistency finding from [`consistency`], used to build the
/// sample's `issues[]` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyIssue {
    OutOfBounds,
    CrossField,
}

/// Per-field plausible physical bounds, §4.2/§6.
fn field_bounds(sample_type: SampleType, field: &str) -> Option<(f64, f64)> {
    match (sample_type, field) {
        (SampleType::Physiological, "heartRate") => Some((30.0, 220.0)),
        (SampleType::Physiological, "hrv") => Some((0.0, 300.0)),
        (SampleType::Dynamics, "altitude") => Some((-500.0, 50_000.0)),
        (SampleType::Environment, "visibility") => Some((0.0, 50_000.0)),
        (SampleType::Weather, "visibility") => Some((0.0, 50_000.0)),
        (SampleType::Weather, "windSpeed") => Some((0.0, 150.0)),
        (SampleType::SelfReport, "workload") => Some((0.0, 1.0)),
        (SampleType::SelfReport, "fatigue") => Some((0.0, 1.0)),
        (SampleType::SelfReport, "stress") => Some((0.0, 1.0)),
        (SampleType::Performance, "errorRate") => Some((0.0, 1.0)),
        _ => None,
    }
}

/// Bounds-check every field with a known range, plus the cross-field rule
/// `heartRate > 180 && hrv > 50` (physiologically inconsistent: very high
/// heart rate with very high variability). Returns the list of findings;
/// the caller scores based on the count and each weight class.
pub fn consistency_issues(payload: &PayloadData, sample_type: SampleType) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();

    for &field in required_fields(sample_type) {
        if let Some(value) = payload.field(field) {
            if let Some((lo, hi)) = field_bounds(sample_type, field) {
                if value < lo || value > hi {
                    issues.push(ConsistencyIssue::OutOfBounds);
                }
            }
        }
    }

    if let PayloadData::Physiological(p) = payload {
        if let (Some(hr), Some(hrv)) = (p.heart_rate, p.hrv) {
            if hr > 180.0 && hrv > 50.0 {
                issues.push(ConsistencyIssue::CrossField);
            }
        }
    }

    issues
}

/// `max(0.1, 1 - issues * w)`, `w` depends on how many issue classes are
/// present in `issues` (0.2 for a single out-of-bounds field, scaling up
/// to 0.3 as more independent checks fail), per §4.2.
pub fn consistency_score(issues: &[ConsistencyIssue]) -> f64 {
    if issues.is_empty() {
        return 1.0;
    }
    let weight = match issues.len() {
        1 => 0.2,
        2 => 0.25,
        _ => 0.3,
    };
    (1.0 - issues.len() as f64 * weight).max(0.1)
}

/// Extreme-but-possible domain values that are individually plausible but
/// penalized, per §4.2.
fn extreme_but_possible(payload: &PayloadData) -> bool {
    match payload {
        PayloadData::Telemetry(t) => t
            .acceleration
            .map(|a| a.iter().any(|v| v.abs() > 5.0 * 9.80665))
            .unwrap_or(false),
        PayloadData::Weather(w) => w.wind_speed.map(|v| v > 100.0).unwrap_or(false),
        PayloadData::SimEnvironment(e) => e.wind_speed.map(|v| v > 100.0).unwrap_or(false)
            || e.visibility.map(|v| v < 100.0).unwrap_or(false),
        _ => false,
    }
}

/// Timestamp within ±5 min of `now_ns`, and not an extreme-but-possible
/// domain value, per §4.2. Returns `0.0` for wildly out-of-order
/// timestamps (see [`crate::clock::is_wildly_out_of_order`]), `0.7` for
/// extreme-but-plausible values, else `1.0`.
pub fn plausibility(sample: &Sample, now_ns: i64) -> f64 {
    if crate::clock::is_wildly_out_of_order(sample.timestamp_ns, now_ns) {
        return 0.0;
    }
    if extreme_but_possible(&sample.payload) {
        0.7
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceDomain, SourceKey, TelemetryPayload};

    #[test]
    fn staleness_boundaries() {
        assert_eq!(staleness(0.0, 16.0), 1.0);
        assert_eq!(staleness(16.0, 16.0), 1.0);
        assert_eq!(staleness(160.0, 16.0), 0.0);
        let mid = staleness(80.0, 16.0);
        assert!((mid - 0.5556).abs() < 0.01, "got {mid}");
    }

    #[test]
    fn completeness_full_telemetry() {
        let payload = PayloadData::Telemetry(TelemetryPayload {
            position: Some([0.0, 0.0, 0.0]),
            velocity: Some([0.0, 0.0, 0.0]),
            ..Default::default()
        });
        assert_eq!(completeness(&payload, SampleType::Telemetry), 1.0);
    }

    #[test]
    fn completeness_missing_field_telemetry() {
        let payload = PayloadData::Telemetry(TelemetryPayload {
            position: Some([0.0, 0.0, 0.0]),
            velocity: None,
            ..Default::default()
        });
        assert_eq!(completeness(&payload, SampleType::Telemetry), 0.5);
    }

    #[test]
    fn opaque_type_requires_nothing() {
        let payload = PayloadData::Opaque {
            fields: Default::default(),
        };
        assert_eq!(completeness(&payload, SampleType::Opaque), 1.0);
    }

    #[test]
    fn cross_field_heart_rate_hrv_inconsistency() {
        use crate::model::PhysiologicalPayload;
        let payload = PayloadData::Physiological(PhysiologicalPayload {
            heart_rate: Some(190.0),
            hrv: Some(60.0),
            ..Default::default()
        });
        let issues = consistency_issues(&payload, SampleType::Physiological);
        assert!(issues.contains(&ConsistencyIssue::CrossField));
        assert!(consistency_score(&issues) < 1.0);
    }

    #[test]
    fn out_of_bounds_heart_rate_flagged() {
        use crate::model::PhysiologicalPayload;
        let payload = PayloadData::Physiological(PhysiologicalPayload {
            heart_rate: Some(300.0),
            ..Default::default()
        });
        let issues = consistency_issues(&payload, SampleType::Physiological);
        assert!(issues.contains(&ConsistencyIssue::OutOfBounds));
    }

    #[test]
    fn plausibility_rejects_wildly_out_of_order() {
        let sample = Sample {
            key: SourceKey::new(SourceDomain::Simulator, SampleType::Telemetry),
            timestamp_ns: 0,
            payload: PayloadData::Telemetry(TelemetryPayload::default()),
            ingest_time_ns: 0,
        };
        let now = crate::clock::STALE_DROP_NS + 1;
        assert_eq!(plausibility(&sample, now), 0.0);
    }

    #[test]
    fn plausibility_penalizes_extreme_but_possible() {
        let sample = Sample {
            key: SourceKey::new(SourceDomain::Simulator, SampleType::Telemetry),
            timestamp_ns: 0,
            payload: PayloadData::Telemetry(TelemetryPayload {
                acceleration: Some([60.0, 0.0, 0.0]),
                ..Default::default()
            }),
            ingest_time_ns: 0,
        };
        assert_eq!(plausibility(&sample, 0), 0.7);
    }
}
