//! Quality Assessor (C2).
//!
//! A pure function: `(sample, profile) -> Quality`. No internal state, no
//! I/O — the same inputs always produce the same outputs (§4.2 Contract),
//! which is why [`QualityAssessor::assess`] takes `&self` only for the
//! [`table::SourceProfileTable`] lookup and never mutates it during
//! assessment.

mod dimensions;
mod table;

pub use dimensions::{completeness, consistency_issues, consistency_score, plausibility, staleness};
pub use table::{SourceProfile, SourceProfileTable};

use crate::model::{QualityIssue, Quality, Sample};

/// Dimension thresholds below which a [`QualityIssue`] is appended to the
/// sample's issue list, per §4.2 Aggregate.
const STALENESS_ISSUE_THRESHOLD: f64 = 0.5;
const COMPLETENESS_ISSUE_THRESHOLD: f64 = 0.7;
const CONSISTENCY_ISSUE_THRESHOLD: f64 = 0.5;
const PLAUSIBILITY_ISSUE_THRESHOLD: f64 = 0.5;

/// Stateless scorer over a [`SourceProfileTable`].
#[derive(Debug, Clone, Default)]
pub struct QualityAssessor {
    profiles: SourceProfileTable,
}

impl QualityAssessor {
    pub fn new() -> Self {
        Self {
            profiles: SourceProfileTable::with_defaults(),
        }
    }

    pub fn with_profiles(profiles: SourceProfileTable) -> Self {
        Self { profiles }
    }

    pub fn profiles(&self) -> &SourceProfileTable {
        &self.profiles
    }

    /// Score `sample` against `now_ns` (the assessor's notion of "now",
    /// normally [`crate::clock::Clock::now_ns`]). Never panics, never
    /// blocks; the result always satisfies [`Quality::is_well_formed`].
    pub fn assess(&self, sample: &Sample, now_ns: i64) -> (Quality, Vec<QualityIssue>) {
        let profile = self.profiles.profile_for(sample.key);

        let age_ms = ((now_ns - sample.timestamp_ns) as f64 / 1_000_000.0).max(0.0);
        let staleness = staleness(age_ms, profile.expected_latency_ms);
        let completeness = completeness(&sample.payload, sample.key.sample_type);
        let issues_found = consistency_issues(&sample.payload, sample.key.sample_type);
        let consistency = consistency_score(&issues_found);
        let plausibility = plausibility(sample, now_ns);

        let quality =
            0.3 * staleness + 0.3 * completeness + 0.2 * consistency + 0.2 * plausibility;
        let confidence = quality * profile.reliability;

        let mut issues = Vec::new();
        if staleness < STALENESS_ISSUE_THRESHOLD {
            issues.push(QualityIssue::Stale);
        }
        if completeness < COMPLETENESS_ISSUE_THRESHOLD {
            issues.push(QualityIssue::Incomplete);
        }
        if consistency < CONSISTENCY_ISSUE_THRESHOLD {
            issues.push(QualityIssue::Inconsistent);
        }
        if plausibility < PLAUSIBILITY_ISSUE_THRESHOLD {
            issues.push(QualityIssue::Implausible);
        }

        let quality_record = Quality {
            quality: quality.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            staleness,
            completeness,
            consistency,
            plausibility,
        };

        debug_assert!(
            quality_record.is_well_formed(),
            "quality assessor produced malformed quality: {quality_record:?}"
        );

        (quality_record, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PayloadData, SampleType, SourceDomain, SourceKey, TelemetryPayload};

    fn telemetry_sample(age_ms: i64) -> Sample {
        let now = 1_000_000_000_000i64;
        Sample {
            key: SourceKey::new(SourceDomain::Simulator, SampleType::Telemetry),
            timestamp_ns: now - age_ms * 1_000_000,
            payload: PayloadData::Telemetry(TelemetryPayload {
                position: Some([0.0, 0.0, 0.0]),
                velocity: Some([0.0, 0.0, 0.0]),
                ..Default::default()
            }),
            ingest_time_ns: now,
        }
    }

    #[test]
    fn scenario_1_quality_staleness() {
        // §8 scenario 1: simulator/telemetry, expected=16ms, age=80ms.
        let assessor = QualityAssessor::new();
        let now = 1_000_000_000_000i64;
        let sample = telemetry_sample(80);
        let (quality, _) = assessor.assess(&sample, now);
        assert!(
            (0.54..=0.58).contains(&quality.staleness),
            "staleness {} out of expected range",
            quality.staleness
        );
        assert_eq!(quality.completeness, 1.0);
    }

    #[test]
    fn quality_is_always_well_formed() {
        let assessor = QualityAssessor::new();
        let now = 1_000_000_000_000i64;
        for age in [0, 1, 16, 80, 160, 10_000] {
            let sample = telemetry_sample(age);
            let (quality, _) = assessor.assess(&sample, now);
            assert!(quality.is_well_formed(), "age={age} quality={quality:?}");
        }
    }

    #[test]
    fn assess_is_pure_same_input_same_output() {
        let assessor = QualityAssessor::new();
        let now = 1_000_000_000_000i64;
        let sample = telemetry_sample(80);
        let (q1, issues1) = assessor.assess(&sample, now);
        let (q2, issues2) = assessor.assess(&sample, now);
        assert_eq!(q1.quality, q2.quality);
        assert_eq!(q1.confidence, q2.confidence);
        assert_eq!(issues1, issues2);
    }

    #[test]
    fn stale_sample_flagged_as_issue() {
        let assessor = QualityAssessor::new();
        let now = 1_000_000_000_000i64;
        let sample = telemetry_sample(160); // exactly at cutoff -> staleness 0.0
        let (_, issues) = assessor.assess(&sample, now);
        assert!(issues.contains(&QualityIssue::Stale));
    }
}
