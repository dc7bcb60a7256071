//! Table 1 — per-`(source, type)` defaults (§4.2).

use crate::model::{SampleType, SourceDomain, SourceKey};
use std::collections::HashMap;

/// Tunable parameters the Quality Assessor reads for a given `(source,
/// type)` pair.
#[derive(Debug, Clone, Copy)]
pub struct SourceProfile {
    pub weight: f64,
    pub expected_latency_ms: f64,
    pub reliability: f64,
}

impl SourceProfile {
    const fn new(weight: f64, expected_latency_ms: f64, reliability: f64) -> Self {
        Self {
            weight,
            expected_latency_ms,
            reliability,
        }
    }
}

/// Default profile for a key not present in Table 1: a conservative
/// mid-range weight/reliability and a generous expected latency.
const DEFAULT_PROFILE: SourceProfile = SourceProfile::new(0.5, 1000.0, 0.6);

/// Lookup table of Table 1 defaults, built once and reused for every
/// assessment (the Quality Assessor itself is a pure function of
/// `(sample, profile)`, so the table is the only state it needs).
#[derive(Debug, Clone)]
pub struct SourceProfileTable {
    profiles: HashMap<SourceKey, SourceProfile>,
}

impl Default for SourceProfileTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SourceProfileTable {
    /// Build the table exactly as enumerated in Table 1 of §4.2.
    pub fn with_defaults() -> Self {
        use SampleType::*;
        use SourceDomain::*;

        let entries: &[(SourceDomain, SampleType, SourceProfile)] = &[
            (Human, Physiological, SourceProfile::new(0.9, 100.0, 0.95)),
            (Human, Behavioral, SourceProfile::new(0.8, 200.0, 0.85)),
            (Human, SelfReport, SourceProfile::new(0.6, 1000.0, 0.70)),
            (Human, Performance, SourceProfile::new(0.85, 150.0, 0.90)),
            (Simulator, Telemetry, SourceProfile::new(0.95, 16.0, 0.98)),
            (Simulator, Systems, SourceProfile::new(0.9, 50.0, 0.95)),
            (Simulator, Dynamics, SourceProfile::new(0.92, 20.0, 0.97)),
            (Simulator, Environment, SourceProfile::new(0.8, 100.0, 0.85)),
            (External, Weather, SourceProfile::new(0.75, 5000.0, 0.80)),
            (External, Traffic, SourceProfile::new(0.85, 1000.0, 0.90)),
            (External, Navigation, SourceProfile::new(0.9, 500.0, 0.92)),
            (
                External,
                Communications,
                SourceProfile::new(0.7, 200.0, 0.85),
            ),
        ];

        let mut profiles = HashMap::with_capacity(entries.len());
        for (source, sample_type, profile) in entries.iter().copied() {
            profiles.insert(SourceKey::new(source, sample_type), profile);
        }
        Self { profiles }
    }

    /// Look up the profile for `key`, falling back to [`DEFAULT_PROFILE`]
    /// for unrecognized `(source, type)` pairs (e.g. `Opaque` data).
    pub fn profile_for(&self, key: SourceKey) -> SourceProfile {
        self.profiles.get(&key).copied().unwrap_or(DEFAULT_PROFILE)
    }

    /// Override or add a profile, e.g. for a deployment-specific sensor.
    pub fn set_profile(&mut self, key: SourceKey, profile: SourceProfile) {
        self.profiles.insert(key, profile);
    }
}
