//! Fusion Algorithms (C7): pure functions from latest [`EnrichedSample`]s to
//! a [`FusionResult`] variant, §4.7.
//!
//! None of these touch the clock, a map, or any I/O — callers (the Fusion
//! Engine) are responsible for snapshotting the inputs they pass in, so the
//! same snapshot always produces the same result.

use crate::model::{
    EnrichedSample, EnvironmentalRecommendation, FusionResult, PayloadData, RiskFactor, SaStatus,
    SampleType, SourceDomain, SourceKey,
};
use std::collections::HashMap;

type LatestMap = HashMap<SourceKey, EnrichedSample>;

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Weighted mean over only the present `(weight, Some(score))` pairs,
/// renormalized so the weights of absent modalities don't silently depress
/// the result. `None` if nothing is present.
fn weighted_mean(pairs: &[(f64, Option<f64>)]) -> Option<f64> {
    let (wsum, vsum) = pairs.iter().fold((0.0, 0.0), |(wsum, vsum), (w, v)| match v {
        Some(v) => (wsum + w, vsum + w * v),
        None => (wsum, vsum),
    });
    if wsum <= 0.0 {
        None
    } else {
        Some(clamp01(vsum / wsum))
    }
}

fn get(latest: &LatestMap, source: SourceDomain, sample_type: SampleType) -> Option<&EnrichedSample> {
    latest.get(&SourceKey::new(source, sample_type))
}

// ---------------------------------------------------------------------
// Human-state
// ---------------------------------------------------------------------

/// A single modality's workload proxy in `[0, 1]`, reused across the
/// cognitive-load/fatigue/stress blends below with different weight
/// vectors (§4.7: "cognitive_load/fatigue/stress: analogous weight
/// sets").
fn behavioral_load(sample: &EnrichedSample) -> Option<f64> {
    match &sample.sample.payload {
        PayloadData::Behavioral(p) => {
            // Higher blink/saccade rate and shorter fixations read as
            // higher engagement/workload.
            let blink = p.blink_rate.map(|r| clamp01(r / 30.0));
            let saccade = p.saccade_rate.map(|r| clamp01(r / 5.0));
            let fixation = p.fixation_duration_ms.map(|ms| clamp01(1.0 - ms / 500.0));
            weighted_mean(&[(1.0, blink), (1.0, saccade), (1.0, fixation)])
        }
        _ => None,
    }
}

fn performance_load(sample: &EnrichedSample) -> Option<f64> {
    match &sample.sample.payload {
        PayloadData::Performance(p) => {
            let rt = p.reaction_time_ms.map(|ms| clamp01((ms - 200.0) / 800.0));
            let errors = p.error_rate.map(clamp01);
            let completion = p.task_completion.map(|c| clamp01(1.0 - c));
            weighted_mean(&[(1.0, rt), (1.0, errors), (1.0, completion)])
        }
        _ => None,
    }
}

fn physio_load(sample: &EnrichedSample) -> Option<f64> {
    match &sample.sample.payload {
        PayloadData::Physiological(p) => {
            let hr = p.heart_rate.map(|hr| clamp01((hr - 60.0) / 120.0));
            let hrv = p.hrv.map(|hrv| clamp01(1.0 - hrv / 100.0));
            let scl = p.skin_conductance.map(clamp01);
            weighted_mean(&[(1.0, hr), (1.0, hrv), (1.0, scl)])
        }
        _ => None,
    }
}

fn self_report_load(sample: &EnrichedSample) -> Option<f64> {
    match &sample.sample.payload {
        PayloadData::SelfReport(p) => {
            weighted_mean(&[(1.0, p.workload), (1.0, p.fatigue), (1.0, p.stress)])
        }
        _ => None,
    }
}

/// Human-state fusion: fires per §4.6 if any of
/// `{human/physiological, human/behavioral, human/performance}` meets the
/// quality gate. `human/self_report` contributes when present but never
/// gates the trigger on its own (its expected latency/reliability in Table
/// 1 reflects how sparse and noisy self-report probes are).
pub fn human_state(latest: &LatestMap, now_ns: i64) -> Option<FusionResult> {
    let physio = get(latest, SourceDomain::Human, SampleType::Physiological);
    let behavioral = get(latest, SourceDomain::Human, SampleType::Behavioral);
    let performance = get(latest, SourceDomain::Human, SampleType::Performance);
    let self_report = get(latest, SourceDomain::Human, SampleType::SelfReport);

    let b = behavioral.and_then(behavioral_load);
    let p = performance.and_then(performance_load);
    let ph = physio.and_then(physio_load);
    let sr = self_report.and_then(self_report_load);

    if b.is_none() && p.is_none() && ph.is_none() && sr.is_none() {
        return None;
    }

    let cognitive_load = weighted_mean(&[(0.4, b), (0.3, p), (0.2, ph), (0.1, sr)])?;
    let fatigue = weighted_mean(&[(0.4, sr), (0.3, ph), (0.2, b), (0.1, p)])?;
    let stress = weighted_mean(&[(0.4, ph), (0.3, b), (0.2, sr), (0.1, p)])?;
    let overall_state = clamp01((cognitive_load + fatigue + stress) / 3.0);

    let mut contributors: Vec<(&str, Option<&EnrichedSample>)> = vec![
        ("human/physiological", physio),
        ("human/behavioral", behavioral),
        ("human/performance", performance),
        ("human/self_report", self_report),
    ];
    contributors.retain(|(_, s)| s.is_some());

    let qualities: Vec<f64> = contributors
        .iter()
        .map(|(_, s)| s.unwrap().quality.quality)
        .collect();
    let confidence = qualities.iter().sum::<f64>() / qualities.len().max(1) as f64;
    let sources = contributors.iter().map(|(name, _)| name.to_string()).collect();

    Some(FusionResult::HumanState {
        timestamp_ns: now_ns,
        confidence: clamp01(confidence),
        cognitive_load,
        fatigue,
        stress,
        overall_state,
        sources,
    })
}

// ---------------------------------------------------------------------
// Environmental
// ---------------------------------------------------------------------

fn weather_risk(sample: &EnrichedSample) -> Option<(f64, Vec<String>)> {
    match &sample.sample.payload {
        PayloadData::Weather(p) => {
            let mut factors = Vec::new();
            let mut scores = Vec::new();
            if let Some(v) = p.visibility {
                scores.push(clamp01(1.0 - v / 10_000.0));
                if v < 1_000.0 {
                    factors.push("low-visibility".to_string());
                }
            }
            if let Some(w) = p.wind_speed {
                scores.push(clamp01(w / 60.0));
                if w > 40.0 {
                    factors.push("high-wind".to_string());
                }
            }
            if let Some(p_mm) = p.precipitation_mm {
                scores.push(clamp01(p_mm / 25.0));
                if p_mm > 5.0 {
                    factors.push("precipitation".to_string());
                }
            }
            if scores.is_empty() {
                None
            } else {
                Some((scores.iter().sum::<f64>() / scores.len() as f64, factors))
            }
        }
        _ => None,
    }
}

fn traffic_risk(sample: &EnrichedSample) -> Option<(f64, Vec<String>)> {
    match &sample.sample.payload {
        PayloadData::Traffic(p) => {
            let mut factors = Vec::new();
            let mut scores = Vec::new();
            if let Some(n) = p.nearby_count {
                scores.push(clamp01(n / 10.0));
                if n > 5.0 {
                    factors.push("high-density".to_string());
                }
            }
            if let Some(d) = p.closest_distance_m {
                scores.push(clamp01(1.0 - d / 1_000.0));
                if d < 200.0 {
                    factors.push("close-proximity".to_string());
                }
            }
            if let Some(r) = p.risk_level {
                scores.push(clamp01(r));
            }
            if scores.is_empty() {
                None
            } else {
                Some((scores.iter().sum::<f64>() / scores.len() as f64, factors))
            }
        }
        _ => None,
    }
}

/// Environmental fusion: fires per §4.6 if either
/// `{external/weather, external/traffic}` meets the quality gate.
pub fn environmental(latest: &LatestMap, now_ns: i64) -> Option<FusionResult> {
    let weather = get(latest, SourceDomain::External, SampleType::Weather);
    let traffic = get(latest, SourceDomain::External, SampleType::Traffic);

    let mut risk_factors = Vec::new();
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut qualities = Vec::new();

    if let Some(sample) = weather {
        if let Some((risk, factors)) = weather_risk(sample) {
            weighted_sum += 0.5 * risk;
            weight_total += 0.5;
            qualities.push(sample.quality.quality);
            risk_factors.push(RiskFactor {
                risk_type: "weather".to_string(),
                risk,
                factors,
            });
        }
    }
    if let Some(sample) = traffic {
        if let Some((risk, factors)) = traffic_risk(sample) {
            weighted_sum += 0.5 * risk;
            weight_total += 0.5;
            qualities.push(sample.quality.quality);
            risk_factors.push(RiskFactor {
                risk_type: "traffic".to_string(),
                risk,
                factors,
            });
        }
    }

    if weight_total <= 0.0 {
        return None;
    }

    let total_risk = clamp01(weighted_sum / weight_total);
    let recommendation = if total_risk >= 0.7 {
        EnvironmentalRecommendation::HighCaution
    } else if total_risk >= 0.4 {
        EnvironmentalRecommendation::ModerateCaution
    } else {
        EnvironmentalRecommendation::ProceedNormal
    };
    let confidence = qualities.iter().sum::<f64>() / qualities.len().max(1) as f64;

    Some(FusionResult::Environmental {
        timestamp_ns: now_ns,
        confidence: clamp01(confidence),
        total_risk,
        risk_factors,
        recommendation,
    })
}

// ---------------------------------------------------------------------
// Situational awareness
// ---------------------------------------------------------------------

const SA_EPSILON: f64 = 1e-3;

/// Situational-awareness fusion: fires per §4.6 iff both a human-state and
/// an environmental result already exist and a `simulator/telemetry`
/// sample is present. `demand`/`capability` are documented choices for the
/// spec's abstract `f`/`g` (§4.7 leaves their definitions open).
pub fn situational_awareness(
    human_state: &FusionResult,
    environmental: &FusionResult,
    telemetry: &EnrichedSample,
    now_ns: i64,
) -> Option<FusionResult> {
    let (cognitive_load, fatigue) = match human_state {
        FusionResult::HumanState {
            cognitive_load,
            fatigue,
            ..
        } => (*cognitive_load, *fatigue),
        _ => return None,
    };
    let total_risk = match environmental {
        FusionResult::Environmental { total_risk, .. } => *total_risk,
        _ => return None,
    };
    let complexity = match &telemetry.sample.payload {
        PayloadData::Telemetry(p) => p.complexity.unwrap_or(0.5),
        _ => 0.5,
    };

    let demand = clamp01(0.6 * total_risk + 0.4 * complexity);
    let capability = clamp01(0.5 * (1.0 - cognitive_load) + 0.5 * (1.0 - fatigue));
    let ratio = demand / capability.max(SA_EPSILON);
    let level = 1.0 - (ratio - 1.0).clamp(0.0, 1.0);

    let (status, recommendations) = if ratio > 1.5 {
        (
            SaStatus::Overload,
            vec![
                "reduce task load immediately".to_string(),
                "hand off non-critical tasks".to_string(),
            ],
        )
    } else if ratio > 1.0 {
        (
            SaStatus::HighLoad,
            vec!["monitor closely".to_string(), "defer optional tasks".to_string()],
        )
    } else if ratio > 0.7 {
        (SaStatus::ModerateLoad, vec!["maintain current pace".to_string()])
    } else {
        (SaStatus::LowLoad, vec!["capacity available for additional tasks".to_string()])
    };

    let confidence = clamp01(
        (human_state.confidence() + environmental.confidence() + telemetry.quality.quality) / 3.0,
    );

    Some(FusionResult::SituationalAwareness {
        timestamp_ns: now_ns,
        confidence,
        level,
        demand,
        capability,
        ratio,
        status,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BehavioralPayload, PerformancePayload, PhysiologicalPayload, Quality, Sample,
        TelemetryPayload, TrafficPayload, WeatherPayload,
    };

    fn enriched(key: SourceKey, payload: PayloadData, quality: f64) -> EnrichedSample {
        EnrichedSample {
            sample: Sample {
                key,
                timestamp_ns: 0,
                payload,
                ingest_time_ns: 0,
            },
            quality: Quality {
                quality,
                confidence: quality,
                staleness: 1.0,
                completeness: 1.0,
                consistency: 1.0,
                plausibility: 1.0,
            },
            issues: vec![],
            ingested_at_ns: 0,
        }
    }

    /// Exercises `human_state()` directly against a hand-built
    /// [`LatestMap`] — the pure algorithm's source-listing behavior only.
    /// This does not touch `FusionEngine::fire()` or its dedup path, so it
    /// says nothing about "exactly one `fusion_completed`"; that claim is
    /// covered end-to-end by
    /// `fusion::tests::scenario_3_fires_exactly_one_human_state_fusion`.
    #[test]
    fn human_state_fusion_lists_three_sources() {
        let mut latest = LatestMap::new();
        latest.insert(
            SourceKey::new(SourceDomain::Human, SampleType::Physiological),
            enriched(
                SourceKey::new(SourceDomain::Human, SampleType::Physiological),
                PayloadData::Physiological(PhysiologicalPayload {
                    heart_rate: Some(90.0),
                    ..Default::default()
                }),
                0.8,
            ),
        );
        latest.insert(
            SourceKey::new(SourceDomain::Human, SampleType::Behavioral),
            enriched(
                SourceKey::new(SourceDomain::Human, SampleType::Behavioral),
                PayloadData::Behavioral(BehavioralPayload {
                    blink_rate: Some(20.0),
                    ..Default::default()
                }),
                0.8,
            ),
        );
        latest.insert(
            SourceKey::new(SourceDomain::Human, SampleType::Performance),
            enriched(
                SourceKey::new(SourceDomain::Human, SampleType::Performance),
                PayloadData::Performance(PerformancePayload {
                    reaction_time_ms: Some(400.0),
                    ..Default::default()
                }),
                0.5,
            ),
        );

        let result = human_state(&latest, 123).expect("expected a human-state result");
        match result {
            FusionResult::HumanState { sources, .. } => {
                assert_eq!(sources.len(), 3);
                assert!(sources.contains(&"human/physiological".to_string()));
                assert!(sources.contains(&"human/behavioral".to_string()));
                assert!(sources.contains(&"human/performance".to_string()));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn environmental_buckets_recommendation_by_risk() {
        let mut latest = LatestMap::new();
        latest.insert(
            SourceKey::new(SourceDomain::External, SampleType::Weather),
            enriched(
                SourceKey::new(SourceDomain::External, SampleType::Weather),
                PayloadData::Weather(WeatherPayload {
                    visibility: Some(200.0),
                    wind_speed: Some(80.0),
                    ..Default::default()
                }),
                0.9,
            ),
        );
        let result = environmental(&latest, 0).expect("expected environmental result");
        match result {
            FusionResult::Environmental {
                recommendation,
                total_risk,
                ..
            } => {
                assert!(total_risk > 0.5);
                assert_eq!(recommendation, EnvironmentalRecommendation::HighCaution);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn environmental_absent_sources_return_none() {
        let latest = LatestMap::new();
        assert!(environmental(&latest, 0).is_none());
    }

    #[test]
    fn situational_awareness_requires_both_inputs() {
        let human = FusionResult::HumanState {
            timestamp_ns: 0,
            confidence: 0.8,
            cognitive_load: 0.3,
            fatigue: 0.2,
            stress: 0.2,
            overall_state: 0.23,
            sources: vec!["human/physiological".to_string()],
        };
        let env = FusionResult::Environmental {
            timestamp_ns: 0,
            confidence: 0.8,
            total_risk: 0.2,
            risk_factors: vec![],
            recommendation: EnvironmentalRecommendation::ProceedNormal,
        };
        let telemetry = enriched(
            SourceKey::new(SourceDomain::Simulator, SampleType::Telemetry),
            PayloadData::Telemetry(TelemetryPayload {
                complexity: Some(0.3),
                ..Default::default()
            }),
            0.9,
        );

        let sa = situational_awareness(&human, &env, &telemetry, 0).expect("expected SA result");
        match sa {
            FusionResult::SituationalAwareness { status, .. } => {
                assert_eq!(status, SaStatus::LowLoad);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn situational_awareness_overload_bucket() {
        let human = FusionResult::HumanState {
            timestamp_ns: 0,
            confidence: 0.8,
            cognitive_load: 0.9,
            fatigue: 0.9,
            stress: 0.9,
            overall_state: 0.9,
            sources: vec!["human/physiological".to_string()],
        };
        let env = FusionResult::Environmental {
            timestamp_ns: 0,
            confidence: 0.9,
            total_risk: 0.95,
            risk_factors: vec![],
            recommendation: EnvironmentalRecommendation::HighCaution,
        };
        let telemetry = enriched(
            SourceKey::new(SourceDomain::Simulator, SampleType::Telemetry),
            PayloadData::Telemetry(TelemetryPayload {
                complexity: Some(0.9),
                ..Default::default()
            }),
            0.9,
        );
        let sa = situational_awareness(&human, &env, &telemetry, 0).expect("expected SA result");
        match sa {
            FusionResult::SituationalAwareness { status, ratio, .. } => {
                assert!(ratio > 1.5);
                assert_eq!(status, SaStatus::Overload);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unrelated_traffic_payload_uses_weather_unaffected() {
        let mut latest = LatestMap::new();
        latest.insert(
            SourceKey::new(SourceDomain::External, SampleType::Traffic),
            enriched(
                SourceKey::new(SourceDomain::External, SampleType::Traffic),
                PayloadData::Traffic(TrafficPayload {
                    nearby_count: Some(1.0),
                    closest_distance_m: Some(900.0),
                    risk_level: Some(0.1),
                }),
                0.9,
            ),
        );
        let result = environmental(&latest, 0).expect("expected environmental result");
        match result {
            FusionResult::Environmental {
                recommendation, ..
            } => assert_eq!(recommendation, EnvironmentalRecommendation::ProceedNormal),
            _ => panic!("wrong variant"),
        }
    }
}
