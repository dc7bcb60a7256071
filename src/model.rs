//! Shared data model: samples, quality, series points, and fusion results.
//!
//! Every cross-component value that flows through the runtime is defined
//! here so that component modules depend on a single vocabulary instead of
//! redefining ad-hoc shapes at each boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A source domain, matching the first segment of the `(source, type)` key
/// used throughout the spec (`human/physiological`, `simulator/telemetry`,
/// `external/weather`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceDomain {
    Human,
    Simulator,
    External,
}

impl std::fmt::Display for SourceDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceDomain::Human => write!(f, "human"),
            SourceDomain::Simulator => write!(f, "simulator"),
            SourceDomain::External => write!(f, "external"),
        }
    }
}

/// A sample type, the second segment of the `(source, type)` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleType {
    Physiological,
    Behavioral,
    SelfReport,
    Performance,
    Telemetry,
    Systems,
    Dynamics,
    Environment,
    Weather,
    Traffic,
    Navigation,
    Communications,
    /// Unrecognized (source, type) pair, carried as an opaque numeric map.
    Opaque,
}

impl std::fmt::Display for SampleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SampleType::Physiological => "physiological",
            SampleType::Behavioral => "behavioral",
            SampleType::SelfReport => "self_report",
            SampleType::Performance => "performance",
            SampleType::Telemetry => "telemetry",
            SampleType::Systems => "systems",
            SampleType::Dynamics => "dynamics",
            SampleType::Environment => "environment",
            SampleType::Weather => "weather",
            SampleType::Traffic => "traffic",
            SampleType::Navigation => "navigation",
            SampleType::Communications => "communications",
            SampleType::Opaque => "opaque",
        };
        write!(f, "{s}")
    }
}

/// Unique per-source key: `(source, type)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceKey {
    pub source: SourceDomain,
    pub sample_type: SampleType,
}

impl SourceKey {
    pub fn new(source: SourceDomain, sample_type: SampleType) -> Self {
        Self { source, sample_type }
    }

    /// Canonical `"source/type"` string, used as a map key in the Temporal
    /// Store and in log fields.
    pub fn as_series_name(&self) -> String {
        format!("{}/{}", self.source, self.sample_type)
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_series_name())
    }
}

/// A 2D or 3D point, used for gaze coordinates, positions, and velocities.
pub type Vec3 = [f64; 3];

/// Eye-tracker eye state: pupil center and diameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EyeState {
    pub center_x: f64,
    pub center_y: f64,
    pub pupil_diameter_mm: f64,
}

/// Gaze payload, per §6 Eye-tracker transport schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GazePayload {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
    pub worn: bool,
    pub left_eye: Option<EyeState>,
    pub right_eye: Option<EyeState>,
}

/// Physiological payload (heart rate, HRV, etc).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhysiologicalPayload {
    pub heart_rate: Option<f64>,
    pub hrv: Option<f64>,
    pub skin_conductance: Option<f64>,
    pub respiration_rate: Option<f64>,
}

/// Behavioral payload (eye-tracker derived attention/workload proxies).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehavioralPayload {
    pub blink_rate: Option<f64>,
    pub fixation_duration_ms: Option<f64>,
    pub saccade_rate: Option<f64>,
}

/// Self-reported payload (e.g., periodic NASA-TLX style probes).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelfReportPayload {
    pub workload: Option<f64>,
    pub fatigue: Option<f64>,
    pub stress: Option<f64>,
}

/// Performance payload (task performance proxies: reaction time, errors).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformancePayload {
    pub reaction_time_ms: Option<f64>,
    pub error_rate: Option<f64>,
    pub task_completion: Option<f64>,
}

/// Simulator telemetry payload (vehicle/aircraft dynamics).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub position: Option<Vec3>,
    pub velocity: Option<Vec3>,
    pub acceleration: Option<Vec3>,
    pub heading_deg: Option<f64>,
    pub speed: Option<f64>,
    pub complexity: Option<f64>,
}

/// Simulator systems payload (engine/aircraft system state).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemsPayload {
    pub engine_rpm: Option<f64>,
    pub fuel: Option<f64>,
    pub damage: Option<f64>,
}

/// Simulator dynamics payload (fine-grained flight/vehicle dynamics).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynamicsPayload {
    pub altitude: Option<f64>,
    pub airspeed: Option<f64>,
    pub bank_deg: Option<f64>,
    pub pitch_deg: Option<f64>,
}

/// Simulator environment payload (in-sim weather/visibility).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimEnvironmentPayload {
    pub visibility: Option<f64>,
    pub wind_speed: Option<f64>,
    pub precipitation: Option<f64>,
}

/// External weather payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherPayload {
    pub temperature_c: Option<f64>,
    pub wind_speed: Option<f64>,
    pub visibility: Option<f64>,
    pub precipitation_mm: Option<f64>,
}

/// External traffic payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficPayload {
    pub nearby_count: Option<f64>,
    pub closest_distance_m: Option<f64>,
    pub risk_level: Option<f64>,
}

/// External navigation payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigationPayload {
    pub cross_track_error_m: Option<f64>,
    pub waypoints_remaining: Option<f64>,
}

/// External communications payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommunicationsPayload {
    pub channel_load: Option<f64>,
    pub message_rate: Option<f64>,
}

/// Closed algebraic payload type: one constructor per recognized
/// `(source, type)` pair, plus `Opaque` for anything else. Resolves the
/// dynamic `{[key]: unknown}` payload pattern flagged for re-architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PayloadData {
    Gaze(GazePayload),
    Physiological(PhysiologicalPayload),
    Behavioral(BehavioralPayload),
    SelfReport(SelfReportPayload),
    Performance(PerformancePayload),
    Telemetry(TelemetryPayload),
    Systems(SystemsPayload),
    Dynamics(DynamicsPayload),
    SimEnvironment(SimEnvironmentPayload),
    Weather(WeatherPayload),
    Traffic(TrafficPayload),
    Navigation(NavigationPayload),
    Communications(CommunicationsPayload),
    /// Accepted only by the Quality Assessor and the Distributor; every
    /// other component treats an unrecognized source as a pass-through.
    Opaque { fields: BTreeMap<String, f64> },
}

impl PayloadData {
    /// Returns the named numeric field if present, walking into the
    /// relevant payload variant. Used by completeness/consistency checks
    /// that are field-name driven rather than variant-match driven.
    pub fn field(&self, name: &str) -> Option<f64> {
        match (self, name) {
            (PayloadData::Physiological(p), "heartRate") => p.heart_rate,
            (PayloadData::Physiological(p), "hrv") => p.hrv,
            (PayloadData::Physiological(p), "skinConductance") => p.skin_conductance,
            (PayloadData::Physiological(p), "respirationRate") => p.respiration_rate,
            (PayloadData::Behavioral(p), "blinkRate") => p.blink_rate,
            (PayloadData::Behavioral(p), "fixationDuration") => p.fixation_duration_ms,
            (PayloadData::Behavioral(p), "saccadeRate") => p.saccade_rate,
            (PayloadData::SelfReport(p), "workload") => p.workload,
            (PayloadData::SelfReport(p), "fatigue") => p.fatigue,
            (PayloadData::SelfReport(p), "stress") => p.stress,
            (PayloadData::Performance(p), "reactionTime") => p.reaction_time_ms,
            (PayloadData::Performance(p), "errorRate") => p.error_rate,
            (PayloadData::Performance(p), "taskCompletion") => p.task_completion,
            (PayloadData::Telemetry(p), "heading") => p.heading_deg,
            (PayloadData::Telemetry(p), "speed") => p.speed,
            (PayloadData::Telemetry(p), "complexity") => p.complexity,
            (PayloadData::Systems(p), "engineRpm") => p.engine_rpm,
            (PayloadData::Systems(p), "fuel") => p.fuel,
            (PayloadData::Systems(p), "damage") => p.damage,
            (PayloadData::Dynamics(p), "altitude") => p.altitude,
            (PayloadData::Dynamics(p), "airspeed") => p.airspeed,
            (PayloadData::Dynamics(p), "bank") => p.bank_deg,
            (PayloadData::Dynamics(p), "pitch") => p.pitch_deg,
            (PayloadData::SimEnvironment(p), "visibility") => p.visibility,
            (PayloadData::SimEnvironment(p), "windSpeed") => p.wind_speed,
            (PayloadData::SimEnvironment(p), "precipitation") => p.precipitation,
            (PayloadData::Weather(p), "temperature") => p.temperature_c,
            (PayloadData::Weather(p), "windSpeed") => p.wind_speed,
            (PayloadData::Weather(p), "visibility") => p.visibility,
            (PayloadData::Weather(p), "precipitation") => p.precipitation_mm,
            (PayloadData::Traffic(p), "nearbyCount") => p.nearby_count,
            (PayloadData::Traffic(p), "closestDistance") => p.closest_distance_m,
            (PayloadData::Traffic(p), "riskLevel") => p.risk_level,
            (PayloadData::Navigation(p), "crossTrackError") => p.cross_track_error_m,
            (PayloadData::Navigation(p), "waypointsRemaining") => p.waypoints_remaining,
            (PayloadData::Communications(p), "channelLoad") => p.channel_load,
            (PayloadData::Communications(p), "messageRate") => p.message_rate,
            (PayloadData::Gaze(p), "x") => Some(p.x),
            (PayloadData::Gaze(p), "y") => Some(p.y),
            (PayloadData::Gaze(p), "confidence") => Some(p.confidence),
            (PayloadData::Opaque { fields }, name) => fields.get(name).copied(),
            _ => None,
        }
    }

    /// One representative scalar per variant, fed to the Temporal Store
    /// series for this `(source, type)` — the headline number a trend/
    /// anomaly/forecast call would plot. Picked per variant rather than
    /// derived generically since "the interesting number" differs by
    /// payload (heart rate for physiology, speed for telemetry, ...).
    pub fn primary_metric(&self) -> Option<f64> {
        match self {
            PayloadData::Gaze(p) => Some(p.confidence),
            PayloadData::Physiological(p) => p.heart_rate,
            PayloadData::Behavioral(p) => p.blink_rate,
            PayloadData::SelfReport(p) => p.workload,
            PayloadData::Performance(p) => p.reaction_time_ms,
            PayloadData::Telemetry(p) => p.speed,
            PayloadData::Systems(p) => p.engine_rpm,
            PayloadData::Dynamics(p) => p.altitude,
            PayloadData::SimEnvironment(p) => p.visibility,
            PayloadData::Weather(p) => p.visibility,
            PayloadData::Traffic(p) => p.risk_level,
            PayloadData::Navigation(p) => p.cross_track_error_m,
            PayloadData::Communications(p) => p.channel_load,
            PayloadData::Opaque { fields } => fields.values().next().copied(),
        }
    }
}

/// Immutable ingested record before quality assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub key: SourceKey,
    /// Monotonic or skew-corrected wall-clock nanoseconds.
    pub timestamp_ns: i64,
    pub payload: PayloadData,
    /// Monotonic nanoseconds at which the runtime observed this sample.
    pub ingest_time_ns: i64,
}

/// A quality issue tag, explaining why a dimension scored low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityIssue {
    Stale,
    Incomplete,
    Inconsistent,
    Implausible,
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QualityIssue::Stale => "stale",
            QualityIssue::Incomplete => "incomplete",
            QualityIssue::Inconsistent => "inconsistent",
            QualityIssue::Implausible => "implausible",
        };
        write!(f, "{s}")
    }
}

/// Multi-dimensional confidence score for a single sample, per §4.2.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quality {
    pub quality: f64,
    pub confidence: f64,
    pub staleness: f64,
    pub completeness: f64,
    pub consistency: f64,
    pub plausibility: f64,
}

impl Quality {
    /// All dimensions are clamped in `[0, 1]` and `confidence <= quality`
    /// (within floating point tolerance), matching Invariant 1 of §8.
    pub fn is_well_formed(&self) -> bool {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        in_unit(self.quality)
            && in_unit(self.confidence)
            && in_unit(self.staleness)
            && in_unit(self.completeness)
            && in_unit(self.consistency)
            && in_unit(self.plausibility)
            && self.confidence <= self.quality + 1e-9
    }
}

/// Sample plus its computed Quality, as it travels downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedSample {
    pub sample: Sample,
    pub quality: Quality,
    pub issues: Vec<QualityIssue>,
    /// Monotonic nanoseconds at which quality assessment completed.
    pub ingested_at_ns: i64,
}

impl EnrichedSample {
    pub fn key(&self) -> SourceKey {
        self.sample.key
    }
}

/// One point in a bounded time series: value, its quality at capture time,
/// and the timestamp it was recorded at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub value: f64,
    pub quality: f64,
    pub timestamp_ns: i64,
}

/// Direction of a linear trend fit, per §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

/// Result of fitting a weighted linear trend over a Temporal Store window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub slope: f64,
    pub intercept: f64,
    pub standard_error: f64,
    pub confidence: f64,
}

impl Trend {
    pub fn insufficient_data() -> Self {
        Self {
            direction: TrendDirection::InsufficientData,
            slope: 0.0,
            intercept: 0.0,
            standard_error: 0.0,
            confidence: 0.0,
        }
    }
}

/// Situational-awareness workload status bucket, per §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaStatus {
    Overload,
    HighLoad,
    ModerateLoad,
    LowLoad,
}

impl std::fmt::Display for SaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SaStatus::Overload => "overload",
            SaStatus::HighLoad => "high-load",
            SaStatus::ModerateLoad => "moderate-load",
            SaStatus::LowLoad => "low-load",
        };
        write!(f, "{s}")
    }
}

/// Environmental risk recommendation bucket, per §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentalRecommendation {
    HighCaution,
    ModerateCaution,
    ProceedNormal,
}

impl std::fmt::Display for EnvironmentalRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EnvironmentalRecommendation::HighCaution => "high-caution",
            EnvironmentalRecommendation::ModerateCaution => "moderate-caution",
            EnvironmentalRecommendation::ProceedNormal => "proceed-normal",
        };
        write!(f, "{s}")
    }
}

/// One risk factor contributing to an environmental fusion result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub risk_type: String,
    pub risk: f64,
    pub factors: Vec<String>,
}

/// Output of the Fusion Engine, per §3/§4.7. Each variant carries the
/// type-specific fields the spec enumerates for that fusion type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "fusion_type", rename_all = "kebab-case")]
pub enum FusionResult {
    HumanState {
        timestamp_ns: i64,
        confidence: f64,
        cognitive_load: f64,
        fatigue: f64,
        stress: f64,
        overall_state: f64,
        sources: Vec<String>,
    },
    Environmental {
        timestamp_ns: i64,
        confidence: f64,
        total_risk: f64,
        risk_factors: Vec<RiskFactor>,
        recommendation: EnvironmentalRecommendation,
    },
    SituationalAwareness {
        timestamp_ns: i64,
        confidence: f64,
        level: f64,
        demand: f64,
        capability: f64,
        ratio: f64,
        status: SaStatus,
        recommendations: Vec<String>,
    },
}

impl FusionResult {
    pub fn timestamp_ns(&self) -> i64 {
        match self {
            FusionResult::HumanState { timestamp_ns, .. }
            | FusionResult::Environmental { timestamp_ns, .. }
            | FusionResult::SituationalAwareness { timestamp_ns, .. } => *timestamp_ns,
        }
    }

    pub fn fusion_type_name(&self) -> &'static str {
        match self {
            FusionResult::HumanState { .. } => "human-state",
            FusionResult::Environmental { .. } => "environmental",
            FusionResult::SituationalAwareness { .. } => "situational-awareness",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            FusionResult::HumanState { confidence, .. }
            | FusionResult::Environmental { confidence, .. }
            | FusionResult::SituationalAwareness { confidence, .. } => *confidence,
        }
    }

    /// Structural equality ignoring `timestamp_ns` — two evaluations of the
    /// same trigger at the same instant (same source composition, same
    /// scores) are "the same result materializing twice", while a
    /// differently-composed result (e.g. a third source joining) is not,
    /// even when both carry an identical `timestamp_ns`. Used by
    /// `FusionEngine::fire` to decide whether a newly computed result
    /// actually supersedes the stored one.
    pub fn same_content_as(&self, other: &FusionResult) -> bool {
        match (self, other) {
            (
                FusionResult::HumanState {
                    confidence: c1,
                    cognitive_load: cl1,
                    fatigue: f1,
                    stress: s1,
                    overall_state: o1,
                    sources: src1,
                    ..
                },
                FusionResult::HumanState {
                    confidence: c2,
                    cognitive_load: cl2,
                    fatigue: f2,
                    stress: s2,
                    overall_state: o2,
                    sources: src2,
                    ..
                },
            ) => c1 == c2 && cl1 == cl2 && f1 == f2 && s1 == s2 && o1 == o2 && src1 == src2,
            (
                FusionResult::Environmental {
                    confidence: c1,
                    total_risk: t1,
                    risk_factors: r1,
                    recommendation: rec1,
                    ..
                },
                FusionResult::Environmental {
                    confidence: c2,
                    total_risk: t2,
                    risk_factors: r2,
                    recommendation: rec2,
                    ..
                },
            ) => c1 == c2 && t1 == t2 && r1 == r2 && rec1 == rec2,
            (
                FusionResult::SituationalAwareness {
                    confidence: c1,
                    level: l1,
                    demand: d1,
                    capability: cap1,
                    ratio: r1,
                    status: st1,
                    recommendations: rec1,
                    ..
                },
                FusionResult::SituationalAwareness {
                    confidence: c2,
                    level: l2,
                    demand: d2,
                    capability: cap2,
                    ratio: r2,
                    status: st2,
                    recommendations: rec2,
                    ..
                },
            ) => {
                c1 == c2 && l1 == l2 && d1 == d2 && cap1 == cap2 && r1 == r2 && st1 == st2 && rec1 == rec2
            }
            _ => false,
        }
    }
}

/// Vehicle/aircraft kinematic state, part of the canonical `TelemetryFrame`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub acceleration: Option<Vec3>,
    /// Quaternion `[x, y, z, w]`.
    pub rotation: [f64; 4],
    pub heading_deg: f64,
}

/// Control surface/input state, part of the canonical `TelemetryFrame`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlState {
    pub throttle: f64,
    pub brake: f64,
    pub steering: f64,
    pub gear: i32,
    pub custom: Option<BTreeMap<String, f64>>,
}

/// Performance metrics, part of the canonical `TelemetryFrame`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceState {
    pub speed: f64,
    pub fuel: f64,
    pub engine_rpm: f64,
    pub damage: Option<f64>,
}

/// Simulator identity for a `TelemetryFrame`, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Simulator {
    Msfs,
    Beamng,
    Xplane,
    Vatsim,
}

/// The canonical, simulator-agnostic telemetry frame (§6). Every simulator
/// adapter in `session` produces one of these from its wire protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub timestamp_ns: u64,
    pub sequence: u32,
    pub source_id: String,
    pub simulator: Simulator,
    pub vehicle: VehicleState,
    pub controls: ControlState,
    pub performance: PerformanceState,
}

/// A command published toward a Device Session (e.g., from an operator
/// console) to be translated into one or more protocol frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub action: String,
    pub parameters: BTreeMap<String, f64>,
}

/// `CommandResult.code` for a command the session could not map.
pub const UNSUPPORTED_COMMAND: &str = "UNSUPPORTED_COMMAND";

/// Outcome of executing a [`Command`] against a session's transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<String>,
    pub message: Option<String>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: None,
            message: None,
        }
    }

    pub fn unsupported(action: &str) -> Self {
        Self {
            success: false,
            code: Some(UNSUPPORTED_COMMAND.to_string()),
            message: Some(format!("unsupported action: {action}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_key_formats_as_slash_path() {
        let key = SourceKey::new(SourceDomain::Human, SampleType::Physiological);
        assert_eq!(key.as_series_name(), "human/physiological");
        assert_eq!(key.to_string(), "human/physiological");
    }

    #[test]
    fn quality_well_formed_checks_bounds() {
        let q = Quality {
            quality: 0.8,
            confidence: 0.7,
            staleness: 1.0,
            completeness: 1.0,
            consistency: 1.0,
            plausibility: 0.6,
        };
        assert!(q.is_well_formed());

        let bad = Quality {
            confidence: 0.9,
            ..q
        };
        assert!(!bad.is_well_formed());
    }

    #[test]
    fn opaque_payload_field_lookup() {
        let mut fields = BTreeMap::new();
        fields.insert("custom_metric".to_string(), 42.0);
        let payload = PayloadData::Opaque { fields };
        assert_eq!(payload.field("custom_metric"), Some(42.0));
        assert_eq!(payload.field("missing"), None);
    }

    #[test]
    fn fusion_result_accessors() {
        let result = FusionResult::Environmental {
            timestamp_ns: 123,
            confidence: 0.5,
            total_risk: 0.4,
            risk_factors: vec![],
            recommendation: EnvironmentalRecommendation::ModerateCaution,
        };
        assert_eq!(result.timestamp_ns(), 123);
        assert_eq!(result.fusion_type_name(), "environmental");
        assert_eq!(result.confidence(), 0.5);
    }
}
