//! Fusion Engine (C6): orchestrates quality → storage → sync → algorithms
//! → results.

mod algorithms;
mod error;

pub use error::FusionError;

use crate::config::FusionThresholds;
use crate::events::{DataIngested, FusionCompleted, PredictionUpdate};
use crate::model::{EnrichedSample, FusionResult, Sample, SampleType, SourceDomain, SourceKey};
use crate::quality::QualityAssessor;
use crate::temporal::TemporalStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Fusion result type tags, in the trigger-evaluation order of §4.6 step 2
/// (also the tie-break order of §4.7).
pub const HUMAN_STATE: &str = "human-state";
pub const ENVIRONMENTAL: &str = "environmental";
pub const SITUATIONAL_AWARENESS: &str = "situational-awareness";

/// Optional, non-blocking temporal-context enrichment, §4.6/§9 — resolves
/// the source's `await`-inside-non-async-function defect. `try_enrich` must
/// return immediately; `spawn_async_enrich` may do real work but its result
/// lands as a later `prediction_update`, never delaying the original
/// `fusion_completed`.
pub trait TemporalContextEnricher: Send + Sync {
    fn try_enrich(&self, _result: &FusionResult, _store: &TemporalStore) -> Option<FusionResult> {
        None
    }

    fn spawn_async_enrich(
        &self,
        _result: FusionResult,
    ) -> Option<tokio::task::JoinHandle<FusionResult>> {
        None
    }
}

/// No enrichment at all — the default when the engine is built without an
/// explicit enricher.
#[derive(Default)]
pub struct NoopEnricher;
impl TemporalContextEnricher for NoopEnricher {}

#[derive(Debug, Clone)]
pub enum FusionEvent {
    DataIngested(DataIngested),
    FusionCompleted(FusionCompleted),
    PredictionUpdate(PredictionUpdate),
}

#[derive(Debug, Default)]
struct Metrics {
    total_ingestions: AtomicU64,
    total_fusions: AtomicU64,
    human_state_count: AtomicU64,
    environmental_count: AtomicU64,
    situational_awareness_count: AtomicU64,
    /// EMA of per-`maybe_trigger_fusions` processing time, α=0.1 (§4.6).
    ema_processing_ns: Mutex<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FusionMetricsSnapshot {
    pub total_ingestions: u64,
    pub total_fusions: u64,
    pub human_state_count: u64,
    pub environmental_count: u64,
    pub situational_awareness_count: u64,
    pub ema_processing_ns: f64,
}

const EMA_ALPHA: f64 = 0.1;

pub struct FusionEngine {
    quality: Arc<QualityAssessor>,
    temporal: Arc<TemporalStore>,
    thresholds: FusionThresholds,
    latest_by_key: dashmap::DashMap<SourceKey, EnrichedSample>,
    latest_result_by_type: dashmap::DashMap<&'static str, FusionResult>,
    last_fusion_ts: dashmap::DashMap<&'static str, i64>,
    events: broadcast::Sender<FusionEvent>,
    metrics: Metrics,
    enricher: Arc<dyn TemporalContextEnricher>,
}

impl FusionEngine {
    pub fn new(quality: Arc<QualityAssessor>, temporal: Arc<TemporalStore>, thresholds: FusionThresholds) -> Self {
        Self::with_enricher(quality, temporal, thresholds, Arc::new(NoopEnricher))
    }

    pub fn with_enricher(
        quality: Arc<QualityAssessor>,
        temporal: Arc<TemporalStore>,
        thresholds: FusionThresholds,
        enricher: Arc<dyn TemporalContextEnricher>,
    ) -> Self {
        let (events, _) = broadcast::channel(crate::events::DEFAULT_EVENT_CHANNEL_CAPACITY);
        Self {
            quality,
            temporal,
            thresholds,
            latest_by_key: dashmap::DashMap::new(),
            latest_result_by_type: dashmap::DashMap::new(),
            last_fusion_ts: dashmap::DashMap::new(),
            events,
            metrics: Metrics::default(),
            enricher,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FusionEvent> {
        self.events.subscribe()
    }

    /// §4.6 step 1, taken literally: assess quality, build the
    /// `EnrichedSample`, ingest it, then evaluate triggers.
    pub fn ingest_raw(&self, sample: Sample, now_ns: i64) -> Vec<FusionResult> {
        let (quality, issues) = self.quality.assess(&sample, now_ns);
        let key = sample.key;
        let enriched = EnrichedSample {
            sample,
            quality,
            issues,
            ingested_at_ns: now_ns,
        };
        self.ingest_enriched(key, enriched, now_ns)
    }

    /// Ingest a sample whose quality has already been assessed upstream
    /// (the normal path when a Stream Node sits in front of this engine).
    /// Idempotent in its effect on `latest_by_key` for repeated identical
    /// samples — only the metrics counters advance (§8 round-trip law).
    pub fn ingest_enriched(&self, key: SourceKey, enriched: EnrichedSample, now_ns: i64) -> Vec<FusionResult> {
        self.metrics.total_ingestions.fetch_add(1, Ordering::Relaxed);

        if let Some(value) = enriched.sample.payload.primary_metric() {
            self.temporal.insert(
                key,
                crate::model::SeriesPoint {
                    value,
                    quality: enriched.quality.quality,
                    timestamp_ns: enriched.sample.timestamp_ns,
                },
            );
        }

        let _ = self.events.send(FusionEvent::DataIngested(DataIngested {
            key,
            quality: enriched.quality.quality,
            timestamp_ns: enriched.sample.timestamp_ns,
        }));

        self.latest_by_key.insert(key, enriched);

        self.maybe_trigger_fusions(now_ns)
    }

    pub fn latest(&self, key: SourceKey) -> Option<EnrichedSample> {
        self.latest_by_key.get(&key).map(|e| e.clone())
    }

    pub fn latest_result(&self, fusion_type: &str) -> Option<FusionResult> {
        self.latest_result_by_type.get(fusion_type).map(|e| e.clone())
    }

    pub fn metrics(&self) -> FusionMetricsSnapshot {
        FusionMetricsSnapshot {
            total_ingestions: self.metrics.total_ingestions.load(Ordering::Relaxed),
            total_fusions: self.metrics.total_fusions.load(Ordering::Relaxed),
            human_state_count: self.metrics.human_state_count.load(Ordering::Relaxed),
            environmental_count: self.metrics.environmental_count.load(Ordering::Relaxed),
            situational_awareness_count: self.metrics.situational_awareness_count.load(Ordering::Relaxed),
            ema_processing_ns: *self.metrics.ema_processing_ns.lock().expect("ema lock poisoned"),
        }
    }

    /// Snapshot the latest-by-key map under one short-lived exclusive
    /// section, per §5 — readers get an owned copy, never a live borrow.
    fn snapshot_latest(&self) -> HashMap<SourceKey, EnrichedSample> {
        self.latest_by_key
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }

    /// Evaluates the three triggers in document order (§4.6 step 2 /
    /// §4.7 tie-break rule) and fires whichever conditions hold.
    pub fn maybe_trigger_fusions(&self, now_ns: i64) -> Vec<FusionResult> {
        let start = now_ns;
        let snapshot = self.snapshot_latest();
        let mut fired = Vec::new();

        if self.human_state_ready(&snapshot) {
            if let Some(result) = algorithms::human_state(&snapshot, now_ns) {
                if let Some(stored) = self.fire(HUMAN_STATE, result) {
                    fired.push(stored);
                }
            }
        }

        if self.environmental_ready(&snapshot) {
            if let Some(result) = algorithms::environmental(&snapshot, now_ns) {
                if let Some(stored) = self.fire(ENVIRONMENTAL, result) {
                    fired.push(stored);
                }
            }
        }

        if let (Some(human), Some(env), Some(telemetry)) = (
            self.latest_result_by_type.get(HUMAN_STATE).map(|e| e.clone()),
            self.latest_result_by_type.get(ENVIRONMENTAL).map(|e| e.clone()),
            snapshot.get(&SourceKey::new(SourceDomain::Simulator, SampleType::Telemetry)),
        ) {
            if let Some(result) = algorithms::situational_awareness(&human, &env, telemetry, now_ns) {
                if let Some(stored) = self.fire(SITUATIONAL_AWARENESS, result) {
                    fired.push(stored);
                }
            }
        }

        let elapsed_ns = (now_ns - start).max(0) as f64;
        let mut ema = self.metrics.ema_processing_ns.lock().expect("ema lock poisoned");
        *ema = EMA_ALPHA * elapsed_ns + (1.0 - EMA_ALPHA) * *ema;

        fired
    }

    fn human_state_ready(&self, snapshot: &HashMap<SourceKey, EnrichedSample>) -> bool {
        [SampleType::Physiological, SampleType::Behavioral, SampleType::Performance]
            .iter()
            .any(|t| {
                snapshot
                    .get(&SourceKey::new(SourceDomain::Human, *t))
                    .is_some_and(|s| s.quality.quality >= self.thresholds.human)
            })
    }

    fn environmental_ready(&self, snapshot: &HashMap<SourceKey, EnrichedSample>) -> bool {
        [SampleType::Weather, SampleType::Traffic].iter().any(|t| {
            snapshot
                .get(&SourceKey::new(SourceDomain::External, *t))
                .is_some_and(|s| s.quality.quality >= self.thresholds.environmental)
        })
    }

    /// Stores `result` as the latest-by-type, bumps metrics, emits
    /// `fusion_completed`, and runs the synchronous (never the async)
    /// enrichment hook before storing — enforcing Invariant 6 (§8):
    /// `fusion_completed.timestamp` is monotonic per `fusion_type`.
    ///
    /// Dedup is on content, not timestamp: `ingest(x); ingest(x)` (the
    /// §8 idempotence law) must not re-fire, but two distinct trigger
    /// evaluations that legitimately share a `timestamp_ns` — e.g. several
    /// samples ingested from one `now_ns()` read in the same tick — must
    /// still fire when the later one is a structurally different result
    /// (a new source joining the composition, a changed score). A result
    /// is only suppressed when it is identical, modulo timestamp, to the
    /// one already stored for this `fusion_type`.
    fn fire(&self, fusion_type: &'static str, result: FusionResult) -> Option<FusionResult> {
        let ts = result.timestamp_ns();
        if let Some(last) = self.last_fusion_ts.get(fusion_type) {
            if ts < *last {
                return None;
            }
        }
        if let Some(stored) = self.latest_result_by_type.get(fusion_type) {
            if stored.same_content_as(&result) {
                return None;
            }
        }
        self.last_fusion_ts.insert(fusion_type, ts);

        let result = self
            .enricher
            .try_enrich(&result, &self.temporal)
            .unwrap_or(result);

        self.latest_result_by_type.insert(fusion_type, result.clone());
        self.metrics.total_fusions.fetch_add(1, Ordering::Relaxed);
        match fusion_type {
            HUMAN_STATE => self.metrics.human_state_count.fetch_add(1, Ordering::Relaxed),
            ENVIRONMENTAL => self.metrics.environmental_count.fetch_add(1, Ordering::Relaxed),
            SITUATIONAL_AWARENESS => self
                .metrics
                .situational_awareness_count
                .fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };

        let _ = self.events.send(FusionEvent::FusionCompleted(FusionCompleted {
            fusion_type,
            result: result.clone(),
        }));

        if let Some(handle) = self.enricher.spawn_async_enrich(result.clone()) {
            let events = self.events.clone();
            tokio::spawn(async move {
                if let Ok(enriched) = handle.await {
                    let _ = events.send(FusionEvent::PredictionUpdate(PredictionUpdate {
                        fusion_type,
                        result: enriched,
                    }));
                }
            });
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FusionThresholds;
    use crate::model::{BehavioralPayload, PayloadData, PhysiologicalPayload, Sample};

    fn engine() -> FusionEngine {
        FusionEngine::new(
            Arc::new(QualityAssessor::new()),
            Arc::new(TemporalStore::default()),
            FusionThresholds::default(),
        )
    }

    fn sample(source: SourceDomain, ty: SampleType, payload: PayloadData, ts: i64) -> Sample {
        Sample {
            key: SourceKey::new(source, ty),
            timestamp_ns: ts,
            payload,
            ingest_time_ns: ts,
        }
    }

    #[test]
    fn scenario_3_fires_exactly_one_human_state_fusion() {
        let engine = engine();
        let now = 1_000_000_000_000i64;

        engine.ingest_raw(
            sample(
                SourceDomain::Human,
                SampleType::Physiological,
                PayloadData::Physiological(PhysiologicalPayload {
                    heart_rate: Some(90.0),
                    ..Default::default()
                }),
                now,
            ),
            now,
        );
        let mut events = engine.subscribe_events();

        engine.ingest_raw(
            sample(
                SourceDomain::Human,
                SampleType::Behavioral,
                PayloadData::Behavioral(BehavioralPayload {
                    blink_rate: Some(20.0),
                    ..Default::default()
                }),
                now,
            ),
            now,
        );

        let mut fusion_completed_count = 0;
        while let Ok(event) = events.try_recv() {
            if let FusionEvent::FusionCompleted(fc) = event {
                if fc.fusion_type == HUMAN_STATE {
                    fusion_completed_count += 1;
                    match fc.result {
                        FusionResult::HumanState { sources, .. } => {
                            assert_eq!(sources.len(), 2);
                        }
                        _ => panic!("wrong variant"),
                    }
                }
            }
        }
        assert_eq!(fusion_completed_count, 1);
    }

    #[test]
    fn ingest_is_idempotent_on_latest_by_key_modulo_metrics() {
        let engine = engine();
        let s = sample(
            SourceDomain::Simulator,
            SampleType::Telemetry,
            PayloadData::Telemetry(Default::default()),
            0,
        );
        engine.ingest_raw(s.clone(), 0);
        let after_first = engine.latest(s.key).unwrap().sample.timestamp_ns;
        engine.ingest_raw(s.clone(), 0);
        let after_second = engine.latest(s.key).unwrap().sample.timestamp_ns;
        assert_eq!(after_first, after_second);
        assert_eq!(engine.metrics().total_ingestions, 2);
    }

    #[test]
    fn fusion_completed_timestamp_is_monotonic_per_type() {
        let engine = engine();
        for i in 0..5 {
            let ts = i * 1_000_000;
            engine.ingest_raw(
                sample(
                    SourceDomain::Human,
                    SampleType::Physiological,
                    PayloadData::Physiological(PhysiologicalPayload {
                        heart_rate: Some(80.0 + i as f64),
                        ..Default::default()
                    }),
                    ts,
                ),
                ts,
            );
        }
        let last = engine.latest_result(HUMAN_STATE).unwrap();
        assert_eq!(last.timestamp_ns(), 4_000_000);
    }
}
