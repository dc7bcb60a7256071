//! Stream Node (C4): per-source bounded buffer, processor chain, and
//! subscriber fan-out.
//!
//! One [`StreamNode`] exists per `(source, type)` key. Its owning Device
//! Session feeds it raw [`Sample`]s in producer order on a single task; it
//! never blocks that task (§4.4 contract) — a full buffer drops the oldest
//! unread item and a full subscriber channel drops the subscriber, not the
//! producer.

mod error;
mod processor;
mod ring_buffer;

pub use error::StreamError;
pub use processor::{PassthroughProcessor, SampleProcessor};
pub use ring_buffer::{RingBuffer, Timestamped};

use crate::clock::is_wildly_out_of_order;
use crate::events::{Backpressure, NodeDegraded, ProcessingError};
use crate::model::{EnrichedSample, QualityIssue, Sample, SourceKey};
use crate::quality::QualityAssessor;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

impl Timestamped for EnrichedSample {
    fn timestamp_ns(&self) -> i64 {
        self.sample.timestamp_ns
    }
}

/// Size of each subscriber's bounded channel, §4.4.
pub const SUBSCRIBER_CHANNEL_CAPACITY: usize = 64;
/// Window over which the error rate is tracked for the `degraded` signal.
const ERROR_WINDOW: usize = 200;
/// A node is marked degraded once more than half of the last
/// [`ERROR_WINDOW`] samples failed processing.
const DEGRADED_THRESHOLD: f64 = 0.5;

/// Diagnostic/lifecycle events a [`StreamNode`] emits alongside its data
/// path, consumed by logging/metrics wiring rather than the fusion path.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Backpressure(Backpressure),
    Error(ProcessingError),
    Degraded(NodeDegraded),
}

struct ErrorWindow {
    outcomes: VecDeque<bool>,
}

impl ErrorWindow {
    fn new() -> Self {
        Self {
            outcomes: VecDeque::with_capacity(ERROR_WINDOW),
        }
    }

    /// Record an outcome (`true` = success) and return the current error
    /// rate over the retained window.
    fn record(&mut self, success: bool) -> f64 {
        if self.outcomes.len() == ERROR_WINDOW {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
        let failures = self.outcomes.iter().filter(|ok| !**ok).count();
        failures as f64 / self.outcomes.len() as f64
    }
}

/// Bounded buffer + processor chain + subscriber fan-out for one
/// `(source, type)` stream.
pub struct StreamNode {
    key: SourceKey,
    processors: Vec<Box<dyn SampleProcessor>>,
    quality: Arc<QualityAssessor>,
    buffer: RwLock<RingBuffer<EnrichedSample>>,
    subscribers: dashmap::DashMap<Uuid, mpsc::Sender<EnrichedSample>>,
    events: broadcast::Sender<StreamEvent>,
    dropped_total: AtomicU64,
    error_window: std::sync::Mutex<ErrorWindow>,
    degraded: AtomicBool,
}

impl StreamNode {
    pub fn new(
        key: SourceKey,
        quality: Arc<QualityAssessor>,
        processors: Vec<Box<dyn SampleProcessor>>,
        buffer_capacity: usize,
        window_ms: i64,
    ) -> Self {
        let (events, _) = broadcast::channel(crate::events::DEFAULT_EVENT_CHANNEL_CAPACITY);
        Self {
            key,
            processors,
            quality,
            buffer: RwLock::new(RingBuffer::new(buffer_capacity, window_ms)),
            subscribers: dashmap::DashMap::new(),
            events,
            dropped_total: AtomicU64::new(0),
            error_window: std::sync::Mutex::new(ErrorWindow::new()),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> SourceKey {
        self.key
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    /// Register a new subscriber; returns its id (for [`Self::unsubscribe`])
    /// and the receiving half of its bounded channel.
    pub fn subscribe(&self) -> (Uuid, mpsc::Receiver<EnrichedSample>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let id = Uuid::new_v4();
        self.subscribers.insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Ingest one raw sample: run the processor chain, assess quality,
    /// buffer, and fan out. At-most-once per input; never blocks the
    /// caller on a full buffer or a full subscriber channel.
    pub fn process(&self, sample: Sample, now_ns: i64) -> Result<EnrichedSample, StreamError> {
        if is_wildly_out_of_order(sample.timestamp_ns, now_ns) {
            // §4.1: still ingested, but flagged maximally implausible by
            // the quality assessor below rather than rejected outright —
            // the chain only aborts on genuine stage errors.
        }

        let mut current = sample;
        for stage in &self.processors {
            match stage.process(current) {
                Ok(next) => current = next,
                Err(err) => {
                    let rate = self.record_outcome(false);
                    let _ = self.events.send(StreamEvent::Error(ProcessingError {
                        key: self.key,
                        stage: stage.name(),
                        message: err.to_string(),
                    }));
                    self.maybe_mark_degraded(rate);
                    return Err(err);
                }
            }
        }

        let (quality, issues) = self.quality.assess(&current, now_ns);
        let enriched = EnrichedSample {
            sample: current,
            quality,
            issues,
            ingested_at_ns: now_ns,
        };

        self.buffer_and_publish(enriched.clone());
        let rate = self.record_outcome(true);
        self.maybe_mark_degraded(rate);

        Ok(enriched)
    }

    fn buffer_and_publish(&self, enriched: EnrichedSample) {
        let evicted = self
            .buffer
            .write()
            .expect("stream node buffer lock poisoned")
            .insert(enriched.clone(), enriched.ingested_at_ns);
        if evicted {
            let dropped = self.dropped_total.fetch_add(1, Ordering::Relaxed) + 1;
            let _ = self.events.send(StreamEvent::Backpressure(Backpressure {
                key: self.key,
                dropped_total: dropped,
            }));
        }

        // Copy-on-write snapshot: publishers iterate a point-in-time list
        // of subscribers so a concurrent subscribe/unsubscribe never races
        // fan-out (§5).
        let snapshot: Vec<(Uuid, mpsc::Sender<EnrichedSample>)> = self
            .subscribers
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        for (id, tx) in snapshot {
            match tx.try_send(enriched.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = %id, key = %self.key, "subscriber backlog exceeded capacity, dropping subscriber");
                    self.subscribers.remove(&id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.subscribers.remove(&id);
                }
            }
        }
    }

    fn record_outcome(&self, success: bool) -> f64 {
        self.error_window
            .lock()
            .expect("stream node error window lock poisoned")
            .record(success)
    }

    fn maybe_mark_degraded(&self, error_rate: f64) {
        let now_degraded = error_rate > DEGRADED_THRESHOLD;
        let was_degraded = self.degraded.swap(now_degraded, Ordering::AcqRel);
        if now_degraded && !was_degraded {
            let _ = self.events.send(StreamEvent::Degraded(NodeDegraded {
                key: self.key,
                error_rate,
            }));
        }
    }

    pub fn latest(&self, k: usize) -> Vec<EnrichedSample> {
        self.buffer
            .read()
            .expect("stream node buffer lock poisoned")
            .latest(k)
    }

    pub fn in_window(&self, window_ms: i64, now_ns: i64) -> Vec<EnrichedSample> {
        self.buffer
            .read()
            .expect("stream node buffer lock poisoned")
            .in_window(window_ms, now_ns)
    }

    pub fn closest(&self, ts_ns: i64, tolerance_ms: i64) -> Option<EnrichedSample> {
        self.buffer
            .read()
            .expect("stream node buffer lock poisoned")
            .closest(ts_ns, tolerance_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PayloadData, SampleType, SourceDomain, TelemetryPayload};

    fn key() -> SourceKey {
        SourceKey::new(SourceDomain::Simulator, SampleType::Telemetry)
    }

    fn sample(ts_ns: i64) -> Sample {
        Sample {
            key: key(),
            timestamp_ns: ts_ns,
            payload: PayloadData::Telemetry(TelemetryPayload {
                position: Some([0.0, 0.0, 0.0]),
                velocity: Some([0.0, 0.0, 0.0]),
                ..Default::default()
            }),
            ingest_time_ns: ts_ns,
        }
    }

    fn node() -> StreamNode {
        StreamNode::new(
            key(),
            Arc::new(QualityAssessor::new()),
            vec![Box::new(PassthroughProcessor)],
            100,
            60_000,
        )
    }

    #[test]
    fn process_produces_well_formed_enriched_sample() {
        let node = node();
        let out = node.process(sample(1_000_000_000), 1_000_000_000).unwrap();
        assert!(out.quality.is_well_formed());
    }

    #[tokio::test]
    async fn subscriber_receives_in_producer_order() {
        let node = node();
        let (_id, mut rx) = node.subscribe();
        for i in 0..5 {
            node.process(sample(i * 1_000_000), i * 1_000_000).unwrap();
        }
        let mut seen = Vec::new();
        for _ in 0..5 {
            let e = rx.recv().await.unwrap();
            seen.push(e.sample.timestamp_ns);
        }
        assert_eq!(seen, vec![0, 1_000_000, 2_000_000, 3_000_000, 4_000_000]);
    }

    #[test]
    fn buffer_overflow_counts_backpressure_drop() {
        let node = StreamNode::new(
            key(),
            Arc::new(QualityAssessor::new()),
            vec![],
            2,
            60_000,
        );
        for i in 0..5 {
            node.process(sample(i * 1_000_000), i * 1_000_000).unwrap();
        }
        assert_eq!(node.dropped_total(), 3);
        assert_eq!(node.latest(10).len(), 2);
    }

    struct AlwaysFails;
    impl SampleProcessor for AlwaysFails {
        fn name(&self) -> &'static str {
            "always-fails"
        }
        fn process(&self, _sample: Sample) -> Result<Sample, StreamError> {
            Err(StreamError::Validation("boom".into()))
        }
    }

    #[test]
    fn repeated_failures_mark_node_degraded() {
        let node = StreamNode::new(
            key(),
            Arc::new(QualityAssessor::new()),
            vec![Box::new(AlwaysFails)],
            100,
            60_000,
        );
        for i in 0..10 {
            let _ = node.process(sample(i * 1_000_000), i * 1_000_000);
        }
        assert!(node.is_degraded());
    }
}
