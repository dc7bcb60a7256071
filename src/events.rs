//! Cross-component runtime events.
//!
//! Every component that the spec describes as "emits an event" (Stream
//! Node backpressure/error, Fusion Engine `data_ingested`/`fusion_completed`/
//! `prediction_update`, Device Session state transitions, Discovery
//! found/updated/lost) publishes one [`RuntimeEvent`] variant. There is no
//! single dispatcher: each component fans its own events out to its own
//! `tokio::sync::broadcast` channel, and callers subscribe to the
//! components they care about (§5 "Event-bus fan-out runs on publisher
//! tasks").

use crate::model::{FusionResult, SourceKey};
use std::time::Duration;

/// A sample was ingested and stored as the latest value for its key.
#[derive(Debug, Clone)]
pub struct DataIngested {
    pub key: SourceKey,
    pub quality: f64,
    pub timestamp_ns: i64,
}

/// A fusion trigger fired and produced a result.
#[derive(Debug, Clone)]
pub struct FusionCompleted {
    pub fusion_type: &'static str,
    pub result: FusionResult,
}

/// A later, possibly-stale refinement of a prior fusion result (temporal
/// context enrichment landed after the original `fusion_completed`).
#[derive(Debug, Clone)]
pub struct PredictionUpdate {
    pub fusion_type: &'static str,
    pub result: FusionResult,
}

/// A Stream Node dropped the oldest buffered item to stay within capacity.
#[derive(Debug, Clone)]
pub struct Backpressure {
    pub key: SourceKey,
    pub dropped_total: u64,
}

/// A processor stage failed for one sample; the sample itself is dropped,
/// the node is not.
#[derive(Debug, Clone)]
pub struct ProcessingError {
    pub key: SourceKey,
    pub stage: &'static str,
    pub message: String,
}

/// More than half of the last 200 samples for `key` failed processing.
#[derive(Debug, Clone)]
pub struct NodeDegraded {
    pub key: SourceKey,
    pub error_rate: f64,
}

/// Discovery lifecycle events, §4.9.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    Found(crate::discovery::DeviceRecord),
    Updated(crate::discovery::DeviceRecord),
    Lost(String),
}

/// Device Session state transition, §4.8.
#[derive(Debug, Clone)]
pub struct SessionStateChanged {
    pub device_id: String,
    pub from: crate::session::SessionState,
    pub to: crate::session::SessionState,
}

/// Capacity of every per-component broadcast channel unless the component
/// has a more specific reason to differ (e.g. the Distributor's per-client
/// high-watermark).
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// How long a `recv` on an event channel will wait in tests that want to
/// assert "no further event arrives" without hanging forever.
pub const EVENT_RECV_TIMEOUT: Duration = Duration::from_millis(200);
