//! Distributor (C10): typed, topic-based publish/subscribe to external
//! consumers.
//!
//! One bounded channel per subscription, sized to
//! [`DistributorConfig::per_subscriber_highwatermark`]. A `best-effort`
//! publish drops to a full subscriber (counted, subscriber stays
//! subscribed); a `guaranteed` publish that finds the subscriber's queue
//! full closes the subscription outright with [`DistributorError::SlowConsumer`].

mod error;

pub use error::DistributorError;

use crate::config::DistributorConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Delivery reliability for one [`Distributor::publish`] call, §4.10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reliability {
    BestEffort,
    Guaranteed,
}

/// Per-publish options, §6 Distributor config / §4.10 operations.
#[derive(Debug, Clone, Copy)]
pub struct PublishOptions {
    pub priority: u8,
    pub reliability: Reliability,
    pub compress: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            priority: 0,
            reliability: Reliability::BestEffort,
            compress: false,
        }
    }
}

/// One distributed unit: a topic-tagged payload carrying the quality of
/// the sample/result it was built from, so a subscriber's `min_quality`
/// gate can filter before delivery.
#[derive(Debug, Clone)]
pub struct DistributedFrame {
    pub topic: String,
    pub payload: Vec<u8>,
    pub quality: f64,
}

/// Snapshot of one subscription's delivery counters, §4.10.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionMetrics {
    pub bytes: u64,
    pub frames: u64,
    pub drops: u64,
    pub last_delivery_ns: i64,
}

struct MetricsCell {
    bytes: AtomicU64,
    frames: AtomicU64,
    drops: AtomicU64,
    last_delivery_ns: AtomicI64,
}

impl MetricsCell {
    fn new() -> Self {
        Self {
            bytes: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            drops: AtomicU64::new(0),
            last_delivery_ns: AtomicI64::new(0),
        }
    }

    fn snapshot(&self) -> SubscriptionMetrics {
        SubscriptionMetrics {
            bytes: self.bytes.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
            last_delivery_ns: self.last_delivery_ns.load(Ordering::Relaxed),
        }
    }
}

struct Subscription {
    topics: HashSet<String>,
    min_quality: f64,
    tx: mpsc::Sender<DistributedFrame>,
    metrics: Arc<MetricsCell>,
}

/// Typed topic bus: `subscribe`/`unsubscribe`/`publish`, §4.10.
pub struct Distributor {
    cfg: DistributorConfig,
    subscriptions: dashmap::DashMap<String, Subscription>,
}

impl Distributor {
    pub fn new(cfg: DistributorConfig) -> Self {
        Self {
            cfg,
            subscriptions: dashmap::DashMap::new(),
        }
    }

    pub fn client_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Registers a subscription for `topics`, gated to frames whose quality
    /// is at least `min_quality`. Returns the receiving half of its bounded
    /// channel, or [`DistributorError::AtCapacity`] once `max_clients` is
    /// reached.
    pub fn subscribe(
        &self,
        topics: Vec<String>,
        client_id: impl Into<String>,
        min_quality: f64,
    ) -> Result<mpsc::Receiver<DistributedFrame>, DistributorError> {
        let client_id = client_id.into();
        if self.subscriptions.len() >= self.cfg.max_clients && !self.subscriptions.contains_key(&client_id)
        {
            return Err(DistributorError::AtCapacity {
                max_clients: self.cfg.max_clients,
            });
        }

        let (tx, rx) = mpsc::channel(self.cfg.per_subscriber_highwatermark);
        self.subscriptions.insert(
            client_id,
            Subscription {
                topics: topics.into_iter().collect(),
                min_quality,
                tx,
                metrics: Arc::new(MetricsCell::new()),
            },
        );
        Ok(rx)
    }

    pub fn unsubscribe(&self, client_id: &str) {
        self.subscriptions.remove(client_id);
    }

    pub fn subscription_metrics(&self, client_id: &str) -> Option<SubscriptionMetrics> {
        self.subscriptions.get(client_id).map(|s| s.metrics.snapshot())
    }

    /// Publishes `frame` to every subscription on `topic` whose
    /// `min_quality` gate passes. Compression, when requested, is applied
    /// once per delivery (real payload bytes vary per subscriber only in
    /// the sense that a slow-consumer closure can happen mid-fan-out).
    pub fn publish(&self, frame: DistributedFrame, opts: PublishOptions, now_ns: i64) {
        let payload: std::borrow::Cow<[u8]> = if opts.compress {
            match zstd::encode_all(frame.payload.as_slice(), 0) {
                Ok(compressed) => std::borrow::Cow::Owned(compressed),
                Err(e) => {
                    tracing::warn!(topic = %frame.topic, error = %e, "zstd compression failed, sending uncompressed");
                    std::borrow::Cow::Borrowed(&frame.payload)
                }
            }
        } else {
            std::borrow::Cow::Borrowed(&frame.payload)
        };

        let mut to_close = Vec::new();
        for entry in self.subscriptions.iter() {
            let client_id = entry.key().clone();
            let sub = entry.value();
            if !sub.topics.contains(&frame.topic) || frame.quality < sub.min_quality {
                continue;
            }
            let delivered = DistributedFrame {
                topic: frame.topic.clone(),
                payload: payload.to_vec(),
                quality: frame.quality,
            };
            match sub.tx.try_send(delivered) {
                Ok(()) => {
                    sub.metrics.bytes.fetch_add(payload.len() as u64, Ordering::Relaxed);
                    sub.metrics.frames.fetch_add(1, Ordering::Relaxed);
                    sub.metrics.last_delivery_ns.store(now_ns, Ordering::Relaxed);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    sub.metrics.drops.fetch_add(1, Ordering::Relaxed);
                    if opts.reliability == Reliability::Guaranteed {
                        to_close.push(client_id);
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    to_close.push(client_id);
                }
            }
        }

        for client_id in to_close {
            tracing::warn!(client_id = %client_id, "slow consumer, closing subscription");
            self.subscriptions.remove(&client_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(topic: &str, quality: f64) -> DistributedFrame {
        DistributedFrame {
            topic: topic.to_string(),
            payload: vec![1, 2, 3, 4],
            quality,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_matching_topic() {
        let dist = Distributor::new(DistributorConfig::default());
        let mut rx = dist.subscribe(vec!["gaze".to_string()], "client-1", 0.0).unwrap();
        dist.publish(frame("gaze", 0.9), PublishOptions::default(), 1);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic, "gaze");
        assert_eq!(dist.subscription_metrics("client-1").unwrap().frames, 1);
    }

    #[tokio::test]
    async fn quality_gate_filters_low_quality_frames() {
        let dist = Distributor::new(DistributorConfig::default());
        let mut rx = dist.subscribe(vec!["gaze".to_string()], "client-1", 0.5).unwrap();
        dist.publish(frame("gaze", 0.2), PublishOptions::default(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn best_effort_drops_without_closing_subscription() {
        let cfg = DistributorConfig {
            per_subscriber_highwatermark: 1,
            ..Default::default()
        };
        let dist = Distributor::new(cfg);
        let _rx = dist.subscribe(vec!["gaze".to_string()], "client-1", 0.0).unwrap();
        dist.publish(frame("gaze", 1.0), PublishOptions::default(), 1);
        dist.publish(frame("gaze", 1.0), PublishOptions::default(), 2); // queue full, dropped
        assert_eq!(dist.client_count(), 1);
        assert_eq!(dist.subscription_metrics("client-1").unwrap().drops, 1);
    }

    #[tokio::test]
    async fn guaranteed_publish_closes_slow_consumer() {
        let cfg = DistributorConfig {
            per_subscriber_highwatermark: 1,
            ..Default::default()
        };
        let dist = Distributor::new(cfg);
        let _rx = dist.subscribe(vec!["gaze".to_string()], "client-1", 0.0).unwrap();
        let opts = PublishOptions {
            reliability: Reliability::Guaranteed,
            ..Default::default()
        };
        dist.publish(frame("gaze", 1.0), opts, 1);
        dist.publish(frame("gaze", 1.0), opts, 2); // queue full -> slow-consumer close
        assert_eq!(dist.client_count(), 0);
    }

    #[tokio::test]
    async fn at_capacity_rejects_new_subscription() {
        let cfg = DistributorConfig {
            max_clients: 1,
            ..Default::default()
        };
        let dist = Distributor::new(cfg);
        let _rx = dist.subscribe(vec!["gaze".to_string()], "client-1", 0.0).unwrap();
        let err = dist.subscribe(vec!["gaze".to_string()], "client-2", 0.0).unwrap_err();
        assert!(matches!(err, DistributorError::AtCapacity { .. }));
    }
}
