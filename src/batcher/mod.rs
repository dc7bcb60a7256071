//! Adaptive Batcher (C11): latency-targeted coalescing for high-rate
//! streams, §4.11.
//!
//! Wraps a downstream async `process(batch)` closure behind a single
//! queue. On every tick it drains up to the current batch size and hands
//! the batch to `process`. The batch size is adjusted toward a target
//! mean in-queue latency: too slow shrinks it (down to 1), comfortably
//! fast grows it (up to `max_batch_size`).

mod error;

pub use error::BatcherError;

use crate::config::BatcherConfig;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Report snapshot, §4.11.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatcherReport {
    pub batches: u64,
    pub items: u64,
    pub avg_batch: f64,
    pub avg_latency_ms: f64,
}

struct Item<T> {
    value: T,
    enqueued_ns: i64,
}

/// EMA smoothing factor for the observed mean in-queue latency, matching
/// the Fusion Engine's processing-time EMA convention (§4.6).
const LATENCY_EMA_ALPHA: f64 = 0.1;

pub struct AdaptiveBatcher<T: Send + 'static> {
    cfg: BatcherConfig,
    tx: mpsc::Sender<Item<T>>,
    rx: Mutex<Option<mpsc::Receiver<Item<T>>>>,
    batch_size: AtomicUsize,
    batches_total: AtomicU64,
    items_total: AtomicU64,
    avg_latency_ns: AtomicI64,
    cancel: CancellationToken,
}

impl<T: Send + 'static> AdaptiveBatcher<T> {
    pub fn new(cfg: BatcherConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(cfg.max_batch_size.max(1) * 16);
        Arc::new(Self {
            batch_size: AtomicUsize::new(cfg.max_batch_size.max(1)),
            cfg,
            tx,
            rx: Mutex::new(Some(rx)),
            batches_total: AtomicU64::new(0),
            items_total: AtomicU64::new(0),
            avg_latency_ns: AtomicI64::new(0),
            cancel: CancellationToken::new(),
        })
    }

    /// Enqueues one item; never blocks (bounded channel sized generously
    /// relative to `max_batch_size`, matching the "no CPU-heavy section
    /// blocks a shared loop" design target of §5 rather than the
    /// drop-oldest policy of the Stream Node ring buffer, which this
    /// component sits downstream of).
    pub async fn submit(&self, value: T, now_ns: i64) -> Result<(), BatcherError> {
        self.tx
            .send(Item {
                value,
                enqueued_ns: now_ns,
            })
            .await
            .map_err(|_| BatcherError::Closed)
    }

    pub fn current_batch_size(&self) -> usize {
        self.batch_size.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> BatcherReport {
        let batches = self.batches_total.load(Ordering::Relaxed);
        let items = self.items_total.load(Ordering::Relaxed);
        BatcherReport {
            batches,
            items,
            avg_batch: if batches > 0 {
                items as f64 / batches as f64
            } else {
                0.0
            },
            avg_latency_ms: self.avg_latency_ns.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Runs the drain loop until [`Self::stop`] is called. `process` is
    /// invoked once per non-empty tick with the drained batch and the
    /// current monotonic time (for latency bookkeeping by the caller, if
    /// it wants its own view).
    pub async fn run<F, Fut>(self: &Arc<Self>, now_ns: impl Fn() -> i64, process: F)
    where
        F: Fn(Vec<T>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let mut rx = match self.rx.lock().await.take() {
            Some(rx) => rx,
            None => {
                tracing::warn!("AdaptiveBatcher::run called more than once");
                return;
            }
        };
        let tick = Duration::from_millis(self.cfg.base_interval_ms);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(tick) => {}
                _ = self.cancel.cancelled() => return,
            }

            let target = self.batch_size.load(Ordering::Relaxed);
            let mut batch = Vec::with_capacity(target);
            let mut latency_sum_ns: i64 = 0;
            while batch.len() < target {
                match rx.try_recv() {
                    Ok(item) => {
                        latency_sum_ns += (now_ns() - item.enqueued_ns).max(0);
                        batch.push(item.value);
                    }
                    Err(_) => break,
                }
            }
            if batch.is_empty() {
                continue;
            }

            let mean_latency_ns = latency_sum_ns / batch.len() as i64;
            self.update_latency_ema(mean_latency_ns);
            self.adjust_batch_size(mean_latency_ns as f64 / 1_000_000.0);

            self.batches_total.fetch_add(1, Ordering::Relaxed);
            self.items_total.fetch_add(batch.len() as u64, Ordering::Relaxed);

            process(batch).await;
        }
    }

    fn update_latency_ema(&self, sample_ns: i64) {
        let prev = self.avg_latency_ns.load(Ordering::Relaxed);
        let next = if prev == 0 {
            sample_ns
        } else {
            (LATENCY_EMA_ALPHA * sample_ns as f64 + (1.0 - LATENCY_EMA_ALPHA) * prev as f64) as i64
        };
        self.avg_latency_ns.store(next, Ordering::Relaxed);
    }

    /// Shrinks by 1 (min 1) if observed latency exceeds target; grows by 1
    /// (max `max_batch_size`) if comfortably under half the target, §4.11.
    fn adjust_batch_size(&self, observed_latency_ms: f64) {
        let target = self.cfg.target_latency_ms;
        self.batch_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                if observed_latency_ms > target {
                    Some(current.saturating_sub(1).max(1))
                } else if observed_latency_ms < target / 2.0 {
                    Some((current + 1).min(self.cfg.max_batch_size.max(1)))
                } else {
                    None
                }
            })
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn drains_submitted_items_into_batches() {
        let cfg = BatcherConfig {
            base_interval_ms: 5,
            max_batch_size: 10,
            target_latency_ms: 20.0,
        };
        let batcher = AdaptiveBatcher::new(cfg);
        for i in 0..5 {
            batcher.submit(i, 0).await.unwrap();
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let batcher_clone = batcher.clone();
        let handle = tokio::spawn(async move {
            batcher_clone
                .run(|| 0, |batch| {
                    let seen = seen_clone.clone();
                    async move {
                        seen.lock().await.extend(batch);
                    }
                })
                .await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        batcher.stop();
        let _ = handle.await;

        assert_eq!(seen.lock().await.len(), 5);
        assert_eq!(batcher.report().items, 5);
    }

    #[test]
    fn shrinks_on_high_latency_grows_on_low_latency() {
        let cfg = BatcherConfig {
            base_interval_ms: 5,
            max_batch_size: 10,
            target_latency_ms: 20.0,
        };
        let batcher: Arc<AdaptiveBatcher<u32>> = AdaptiveBatcher::new(cfg);
        batcher.batch_size.store(5, Ordering::Relaxed);

        batcher.adjust_batch_size(30.0); // above target -> shrink
        assert_eq!(batcher.current_batch_size(), 4);

        batcher.adjust_batch_size(5.0); // below target/2 -> grow
        assert_eq!(batcher.current_batch_size(), 5);

        batcher.adjust_batch_size(15.0); // between target/2 and target -> unchanged
        assert_eq!(batcher.current_batch_size(), 5);
    }

    #[test]
    fn batch_size_never_drops_below_one() {
        let cfg = BatcherConfig {
            base_interval_ms: 5,
            max_batch_size: 10,
            target_latency_ms: 20.0,
        };
        let batcher: Arc<AdaptiveBatcher<u32>> = AdaptiveBatcher::new(cfg);
        batcher.batch_size.store(1, Ordering::Relaxed);
        batcher.adjust_batch_size(100.0);
        assert_eq!(batcher.current_batch_size(), 1);
    }
}
