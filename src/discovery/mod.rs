//! Discovery (C9): mDNS-style device enumeration.
//!
//! Discovery never connects to anything — it only watches a service name
//! for a bounded window and reports `found`/`updated`/`lost` events.
//! `DeviceSession` construction and `connect()` are the caller's business.

mod error;
mod mock;

pub use error::DiscoveryError;
pub use mock::mock_device_record;

use crate::config::DiscoveryConfig;
use crate::events::DiscoveryEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

/// A discovered device, §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub capabilities: Vec<String>,
    pub device_info: BTreeMap<String, String>,
}

struct TrackedDevice {
    record: DeviceRecord,
    last_seen_ns: i64,
}

/// A bounded-window mDNS-style scanner. Real service resolution (actual
/// `_pupil-mobile._tcp` browsing) is an external collaborator; this
/// component owns the found/updated/lost lifecycle and the mock fallback
/// (§4.9) that the rest of the runtime actually exercises in tests and
/// demos.
pub struct Discovery {
    cfg: DiscoveryConfig,
    devices: Mutex<std::collections::HashMap<String, TrackedDevice>>,
    events: broadcast::Sender<DiscoveryEvent>,
    cancel: CancellationToken,
}

impl Discovery {
    pub fn new(cfg: DiscoveryConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(crate::events::DEFAULT_EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            cfg,
            devices: Mutex::new(std::collections::HashMap::new()),
            events,
            cancel: CancellationToken::new(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.events.subscribe()
    }

    /// Records or refreshes a sighting of `record`, emitting `Found` the
    /// first time and `Updated` on subsequent sightings whose fields
    /// changed.
    pub async fn observe(&self, record: DeviceRecord, now_ns: i64) {
        let mut devices = self.devices.lock().await;
        match devices.get_mut(&record.id) {
            Some(existing) => {
                let changed = existing.record != record;
                existing.last_seen_ns = now_ns;
                if changed {
                    existing.record = record.clone();
                    let _ = self.events.send(DiscoveryEvent::Updated(record));
                }
            }
            None => {
                devices.insert(
                    record.id.clone(),
                    TrackedDevice {
                        record: record.clone(),
                        last_seen_ns: now_ns,
                    },
                );
                let _ = self.events.send(DiscoveryEvent::Found(record));
            }
        }
    }

    /// Sweeps devices unseen for `lost_after_secs` and emits `Lost` for
    /// each, §4.9.
    pub async fn sweep_lost(&self, now_ns: i64) {
        let lost_after_ns = self.cfg.lost_after_secs as i64 * 1_000_000_000;
        let mut devices = self.devices.lock().await;
        let mut lost_ids = Vec::new();
        devices.retain(|id, tracked| {
            let alive = now_ns - tracked.last_seen_ns <= lost_after_ns;
            if !alive {
                lost_ids.push(id.clone());
            }
            alive
        });
        drop(devices);
        for id in lost_ids {
            let _ = self.events.send(DiscoveryEvent::Lost(id));
        }
    }

    pub async fn known_devices(&self) -> Vec<DeviceRecord> {
        self.devices
            .lock()
            .await
            .values()
            .map(|t| t.record.clone())
            .collect()
    }

    /// Runs a bounded discovery window (default 5-10s per §4.9): observes
    /// whatever `scan` yields, periodically sweeps for lost devices, and
    /// synthesizes a mock device if nothing real was found and mock mode
    /// is enabled. Returns the devices known at the end of the window.
    pub async fn run_window<F, Fut>(
        self: &Arc<Self>,
        window: Duration,
        now_ns: impl Fn() -> i64 + Send + Sync + 'static,
        scan: F,
    ) -> Result<Vec<DeviceRecord>, DiscoveryError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Vec<DeviceRecord>> + Send,
    {
        let deadline = tokio::time::Instant::now() + window;
        let sweep_interval = Duration::from_secs(1).min(window);

        loop {
            if self.cancel.is_cancelled() {
                return Err(DiscoveryError::Cancelled);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                break;
            }

            let found = scan().await;
            let ts = now_ns();
            for record in found {
                self.observe(record, ts).await;
            }
            self.sweep_lost(ts).await;

            tokio::select! {
                _ = tokio::time::sleep(sweep_interval.min(deadline.saturating_duration_since(now))) => {}
                _ = self.cancel.cancelled() => return Err(DiscoveryError::Cancelled),
            }
        }

        let mut known = self.known_devices().await;
        if known.is_empty() && self.cfg.mock_mode {
            let mock = mock_device_record(&self.cfg.service_name);
            self.observe(mock.clone(), now_ns()).await;
            known.push(mock);
        }
        Ok(known)
    }

    /// Aborts any in-flight discovery window cleanly (§5).
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> DeviceRecord {
        DeviceRecord {
            id: id.to_string(),
            name: format!("device-{id}"),
            address: "127.0.0.1".to_string(),
            port: 8080,
            capabilities: vec!["gaze".to_string()],
            device_info: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn first_sighting_emits_found() {
        let discovery = Discovery::new(DiscoveryConfig::default());
        let mut events = discovery.subscribe();
        discovery.observe(record("a"), 0).await;
        match events.recv().await.unwrap() {
            DiscoveryEvent::Found(d) => assert_eq!(d.id, "a"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn changed_sighting_emits_updated_not_found() {
        let discovery = Discovery::new(DiscoveryConfig::default());
        discovery.observe(record("a"), 0).await;
        let mut events = discovery.subscribe();

        let mut changed = record("a");
        changed.port = 9090;
        discovery.observe(changed, 1).await;
        match events.recv().await.unwrap() {
            DiscoveryEvent::Updated(d) => assert_eq!(d.port, 9090),
            other => panic!("expected Updated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unseen_device_is_lost_after_threshold() {
        let cfg = DiscoveryConfig {
            lost_after_secs: 60,
            ..Default::default()
        };
        let discovery = Discovery::new(cfg);
        discovery.observe(record("a"), 0).await;
        let mut events = discovery.subscribe();

        discovery.sweep_lost(30 * 1_000_000_000).await;
        assert!(events.try_recv().is_err());

        discovery.sweep_lost(61 * 1_000_000_000).await;
        match events.recv().await.unwrap() {
            DiscoveryEvent::Lost(id) => assert_eq!(id, "a"),
            other => panic!("expected Lost, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_scan_with_mock_mode_synthesizes_device() {
        let cfg = DiscoveryConfig {
            mock_mode: true,
            window_secs: 1,
            ..Default::default()
        };
        let discovery = Discovery::new(cfg);
        let found = discovery
            .run_window(Duration::from_millis(20), || 0, || async { Vec::new() })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
