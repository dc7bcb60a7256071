//! Device Session (C8): connect/reconnect/heartbeat state machine owning a
//! framed-protocol transport.

mod error;
mod mock;
pub mod protocols;
mod transport;

pub use error::SessionError;
pub use mock::{default_rate_hz, MockGenerator};
pub use protocols::ProtocolAdapter;
pub use transport::{
    split_line_delimited, try_extract_binary_frame, BinaryFrameHeader, Transport,
    BINARY_HEADER_LEN, MAX_FRAME_BYTES,
};

use crate::config::SessionConfig;
use crate::events::SessionStateChanged;
use crate::model::{Command, CommandResult};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// States of §4.8's state machine. `Clone`/`Copy`/`PartialEq` so callers
/// can snapshot and compare without holding any lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Error,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Disconnecting => "disconnecting",
            SessionState::Error => "error",
            SessionState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

struct StateCell {
    inner: std::sync::Mutex<SessionState>,
}

impl StateCell {
    fn new(state: SessionState) -> Self {
        Self {
            inner: std::sync::Mutex::new(state),
        }
    }

    fn get(&self) -> SessionState {
        *self.inner.lock().expect("session state lock poisoned")
    }

    /// Returns the previous state if it changed, `None` if this was a
    /// no-op transition to the same state.
    fn set(&self, new: SessionState) -> Option<SessionState> {
        let mut guard = self.inner.lock().expect("session state lock poisoned");
        if *guard == new {
            return None;
        }
        let old = *guard;
        *guard = new;
        Some(old)
    }
}

/// Device Session: owns exactly one transport and its ingestion/heartbeat
/// tasks (§3 "Lifecycles & ownership").
pub struct DeviceSession {
    pub device_id: String,
    pub address: String,
    pub port: u16,
    cfg: SessionConfig,
    state: StateCell,
    attempt_count: AtomicU32,
    last_heartbeat_ns: AtomicI64,
    cancel: CancellationToken,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    protocol: Option<Arc<dyn ProtocolAdapter>>,
    events: broadcast::Sender<SessionStateChanged>,
    reconnect_in_flight: std::sync::atomic::AtomicBool,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
    connect_task: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceSession {
    pub fn new(
        device_id: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        cfg: SessionConfig,
        transport: Box<dyn Transport>,
    ) -> Arc<Self> {
        Self::with_protocol(device_id, address, port, cfg, transport, None)
    }

    /// Builds a session whose command path (§4.8 "Event mapping") goes
    /// through `protocol`'s [`ProtocolAdapter::encode_command`].
    pub fn with_protocol(
        device_id: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        cfg: SessionConfig,
        transport: Box<dyn Transport>,
        protocol: Option<Arc<dyn ProtocolAdapter>>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(crate::events::DEFAULT_EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            device_id: device_id.into(),
            address: address.into(),
            port,
            cfg,
            state: StateCell::new(SessionState::Disconnected),
            attempt_count: AtomicU32::new(0),
            last_heartbeat_ns: AtomicI64::new(0),
            cancel: CancellationToken::new(),
            transport: Arc::new(Mutex::new(transport)),
            protocol,
            events,
            reconnect_in_flight: std::sync::atomic::AtomicBool::new(false),
            heartbeat_task: Mutex::new(None),
            connect_task: Mutex::new(None),
        })
    }

    /// Translates `command` to protocol frames via the configured adapter
    /// and sends them, §4.8 "Event mapping (command path)". An action with
    /// no mapping (or a session with no protocol adapter at all) returns
    /// `CommandResult{success:false, code:UNSUPPORTED_COMMAND}` rather than
    /// an error — this is caller-visible, not a session fault.
    pub async fn send_command(&self, command: &Command) -> CommandResult {
        let Some(protocol) = &self.protocol else {
            return CommandResult::unsupported(&command.action);
        };
        let Some(bytes) = protocol.encode_command(command) else {
            return protocol.unsupported();
        };
        if self.transport.lock().await.send(&bytes).await {
            CommandResult::ok()
        } else {
            CommandResult {
                success: false,
                code: None,
                message: Some("transport send returned false".to_string()),
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count.load(Ordering::SeqCst)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionStateChanged> {
        self.events.subscribe()
    }

    fn transition(&self, new: SessionState) {
        if let Some(old) = self.state.set(new) {
            let _ = self.events.send(SessionStateChanged {
                device_id: self.device_id.clone(),
                from: old,
                to: new,
            });
        }
    }

    /// `connect() @ Disconnected|Error -> Connecting`. A no-op if already
    /// `Connected` or already mid-`Connecting` (§8 idempotence law).
    pub fn connect(self: &Arc<Self>) {
        match self.state() {
            SessionState::Connected | SessionState::Connecting => return,
            _ => {}
        }
        self.transition(SessionState::Connecting);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.connect_loop().await });
        if let Ok(mut slot) = self.connect_task.try_lock() {
            *slot = Some(handle);
        }
    }

    async fn connect_loop(self: Arc<Self>) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            let timeout = Duration::from_millis(self.cfg.connect_timeout_ms);
            let address = self.address.clone();
            let port = self.port;
            let outcome = {
                let mut guard = self.transport.lock().await;
                tokio::time::timeout(timeout, guard.connect(&address, port, timeout)).await
            };

            match outcome {
                Ok(Ok(())) => {
                    self.attempt_count.store(0, Ordering::SeqCst);
                    self.last_heartbeat_ns.store(now_ns(), Ordering::SeqCst);
                    self.transition(SessionState::Connected);
                    self.spawn_heartbeat();
                    return;
                }
                _ => {
                    self.transition(SessionState::Error);
                    if self.schedule_reconnect().await {
                        self.transition(SessionState::Connecting);
                        continue;
                    } else {
                        self.transition(SessionState::Failed);
                        return;
                    }
                }
            }
        }
    }

    /// If reconnect is enabled and attempts remain, sleeps the backoff
    /// delay (cancellation-safe) and returns `true`. Returns `false` if
    /// reconnect is disabled, attempts are exhausted, or the session was
    /// cancelled mid-sleep — both callers interpret `false` as "give up".
    async fn schedule_reconnect(&self) -> bool {
        if !self.cfg.auto_reconnect {
            return false;
        }
        let attempts = self.attempt_count.load(Ordering::SeqCst);
        if attempts >= self.cfg.max_reconnect_attempts {
            return false;
        }

        let base = self.cfg.reconnect_interval_ms as f64;
        let delay_ms = (base * self.cfg.backoff_multiplier.powi(attempts as i32))
            .min(self.cfg.max_interval_ms as f64);
        self.attempt_count.fetch_add(1, Ordering::SeqCst);

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(delay_ms as u64)) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    fn spawn_heartbeat(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.heartbeat_loop().await });
        if let Ok(mut slot) = self.heartbeat_task.try_lock() {
            *slot = Some(handle);
        }
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let interval = Duration::from_millis(self.cfg.heartbeat_interval_ms);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.cancel.cancelled() => return,
            }
            if self.state() != SessionState::Connected {
                return;
            }
            let age_ms = (now_ns() - self.last_heartbeat_ns.load(Ordering::SeqCst)) / 1_000_000;
            if age_ms > 2 * self.cfg.heartbeat_interval_ms as i64 {
                self.on_transport_lost().await;
                return;
            }
        }
    }

    /// A successful heartbeat reply or inbound frame refreshes liveness.
    pub fn note_heartbeat(&self) {
        self.last_heartbeat_ns.store(now_ns(), Ordering::SeqCst);
    }

    /// `Connected -> Disconnected` on heartbeat miss or transport failure,
    /// then the same reconnect-or-failed logic as a failed `connect()`.
    async fn on_transport_lost(self: &Arc<Self>) {
        if self
            .reconnect_in_flight
            .swap(true, Ordering::AcqRel)
        {
            return; // another path already handling this (§8 Invariant 4).
        }
        self.transition(SessionState::Disconnected);
        self.transition(SessionState::Error);
        let scheduled = self.schedule_reconnect().await;
        self.reconnect_in_flight.store(false, Ordering::Release);
        if scheduled {
            self.transition(SessionState::Connecting);
            let this = Arc::clone(self);
            let handle = tokio::spawn(async move { this.connect_loop().await });
            if let Ok(mut slot) = self.connect_task.try_lock() {
                *slot = Some(handle);
            }
        } else {
            self.transition(SessionState::Failed);
        }
    }

    /// Cancellation-safe disconnect: cancels any pending reconnect timer
    /// under the same section that flips state, stops heartbeat/ingestion,
    /// closes the transport with a bounded wait, then force-aborts.
    pub async fn disconnect(self: &Arc<Self>) {
        if matches!(self.state(), SessionState::Disconnected) {
            return;
        }
        self.transition(SessionState::Disconnecting);
        self.cancel.cancel();

        if let Some(handle) = self.heartbeat_task.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.connect_task.lock().await.take() {
            handle.abort();
        }

        let close = async {
            self.transport.lock().await.close().await;
        };
        if tokio::time::timeout(Duration::from_secs(2), close).await.is_err() {
            tracing::warn!(device_id = %self.device_id, "transport close exceeded 2s bound, force-aborted");
        }

        self.transition(SessionState::Disconnected);
    }
}

fn now_ns() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct AlwaysFailTransport {
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for AlwaysFailTransport {
        async fn connect(&mut self, _address: &str, _port: u16, _timeout: Duration) -> Result<(), SessionError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(SessionError::Transport("refused".into()))
        }
        async fn send(&self, _bytes: &[u8]) -> bool {
            false
        }
        async fn recv_frame(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, SessionError> {
            Ok(None)
        }
        async fn close(&mut self) {}
    }

    struct AlwaysOkTransport;

    #[async_trait]
    impl Transport for AlwaysOkTransport {
        async fn connect(&mut self, _address: &str, _port: u16, _timeout: Duration) -> Result<(), SessionError> {
            Ok(())
        }
        async fn send(&self, _bytes: &[u8]) -> bool {
            true
        }
        async fn recv_frame(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, SessionError> {
            Ok(None)
        }
        async fn close(&mut self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_6_reconnect_backoff_then_failed() {
        let cfg = SessionConfig {
            auto_reconnect: true,
            reconnect_interval_ms: 100,
            max_reconnect_attempts: 4,
            backoff_multiplier: 2.0,
            max_interval_ms: 1_000,
            mock_mode: false,
            heartbeat_interval_ms: 5_000,
            connect_timeout_ms: 50,
            frame_read_timeout_ms: 30_000,
        };
        let attempts = Arc::new(AtomicUsize::new(0));
        let session = DeviceSession::new(
            "dev-1",
            "127.0.0.1",
            9000,
            cfg,
            Box::new(AlwaysFailTransport {
                attempts: attempts.clone(),
            }),
        );
        session.connect();

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        tokio::task::yield_now().await;

        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn connect_is_idempotent_once_connected() {
        let cfg = SessionConfig::default();
        let session = DeviceSession::new("dev-2", "127.0.0.1", 9001, cfg, Box::new(AlwaysOkTransport));
        session.connect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(session.state(), SessionState::Connected);
        session.connect(); // no-op
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn disconnect_cancels_pending_reconnect_timer() {
        let cfg = SessionConfig {
            auto_reconnect: true,
            reconnect_interval_ms: 10_000,
            max_reconnect_attempts: 10,
            backoff_multiplier: 1.5,
            max_interval_ms: 30_000,
            mock_mode: false,
            heartbeat_interval_ms: 5_000,
            connect_timeout_ms: 10,
            frame_read_timeout_ms: 30_000,
        };
        let session = DeviceSession::new(
            "dev-3",
            "127.0.0.1",
            9002,
            cfg,
            Box::new(AlwaysFailTransport {
                attempts: Arc::new(AtomicUsize::new(0)),
            }),
        );
        session.connect();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // First attempt failed and is now sleeping a 10s backoff.
        assert_eq!(session.state(), SessionState::Error);
        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Disconnected);
    }
}
