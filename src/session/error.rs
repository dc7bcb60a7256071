//! Device Session error taxonomy, §7.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// Connect/read/write/parse failure. Recoverable via reconnect.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed frame, oversize, or version mismatch. Fatal for the
    /// session — no reconnect is scheduled.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A frame exceeded the 1 MiB framing limit (§4.8).
    #[error("frame-too-large: {size} bytes exceeds the 1 MiB limit")]
    FrameTooLarge { size: usize },

    /// Heartbeat miss or connect deadline exceeded. Triggers reconnect.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Shutdown in progress; callers must not treat this as failure.
    #[error("cancelled")]
    Cancelled,
}

impl SessionError {
    /// Whether this error permits a reconnect attempt (§7: `ProtocolError`
    /// is fatal for the session; everything else recoverable is retried by
    /// the state machine under its own reconnect policy).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SessionError::Protocol(_) | SessionError::FrameTooLarge { .. })
    }
}
