//! Discovery error taxonomy, §7.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy)]
pub enum DiscoveryError {
    /// `stop()` was called, or the window's owning task was shut down
    /// mid-scan. Callers must not treat this as failure (§7 `Cancelled`).
    #[error("cancelled")]
    Cancelled,
}
