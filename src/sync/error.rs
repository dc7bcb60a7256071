//! Sync Engine error taxonomy, §7.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SyncError {
    #[error("stream '{0}' is not registered with this sync engine")]
    UnknownStream(String),
}
