//! Adaptive Batcher error taxonomy, §7.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BatcherError {
    /// `submit` called after the batcher's queue was dropped (the `run`
    /// loop exited or was never started).
    #[error("batcher channel closed")]
    Closed,
}
