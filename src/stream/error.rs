//! Stream Node error taxonomy, §7.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum StreamError {
    /// A processor stage rejected or failed to transform the sample.
    /// Aborts the pipeline for that sample only; the node stays healthy
    /// unless the failure rate crosses the degraded threshold.
    #[error("processor stage '{stage}' failed: {message}")]
    Processing { stage: &'static str, message: String },

    /// Ingest rejected outright (missing timestamp, non-finite payload
    /// field required for completeness/consistency checks).
    #[error("validation failed: {0}")]
    Validation(String),
}
