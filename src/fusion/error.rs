//! Fusion Engine error taxonomy, §7.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum FusionError {
    /// An algorithm invariant was violated (e.g. a required contributor
    /// was absent after a trigger condition claimed it was present). In
    /// production this aborts only the fire in progress; engine state is
    /// left unchanged.
    #[error("fusion algorithm '{fusion_type}' invariant violated: {message}")]
    Internal {
        fusion_type: &'static str,
        message: String,
    },
}
