//! Runtime configuration (A1).
//!
//! One typed, `serde`-deserializable struct per component (§6), loaded from
//! a single TOML document with one table per component. Loading order
//! mirrors the teacher pattern: `$TELEMETRY_RUNTIME_CONFIG` env var, else
//! `telemetry_runtime.toml` in the current directory, else built-in
//! defaults. Once loaded, configs are captured by value into component
//! state at construction — nothing reads a global afterward (§5).
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(RuntimeConfig::load());
//!
//! // Anywhere that legitimately needs the process-wide defaults:
//! let tolerance = config::get().sync.tolerance_ms;
//! ```

mod validation;

pub use validation::{
    known_config_keys, suggest_correction, validate_unknown_keys, ValidationWarning,
};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors loading or parsing the runtime config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Fusion Engine configuration, per §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub enable_temporal_analysis: bool,
    pub enable_quality_assessment: bool,
    pub fusion_thresholds: FusionThresholds,
    pub max_history: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            enable_temporal_analysis: true,
            enable_quality_assessment: true,
            fusion_thresholds: FusionThresholds::default(),
            max_history: 1000,
        }
    }
}

/// Per-fusion-type quality gates, §4.6.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionThresholds {
    pub human: f64,
    pub environmental: f64,
    pub situational: f64,
}

impl Default for FusionThresholds {
    fn default() -> Self {
        Self {
            human: 0.3,
            environmental: 0.2,
            situational: 0.0,
        }
    }
}

/// Stream Node configuration, per §6.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub sample_rate_hz: f64,
    pub buffer_size: usize,
    pub window_ms: i64,
    pub enable_memory_optimization: bool,
    pub enable_adaptive_batching: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 60.0,
            buffer_size: 1000,
            window_ms: 60_000,
            enable_memory_optimization: true,
            enable_adaptive_batching: false,
        }
    }
}

/// Device Session reconnect configuration, per §4.8/§6.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub auto_reconnect: bool,
    pub reconnect_interval_ms: u64,
    pub max_reconnect_attempts: u32,
    pub backoff_multiplier: f64,
    pub max_interval_ms: u64,
    pub mock_mode: bool,
    pub heartbeat_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub frame_read_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_interval_ms: 5_000,
            max_reconnect_attempts: 10,
            backoff_multiplier: 1.5,
            max_interval_ms: 30_000,
            mock_mode: false,
            heartbeat_interval_ms: 5_000,
            connect_timeout_ms: 5_000,
            frame_read_timeout_ms: 30_000,
        }
    }
}

/// Sync Engine strategy selector, per §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    HardwareTimestamp,
    SoftwareTimestamp,
    ArrivalTime,
}

impl Default for SyncStrategy {
    fn default() -> Self {
        SyncStrategy::HardwareTimestamp
    }
}

/// Sync Engine configuration, per §6.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub tolerance_ms: i64,
    pub strategy: SyncStrategy,
    pub buffer_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: 10,
            strategy: SyncStrategy::HardwareTimestamp,
            buffer_size: 100,
        }
    }
}

/// Distributor configuration, per §6.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributorConfig {
    pub max_clients: usize,
    pub compression: bool,
    pub per_subscriber_highwatermark: usize,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            max_clients: 256,
            compression: false,
            per_subscriber_highwatermark: 1024,
        }
    }
}

/// Adaptive Batcher configuration, derived from Stream config plus §4.11
/// tuning knobs not otherwise surfaced in §6.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    pub base_interval_ms: u64,
    pub max_batch_size: usize,
    pub target_latency_ms: f64,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 5,
            max_batch_size: 64,
            target_latency_ms: 20.0,
        }
    }
}

/// Discovery configuration, per §4.9.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub service_name: String,
    pub window_secs: u64,
    pub lost_after_secs: u64,
    pub mock_mode: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_name: "_pupil-mobile._tcp".to_string(),
            window_secs: 8,
            lost_after_secs: 60,
            mock_mode: true,
        }
    }
}

/// Top-level runtime config: one table per component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub fusion: FusionConfig,
    pub stream: StreamConfig,
    pub session: SessionConfig,
    pub sync: SyncConfig,
    pub distributor: DistributorConfig,
    pub batcher: BatcherConfig,
    pub discovery: DiscoveryConfig,
}

impl RuntimeConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let warnings = validate_unknown_keys(&raw);
        for w in &warnings {
            tracing::warn!(field = %w.field, suggestion = ?w.suggestion, "unrecognized config key");
        }
        let config: Self = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Loading order: `$TELEMETRY_RUNTIME_CONFIG` env var, then
    /// `telemetry_runtime.toml` in the current directory, then defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("TELEMETRY_RUNTIME_CONFIG") {
            let p = Path::new(&path);
            if p.exists() {
                match Self::load_from_file(p) {
                    Ok(config) => {
                        tracing::info!(path = %p.display(), "loaded runtime config from TELEMETRY_RUNTIME_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!(path = %p.display(), error = %e, "failed to load config from TELEMETRY_RUNTIME_CONFIG, falling back");
                    }
                }
            } else {
                tracing::warn!(path = %path, "TELEMETRY_RUNTIME_CONFIG points to non-existent file, falling back");
            }
        }

        let default_path = Path::new("telemetry_runtime.toml");
        if default_path.exists() {
            match Self::load_from_file(default_path) {
                Ok(config) => {
                    tracing::info!("loaded runtime config from ./telemetry_runtime.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse ./telemetry_runtime.toml, falling back to defaults");
                }
            }
        }

        tracing::debug!("no runtime config file found, using built-in defaults");
        Self::default()
    }
}

/// Global runtime configuration, initialized once at startup via
/// [`init`]. Component constructors should prefer taking an explicit
/// `RuntimeConfig`/sub-config by value; `get()` exists for the demo binary
/// and for code that legitimately has no natural place to thread config
/// through.
static RUNTIME_CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// Initialize the global runtime configuration. Must be called at most
/// once; subsequent calls are ignored with a warning.
pub fn init(config: RuntimeConfig) {
    if RUNTIME_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once — ignoring");
    }
}

/// Get the global runtime configuration.
///
/// Panics if [`init`] has not been called — a missing config is a startup
/// bug, not a recoverable condition.
pub fn get() -> &'static RuntimeConfig {
    RUNTIME_CONFIG
        .get()
        .expect("config::get() called before config::init() — this is a startup bug")
}

pub fn is_initialized() -> bool {
    RUNTIME_CONFIG.get().is_some()
}
