//! Multi-modal telemetry fusion and distribution runtime.
//!
//! Ingests heterogeneous time-stamped data (eye-tracker gaze, vehicle/
//! flight-sim telemetry, weather/traffic, human physiology), assesses
//! per-sample quality, cross-stream time-aligns samples, fuses them into
//! higher-level situational-awareness estimates, and distributes both raw
//! and fused outputs to external consumers.
//!
//! ## Architecture
//!
//! - [`session`] — device discovery handoff, connect/reconnect/heartbeat,
//!   framed-protocol transport (C8)
//! - [`discovery`] — mDNS-style device enumeration (C9)
//! - [`stream`] — per-source bounded buffer, quality gating, subscriber
//!   fan-out (C4)
//! - [`sync`] — cross-stream time alignment (C5)
//! - [`temporal`] — bounded time series, trend/anomaly/forecast (C3)
//! - [`fusion`] — trigger evaluation and fusion algorithms (C6, C7)
//! - [`quality`] — multi-dimensional per-sample confidence scoring (C2)
//! - [`distributor`] — typed topic bus to external subscribers (C10)
//! - [`batcher`] — latency-targeted adaptive batching (C11)
//! - [`clock`] — monotonic/wall clock and skew correction (C1)
//! - [`config`] — per-component configuration, loaded from TOML
//! - [`events`] — cross-component runtime events
//! - [`model`] — shared data model (samples, quality, fusion results)

pub mod batcher;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod distributor;
pub mod events;
pub mod fusion;
pub mod model;
pub mod quality;
pub mod session;
pub mod stream;
pub mod sync;
pub mod temporal;
