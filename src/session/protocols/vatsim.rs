//! VATSIM HTTPS pull protocol, §6: `https://data.vatsim.net/v3/vatsim-data.json`
//! polled at ~0.2 Hz. Read-only network data — there is no command
//! mapping for a session built on this adapter.

use super::ProtocolAdapter;
use crate::model::{Command, ControlState, PerformanceState, Simulator, TelemetryFrame, VehicleState};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct VatsimSnapshot {
    #[serde(default)]
    pilots: Vec<VatsimPilot>,
}

#[derive(Debug, Deserialize)]
struct VatsimPilot {
    callsign: String,
    latitude: f64,
    longitude: f64,
    altitude: f64,
    groundspeed: f64,
    heading: f64,
}

/// Decodes the pilot matching `callsign` out of a full VATSIM v3 data
/// snapshot. One adapter instance tracks one callsign, matching the
/// one-vehicle-per-session shape the rest of the Device Session layer
/// assumes.
pub struct VatsimAdapter {
    callsign: String,
    sequence: std::sync::atomic::AtomicU32,
}

impl VatsimAdapter {
    pub fn new(callsign: impl Into<String>) -> Self {
        Self {
            callsign: callsign.into(),
            sequence: std::sync::atomic::AtomicU32::new(0),
        }
    }
}

impl ProtocolAdapter for VatsimAdapter {
    fn decode_frame(&self, bytes: &[u8]) -> Option<TelemetryFrame> {
        let snapshot: VatsimSnapshot = serde_json::from_slice(bytes).ok()?;
        let pilot = snapshot
            .pilots
            .into_iter()
            .find(|p| p.callsign.eq_ignore_ascii_case(&self.callsign))?;

        Some(TelemetryFrame {
            timestamp_ns: 0,
            sequence: self.sequence.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            source_id: format!("vatsim:{}", pilot.callsign),
            simulator: Simulator::Vatsim,
            vehicle: VehicleState {
                position: [pilot.longitude, pilot.latitude, pilot.altitude],
                velocity: [0.0, 0.0, 0.0],
                acceleration: None,
                rotation: [0.0, 0.0, 0.0, 1.0],
                heading_deg: pilot.heading,
            },
            controls: ControlState::default(),
            performance: PerformanceState {
                speed: pilot.groundspeed,
                fuel: 0.0,
                engine_rpm: 0.0,
                damage: None,
            },
        })
    }

    /// VATSIM is a read-only network feed in this runtime's scope; no
    /// command mapping is provided.
    fn encode_command(&self, _command: &Command) -> Option<Vec<u8>> {
        None
    }
}
