//! X-Plane UDP data-ref protocol, §6 (port 49000, pulled at ≤60 Hz).
//!
//! X-Plane's `DATA` packet is a 5-byte header (`"DATA0"`, i.e. `DATA` +
//! a trailing NUL) followed by one or more 36-byte records: a 4-byte
//! little-endian group index, then eight little-endian `f32` values. This
//! adapter reads the groups the spec's canonical frame needs and ignores
//! the rest; it has no outbound command mapping (X-Plane is pull-only in
//! this runtime's scope).

use super::ProtocolAdapter;
use crate::model::{Command, ControlState, PerformanceState, Simulator, TelemetryFrame, VehicleState};

const HEADER: &[u8] = b"DATA0";
const RECORD_LEN: usize = 36;

/// Data-ref groups this adapter understands (X-Plane's own group
/// numbering, as selected by the client's data-ref subscription).
const GROUP_SPEEDS: i32 = 3;
const GROUP_POSITION: i32 = 17;
const GROUP_ENGINE: i32 = 37;

fn read_f32_le(bytes: &[u8], idx: usize) -> f32 {
    bytes
        .get(idx * 4..idx * 4 + 4)
        .and_then(|s| s.try_into().ok())
        .map(f32::from_le_bytes)
        .unwrap_or(0.0)
}

#[derive(Debug, Default)]
pub struct XPlaneAdapter {
    sequence: std::sync::atomic::AtomicU32,
}

impl XPlaneAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProtocolAdapter for XPlaneAdapter {
    fn decode_frame(&self, bytes: &[u8]) -> Option<TelemetryFrame> {
        if bytes.len() < HEADER.len() || &bytes[..4] != b"DATA" {
            return None;
        }
        let records = &bytes[HEADER.len()..];
        if records.is_empty() {
            return None;
        }

        let mut vehicle = VehicleState::default();
        let mut performance = PerformanceState::default();
        let mut saw_any = false;

        for chunk in records.chunks(RECORD_LEN) {
            if chunk.len() < RECORD_LEN {
                break;
            }
            let group = i32::from_le_bytes(chunk[0..4].try_into().ok()?);
            let values = &chunk[4..];
            match group {
                GROUP_SPEEDS => {
                    performance.speed = read_f32_le(values, 0) as f64;
                    saw_any = true;
                }
                GROUP_POSITION => {
                    vehicle.position = [
                        read_f32_le(values, 0) as f64,
                        read_f32_le(values, 1) as f64,
                        read_f32_le(values, 2) as f64,
                    ];
                    vehicle.heading_deg = read_f32_le(values, 5) as f64;
                    saw_any = true;
                }
                GROUP_ENGINE => {
                    performance.engine_rpm = read_f32_le(values, 0) as f64;
                    saw_any = true;
                }
                _ => {}
            }
        }

        if !saw_any {
            return None;
        }

        Some(TelemetryFrame {
            timestamp_ns: 0,
            sequence: self.sequence.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            source_id: "xplane".to_string(),
            simulator: Simulator::Xplane,
            vehicle,
            controls: ControlState::default(),
            performance,
        })
    }

    /// X-Plane is treated as pull-only in this runtime's scope (§6); no
    /// command mapping is provided.
    fn encode_command(&self, _command: &Command) -> Option<Vec<u8>> {
        None
    }
}
