//! BeamNG.drive newline-delimited JSON protocol, §6.
//!
//! Message types: `Hello`, `DataRequest`, `DataResponse`, `ControlInput`,
//! `VehicleReset`, `LuaExecute`, `Error`. Only `DataResponse` carries
//! telemetry; `ControlInput` is this adapter's only outbound command
//! mapping (throttle/brake/steering/clutch/gear/parkingbrake).

use super::ProtocolAdapter;
use crate::model::{Command, ControlState, PerformanceState, Simulator, TelemetryFrame, VehicleState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BeamNgMessage {
    Hello { version: String },
    DataRequest,
    DataResponse(DataResponsePayload),
    ControlInput(ControlInputPayload),
    VehicleReset,
    LuaExecute { code: String },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponsePayload {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    #[serde(default)]
    pub acceleration: Option<[f64; 3]>,
    pub heading_deg: f64,
    pub speed: f64,
    pub fuel: f64,
    pub engine_rpm: f64,
    #[serde(default)]
    pub damage: Option<f64>,
}

/// Control-input fields, §6: `{throttle, brake, steering, clutch, gear,
/// parkingbrake}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControlInputPayload {
    pub throttle: f64,
    pub brake: f64,
    pub steering: f64,
    pub clutch: f64,
    pub gear: i32,
    pub parkingbrake: bool,
}

#[derive(Debug, Default)]
pub struct BeamNgAdapter {
    sequence: std::sync::atomic::AtomicU32,
}

impl BeamNgAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProtocolAdapter for BeamNgAdapter {
    fn decode_frame(&self, bytes: &[u8]) -> Option<TelemetryFrame> {
        let message: BeamNgMessage = serde_json::from_slice(bytes).ok()?;
        let BeamNgMessage::DataResponse(data) = message else {
            return None;
        };

        Some(TelemetryFrame {
            timestamp_ns: 0,
            sequence: self.sequence.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            source_id: "beamng".to_string(),
            simulator: Simulator::Beamng,
            vehicle: VehicleState {
                position: data.position,
                velocity: data.velocity,
                acceleration: data.acceleration,
                rotation: [0.0, 0.0, 0.0, 1.0],
                heading_deg: data.heading_deg,
            },
            controls: ControlState::default(),
            performance: PerformanceState {
                speed: data.speed,
                fuel: data.fuel,
                engine_rpm: data.engine_rpm,
                damage: data.damage,
            },
        })
    }

    fn encode_command(&self, command: &Command) -> Option<Vec<u8>> {
        if command.action != "CONTROL_INPUT" {
            return None;
        }
        let get = |name: &str, default: f64| command.parameters.get(name).copied().unwrap_or(default);
        let message = BeamNgMessage::ControlInput(ControlInputPayload {
            throttle: get("throttle", 0.0).clamp(0.0, 1.0),
            brake: get("brake", 0.0).clamp(0.0, 1.0),
            steering: get("steering", 0.0).clamp(-1.0, 1.0),
            clutch: get("clutch", 0.0).clamp(0.0, 1.0),
            gear: get("gear", 0.0) as i32,
            parkingbrake: get("parkingbrake", 0.0) != 0.0,
        });
        let mut bytes = serde_json::to_vec(&message).ok()?;
        bytes.push(b'\n');
        Some(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn decodes_data_response_into_canonical_frame() {
        let adapter = BeamNgAdapter::new();
        let json = serde_json::to_vec(&BeamNgMessage::DataResponse(DataResponsePayload {
            position: [1.0, 2.0, 3.0],
            velocity: [4.0, 5.0, 6.0],
            acceleration: None,
            heading_deg: 90.0,
            speed: 25.0,
            fuel: 0.5,
            engine_rpm: 3000.0,
            damage: Some(0.1),
        }))
        .unwrap();
        let frame = adapter.decode_frame(&json).unwrap();
        assert_eq!(frame.simulator, Simulator::Beamng);
        assert_eq!(frame.vehicle.position, [1.0, 2.0, 3.0]);
        assert_eq!(frame.performance.damage, Some(0.1));
    }

    #[test]
    fn hello_message_has_no_telemetry() {
        let adapter = BeamNgAdapter::new();
        let json = serde_json::to_vec(&BeamNgMessage::Hello {
            version: "0.29".to_string(),
        })
        .unwrap();
        assert!(adapter.decode_frame(&json).is_none());
    }

    #[test]
    fn encodes_control_input_command_clamped_to_range() {
        let adapter = BeamNgAdapter::new();
        let mut parameters = BTreeMap::new();
        parameters.insert("throttle".to_string(), 1.5); // out of range, must clamp
        parameters.insert("steering".to_string(), -2.0);
        let command = Command {
            action: "CONTROL_INPUT".to_string(),
            parameters,
        };
        let bytes = adapter.encode_command(&command).unwrap();
        let decoded: BeamNgMessage = serde_json::from_slice(&bytes[..bytes.len() - 1]).unwrap();
        match decoded {
            BeamNgMessage::ControlInput(input) => {
                assert!((input.throttle - 1.0).abs() < 1e-9);
                assert!((input.steering + 1.0).abs() < 1e-9);
            }
            other => panic!("expected ControlInput, got {other:?}"),
        }
    }
}
