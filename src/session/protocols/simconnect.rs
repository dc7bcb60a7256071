//! SimConnect (MSFS) binary framed protocol, §6.
//!
//! Header is 16 bytes little-endian `{size, version, id, index}` (see
//! [`super::super::BinaryFrameHeader`]). This adapter decodes
//! `SIMOBJECT_DATA` messages into the canonical [`TelemetryFrame`] and maps
//! a handful of client events (`THROTTLE_SET`, `GEAR_TOGGLE`, ...) to
//! `TRANSMIT_CLIENT_EVENT` frames.

use super::ProtocolAdapter;
use crate::model::{Command, ControlState, PerformanceState, Simulator, TelemetryFrame, VehicleState};
use crate::session::{BinaryFrameHeader, BINARY_HEADER_LEN};

/// SimConnect message ids, §6.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageId {
    Open = 0x01,
    Exception = 0x02,
    SimObjectData = 0x03,
    Quit = 0x04,
    MapClientEventToSimEvent = 0x05,
    TransmitClientEvent = 0x06,
    DataDefinition = 0x07,
    DataRequest = 0x08,
}

impl MessageId {
    fn from_u32(id: u32) -> Option<Self> {
        match id {
            0x01 => Some(Self::Open),
            0x02 => Some(Self::Exception),
            0x03 => Some(Self::SimObjectData),
            0x04 => Some(Self::Quit),
            0x05 => Some(Self::MapClientEventToSimEvent),
            0x06 => Some(Self::TransmitClientEvent),
            0x07 => Some(Self::DataDefinition),
            0x08 => Some(Self::DataRequest),
            _ => None,
        }
    }
}

/// `SIMOBJECT_DATA` payload layout this adapter expects: 13 little-endian
/// `f64`s in a fixed order (position, velocity, heading, throttle, brake,
/// gear, speed, fuel, engine rpm). A real client would get this shape from
/// its own `DATA_DEFINITION` registration; it is fixed here because this
/// crate owns neither side of that negotiation.
const SIMOBJECT_FIELD_COUNT: usize = 13;

fn read_f64_le(bytes: &[u8], idx: usize) -> Option<f64> {
    let start = idx * 8;
    bytes
        .get(start..start + 8)
        .and_then(|s| s.try_into().ok())
        .map(f64::from_le_bytes)
}

/// Client events this adapter maps, §6/§4.8 "Event mapping (command path)".
fn client_event_id(action: &str) -> Option<u32> {
    match action {
        "THROTTLE_SET" => Some(1),
        "GEAR_TOGGLE" => Some(2),
        "BRAKE_SET" => Some(3),
        "AILERON_SET" => Some(4),
        "ELEVATOR_SET" => Some(5),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct SimConnectAdapter {
    sequence: std::sync::atomic::AtomicU32,
}

impl SimConnectAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProtocolAdapter for SimConnectAdapter {
    fn decode_frame(&self, bytes: &[u8]) -> Option<TelemetryFrame> {
        let header = BinaryFrameHeader::parse(bytes)?;
        if MessageId::from_u32(header.id) != Some(MessageId::SimObjectData) {
            return None;
        }
        let payload = &bytes[BINARY_HEADER_LEN..];
        if payload.len() < SIMOBJECT_FIELD_COUNT * 8 {
            return None;
        }

        let get = |i: usize| read_f64_le(payload, i).unwrap_or(0.0);
        let vehicle = VehicleState {
            position: [get(0), get(1), get(2)],
            velocity: [get(3), get(4), get(5)],
            acceleration: None,
            rotation: [0.0, 0.0, 0.0, 1.0],
            heading_deg: get(6),
        };
        let controls = ControlState {
            throttle: get(7),
            brake: get(8),
            steering: 0.0,
            gear: get(9) as i32,
            custom: None,
        };
        let performance = PerformanceState {
            speed: get(10),
            fuel: get(11),
            engine_rpm: get(12),
            damage: None,
        };

        Some(TelemetryFrame {
            timestamp_ns: 0, // stamped by the caller from the session's clock
            sequence: self.sequence.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            source_id: "msfs".to_string(),
            simulator: Simulator::Msfs,
            vehicle,
            controls,
            performance,
        })
    }

    fn encode_command(&self, command: &Command) -> Option<Vec<u8>> {
        let event_id = client_event_id(&command.action)?;
        let value = command.parameters.values().next().copied().unwrap_or(0.0);

        let mut payload = Vec::with_capacity(12);
        payload.extend_from_slice(&event_id.to_le_bytes());
        payload.extend_from_slice(&(value as i32).to_le_bytes());

        let header = BinaryFrameHeader {
            size: (BINARY_HEADER_LEN + payload.len()) as u32,
            version: 1,
            id: MessageId::TransmitClientEvent as u32,
            index: 0,
        };
        let mut frame = header.encode().to_vec();
        frame.extend_from_slice(&payload);
        Some(frame)
    }
}
