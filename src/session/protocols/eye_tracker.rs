//! Eye-tracker transport, §6: HTTP control API on port 8080 plus WebSocket
//! streaming on `/websocket`. Unlike the simulator adapters this protocol
//! produces [`Sample`]s (gaze/behavioral data), not [`TelemetryFrame`]s, so
//! it does not implement [`super::ProtocolAdapter`] — its shape is a WS
//! message decoder plus a small HTTP command-path mapping.

use crate::model::{Command, CommandResult, EyeState, GazePayload, PayloadData, Sample, SampleType, SourceDomain, SourceKey};
use serde::Deserialize;

/// One inbound WebSocket message, §6: `{topic, data}`.
#[derive(Debug, Deserialize)]
pub struct WsMessage {
    pub topic: WsTopic,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WsTopic {
    Gaze,
    Video,
    Imu,
    Events,
}

#[derive(Debug, Deserialize)]
struct GazeWire {
    timestamp_ns: i64,
    x: f64,
    y: f64,
    confidence: f64,
    worn: bool,
    #[serde(default)]
    eye_states: Option<EyeStatesWire>,
}

#[derive(Debug, Deserialize)]
struct EyeStatesWire {
    left: Option<EyeStateWire>,
    right: Option<EyeStateWire>,
}

#[derive(Debug, Deserialize)]
struct EyeStateWire {
    center: CenterWire,
    #[serde(rename = "pupilDiameter_mm")]
    pupil_diameter_mm: f64,
}

#[derive(Debug, Deserialize)]
struct CenterWire {
    x: f64,
    y: f64,
}

fn eye_state(wire: Option<EyeStateWire>) -> Option<EyeState> {
    wire.map(|w| EyeState {
        center_x: w.center.x,
        center_y: w.center.y,
        pupil_diameter_mm: w.pupil_diameter_mm,
    })
}

/// Decodes one `gaze` topic WS message into a [`Sample`]. Other topics
/// (`video`, `imu`, `events`) carry no fields this runtime's data model
/// represents and are ignored at this layer — `None`.
pub fn decode_ws_message(message: &WsMessage, ingest_time_ns: i64) -> Option<Sample> {
    if message.topic != WsTopic::Gaze {
        return None;
    }
    let gaze: GazeWire = serde_json::from_value(message.data.clone()).ok()?;
    let (left, right) = match gaze.eye_states {
        Some(states) => (eye_state(states.left), eye_state(states.right)),
        None => (None, None),
    };

    Some(Sample {
        key: SourceKey::new(SourceDomain::Human, SampleType::Behavioral),
        timestamp_ns: gaze.timestamp_ns,
        payload: PayloadData::Gaze(GazePayload {
            x: gaze.x,
            y: gaze.y,
            confidence: gaze.confidence,
            worn: gaze.worn,
            left_eye: left,
            right_eye: right,
        }),
        ingest_time_ns,
    })
}

/// HTTP control endpoints this runtime maps a [`Command`] onto, §6: `POST
/// /recording/start|stop`, `POST /calibration/start|stop`. `GET /status`
/// has no command-path equivalent (it is a query, not an action).
pub fn command_to_path(command: &Command) -> Option<&'static str> {
    match command.action.as_str() {
        "RECORDING_START" => Some("/recording/start"),
        "RECORDING_STOP" => Some("/recording/stop"),
        "CALIBRATION_START" => Some("/calibration/start"),
        "CALIBRATION_STOP" => Some("/calibration/stop"),
        _ => None,
    }
}

pub fn unsupported(action: &str) -> CommandResult {
    CommandResult::unsupported(action)
}
