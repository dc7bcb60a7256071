//! Per-simulator protocol adapters, §6.
//!
//! Scope is the abstraction level the spec actually asks for: message type
//! enums, header/field shapes, and the conversion to/from the canonical
//! [`crate::model::TelemetryFrame`] and [`crate::model::Command`]. Full
//! byte-level socket I/O (actual SimConnect named pipes, a real UDP socket
//! for X-Plane, an HTTP client for VATSIM) lives outside this crate's scope
//! and is represented here only by the `Transport` trait in the parent
//! module.

pub mod beamng;
pub mod eye_tracker;
pub mod simconnect;
pub mod vatsim;
pub mod xplane;

use crate::model::{Command, CommandResult, TelemetryFrame};

/// Converts inbound protocol bytes to/from the canonical frame and
/// translates outbound commands to protocol bytes. One implementation per
/// simulator link.
pub trait ProtocolAdapter: Send + Sync {
    /// Parses one already-framed message into a canonical frame. `None`
    /// means the message carried no telemetry (e.g. a SimConnect `OPEN`
    /// acknowledgement, a BeamNG `Hello`).
    fn decode_frame(&self, bytes: &[u8]) -> Option<TelemetryFrame>;

    /// Maps a [`Command`] to the bytes of one or more protocol frames, or
    /// `None` if this adapter has no mapping for `command.action`.
    fn encode_command(&self, command: &Command) -> Option<Vec<u8>>;

    /// The `CommandResult` to report when `encode_command` returns `None`.
    fn unsupported(&self) -> CommandResult {
        CommandResult {
            success: false,
            code: Some(crate::model::UNSUPPORTED_COMMAND.to_string()),
            message: Some("no mapping for this action on this protocol".to_string()),
        }
    }
}
