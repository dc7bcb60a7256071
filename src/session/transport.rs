//! Transport abstraction and framing, §4.8/§6.
//!
//! A transport provides exactly `send(bytes) -> bool` and delivers whole
//! frames via [`Transport::recv_frame`]; everything above it (simulator
//! adapters, mock generators) only ever sees bytes in and bytes out.

use super::error::SessionError;
use async_trait::async_trait;
use std::time::Duration;

/// Frames larger than this abort the session with [`SessionError::FrameTooLarge`].
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&mut self, address: &str, port: u16, timeout: Duration) -> Result<(), SessionError>;

    /// Best-effort send; `false` does not necessarily mean the connection
    /// is dead (matches the framed-protocol contract's `send(bytes)→bool`).
    async fn send(&self, bytes: &[u8]) -> bool;

    /// Returns the next whole frame, or `None` on a clean remote close.
    async fn recv_frame(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, SessionError>;

    async fn close(&mut self);
}

/// Splits a buffer of accumulated bytes into newline-delimited JSON frames,
/// returning the frames found and the unconsumed remainder. Used by the
/// BeamNG adapter (§6).
pub fn split_line_delimited(buf: &[u8]) -> (Vec<Vec<u8>>, Vec<u8>) {
    let mut frames = Vec::new();
    let mut start = 0;
    for (i, b) in buf.iter().enumerate() {
        if *b == b'\n' {
            frames.push(buf[start..i].to_vec());
            start = i + 1;
        }
    }
    (frames, buf[start..].to_vec())
}

/// SimConnect-style 16-byte little-endian header, §6: `{size, version, id,
/// index}`, each a `u32`. `size` includes the header itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryFrameHeader {
    pub size: u32,
    pub version: u32,
    pub id: u32,
    pub index: u32,
}

pub const BINARY_HEADER_LEN: usize = 16;

impl BinaryFrameHeader {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < BINARY_HEADER_LEN {
            return None;
        }
        let size = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        let version = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
        let id = u32::from_le_bytes(bytes[8..12].try_into().ok()?);
        let index = u32::from_le_bytes(bytes[12..16].try_into().ok()?);
        Some(Self { size, version, id, index })
    }

    pub fn encode(&self) -> [u8; BINARY_HEADER_LEN] {
        let mut out = [0u8; BINARY_HEADER_LEN];
        out[0..4].copy_from_slice(&self.size.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.id.to_le_bytes());
        out[12..16].copy_from_slice(&self.index.to_le_bytes());
        out
    }
}

/// Given a growing receive buffer, attempts to extract one complete binary
/// frame (16-byte header + `size - 16` bytes of payload). Returns
/// `Err(FrameTooLarge)` if the declared size exceeds [`MAX_FRAME_BYTES`].
pub fn try_extract_binary_frame(buf: &[u8]) -> Result<Option<(BinaryFrameHeader, Vec<u8>, usize)>, SessionError> {
    let Some(header) = BinaryFrameHeader::parse(buf) else {
        return Ok(None);
    };
    let total = header.size as usize;
    if total > MAX_FRAME_BYTES {
        return Err(SessionError::FrameTooLarge { size: total });
    }
    if buf.len() < total {
        return Ok(None);
    }
    let payload = buf[BINARY_HEADER_LEN..total].to_vec();
    Ok(Some((header, payload, total)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_line_delimited_frames() {
        let (frames, rest) = split_line_delimited(b"{\"a\":1}\n{\"b\":2}\npartial");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], b"{\"a\":1}");
        assert_eq!(rest, b"partial");
    }

    #[test]
    fn binary_header_round_trips() {
        let header = BinaryFrameHeader {
            size: 100,
            version: 1,
            id: 0x01,
            index: 0,
        };
        let encoded = header.encode();
        let decoded = BinaryFrameHeader::parse(&encoded).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn oversize_binary_frame_is_rejected() {
        let header = BinaryFrameHeader {
            size: (MAX_FRAME_BYTES + 1) as u32,
            version: 1,
            id: 1,
            index: 0,
        };
        let buf = header.encode();
        let err = try_extract_binary_frame(&buf).unwrap_err();
        assert!(matches!(err, SessionError::FrameTooLarge { .. }));
    }

    #[test]
    fn incomplete_frame_returns_none() {
        let header = BinaryFrameHeader {
            size: 100,
            version: 1,
            id: 1,
            index: 0,
        };
        let mut buf = header.encode().to_vec();
        buf.extend_from_slice(&[0u8; 10]); // far short of 100 total bytes
        assert!(try_extract_binary_frame(&buf).unwrap().is_none());
    }
}
