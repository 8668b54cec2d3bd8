//! Wire constants and control payloads for the broadcast protocol.

use serde::{Deserialize, Serialize};

/// Size of every frame header in bytes.
pub const HEADER_LENGTH: usize = 16;

/// Sequence number carried by every frame in this protocol generation.
pub const SEQUENCE: u32 = 1;

/// Client version string announced in the verify handshake.
pub const CLIENT_VERSION: &str = "1.17.0";

/// Platform string announced in the verify handshake.
pub const PLATFORM: &str = "web";

/// Protocol version requested in the handshake (zlib-compressed batches).
pub const REQUESTED_PROTOVER: u16 = 2;

/// Frame operation codes (header offset 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Operation {
    /// Client to server keepalive.
    HeartbeatRequest = 2,
    /// Server keepalive reply, carries the popularity counter.
    HeartbeatReply = 3,
    /// Server push carrying a JSON command.
    Message = 5,
    /// Client authentication request.
    VerifyRequest = 7,
    /// Server authentication reply.
    VerifyReply = 8,
}

impl Operation {
    /// Returns the wire value.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Maps a wire value to a known operation.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(Self::HeartbeatRequest),
            3 => Some(Self::HeartbeatReply),
            5 => Some(Self::Message),
            7 => Some(Self::VerifyRequest),
            8 => Some(Self::VerifyReply),
            _ => None,
        }
    }
}

/// Payload encodings (header offset 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ProtocolVersion {
    /// Plain JSON payload.
    PlainJson = 0,
    /// Plain payload, used for heartbeat and control frames.
    Plain = 1,
    /// Payload is a zlib-compressed batch of inner frames.
    Compressed = 2,
}

impl ProtocolVersion {
    /// Returns the wire value.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Maps a wire value to a known version.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::PlainJson),
            1 => Some(Self::Plain),
            2 => Some(Self::Compressed),
            _ => None,
        }
    }
}

/// JSON body of the verify request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPayload {
    /// Always 0 for anonymous viewers.
    pub uid: u64,
    /// Room identifier.
    pub roomid: u64,
    /// Requested payload encoding.
    pub protover: u16,
    /// Client platform.
    pub platform: String,
    /// Client version.
    pub clientver: String,
    /// Connection type, always 2.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Auth token from the credential lookup.
    pub key: String,
}

impl VerifyPayload {
    /// Builds the payload for an anonymous viewer of `room_id`.
    pub fn new(token: impl Into<String>, room_id: u64) -> Self {
        Self {
            uid: 0,
            roomid: room_id,
            protover: REQUESTED_PROTOVER,
            platform: PLATFORM.to_string(),
            clientver: CLIENT_VERSION.to_string(),
            kind: 2,
            key: token.into(),
        }
    }
}

/// JSON body of the verify reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReply {
    /// 0 on success.
    pub code: i64,
}
