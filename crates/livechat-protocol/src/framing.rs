//! Binary frame codec.
//!
//! Every frame starts with a 16-byte big-endian header:
//!
//! ```text
//! +------------------+-------------+---------------+---------------+---------------+
//! | total_length (4) | header (2)  | protover (2)  | operation (4) | sequence (4)  |
//! +------------------+-------------+---------------+---------------+---------------+
//! | payload (total_length - 16 bytes)                                              |
//! +--------------------------------------------------------------------------------+
//! ```
//!
//! A single socket read carries either one frame or, when the outer
//! `protover` is 2, a zlib-compressed batch of concatenated inner frames.
//!
//! # Example
//!
//! ```rust
//! use livechat_protocol::{decode_frames, encode_verify_frame, Operation};
//!
//! let bytes = encode_verify_frame("token", 42).unwrap();
//! let frames: Vec<_> = decode_frames(&bytes).unwrap().collect();
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].as_ref().unwrap().operation(), Operation::VerifyRequest.code());
//! ```

use std::io::Read;
use std::iter::FusedIterator;

use flate2::read::ZlibDecoder;

use crate::MAX_FRAME_SIZE;
use crate::error::{ProtocolError, ProtocolResult};
use crate::types::{HEADER_LENGTH, Operation, ProtocolVersion, SEQUENCE, VerifyPayload};

/// The constant heartbeat request frame.
pub const HEARTBEAT_FRAME: [u8; HEADER_LENGTH] = [
    0, 0, 0, 16, // total length
    0, 16, // header length
    0, 1, // protover: plain
    0, 0, 0, 2, // operation: heartbeat request
    0, 0, 0, 1, // sequence
];

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Header plus payload byte count.
    pub total_length: u32,
    /// Always 16 on well-formed frames.
    pub header_length: u16,
    /// Payload encoding.
    pub protocol_version: u16,
    /// Operation code.
    pub operation: u32,
    /// Sequence number.
    pub sequence: u32,
}

impl FrameHeader {
    /// Creates a header for a payload of `payload_len` bytes.
    pub fn new(protocol_version: ProtocolVersion, operation: Operation, payload_len: usize) -> Self {
        Self {
            total_length: (HEADER_LENGTH + payload_len) as u32,
            header_length: HEADER_LENGTH as u16,
            protocol_version: protocol_version.code(),
            operation: operation.code(),
            sequence: SEQUENCE,
        }
    }

    /// Parses the first 16 bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.len() < HEADER_LENGTH {
            return Err(ProtocolError::Truncated {
                needed: HEADER_LENGTH,
                available: bytes.len(),
            });
        }

        Ok(Self {
            total_length: be_u32(bytes, 0),
            header_length: be_u16(bytes, 4),
            protocol_version: be_u16(bytes, 6),
            operation: be_u32(bytes, 8),
            sequence: be_u32(bytes, 12),
        })
    }

    /// Appends the 16 header bytes to `buffer`.
    pub fn write(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.total_length.to_be_bytes());
        buffer.extend_from_slice(&self.header_length.to_be_bytes());
        buffer.extend_from_slice(&self.protocol_version.to_be_bytes());
        buffer.extend_from_slice(&self.operation.to_be_bytes());
        buffer.extend_from_slice(&self.sequence.to_be_bytes());
    }

    /// Returns true if the payload is a compressed batch.
    pub fn is_compressed(&self) -> bool {
        self.protocol_version == ProtocolVersion::Compressed.code()
    }
}

fn be_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

fn be_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// One self-contained frame from a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubFrame {
    /// The frame header.
    pub header: FrameHeader,
    /// Payload bytes (without the header).
    pub payload: Vec<u8>,
}

impl SubFrame {
    /// Returns the operation code.
    pub fn operation(&self) -> u32 {
        self.header.operation
    }
}

/// Encodes a frame with the given header fields and payload.
pub fn encode_frame(
    protocol_version: ProtocolVersion,
    operation: Operation,
    payload: &[u8],
) -> Vec<u8> {
    let header = FrameHeader::new(protocol_version, operation, payload.len());
    let mut buffer = Vec::with_capacity(HEADER_LENGTH + payload.len());
    header.write(&mut buffer);
    buffer.extend_from_slice(payload);
    buffer
}

/// Encodes the verify (authentication) request for `room_id`.
pub fn encode_verify_frame(token: &str, room_id: u64) -> ProtocolResult<Vec<u8>> {
    let payload = serde_json::to_vec(&VerifyPayload::new(token, room_id))?;
    Ok(encode_frame(
        ProtocolVersion::Plain,
        Operation::VerifyRequest,
        &payload,
    ))
}

/// Returns the heartbeat request frame.
pub fn encode_heartbeat_frame() -> [u8; HEADER_LENGTH] {
    HEARTBEAT_FRAME
}

/// Decodes one socket read into its sub-frames.
///
/// Fails as a whole only when the read is shorter than a header or the
/// compressed batch cannot be inflated. Errors inside the batch are yielded
/// by the returned iterator.
pub fn decode_frames(raw: &[u8]) -> ProtocolResult<SubFrames> {
    let outer = FrameHeader::parse(raw)?;

    let batch = if outer.is_compressed() {
        inflate(&raw[HEADER_LENGTH..])?
    } else {
        raw.to_vec()
    };

    Ok(SubFrames {
        batch,
        offset: 0,
        done: false,
    })
}

fn inflate(compressed: &[u8]) -> ProtocolResult<Vec<u8>> {
    let mut batch = Vec::with_capacity((compressed.len() * 4).min(MAX_FRAME_SIZE));
    ZlibDecoder::new(compressed)
        .take(MAX_FRAME_SIZE as u64 + 1)
        .read_to_end(&mut batch)
        .map_err(ProtocolError::Decompress)?;

    if batch.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(batch)
}

/// Iterator over the sub-frames of one decoded batch.
///
/// Yields sub-frames in wire order. After a length error the iterator
/// yields that error once and then ends.
#[derive(Debug)]
pub struct SubFrames {
    batch: Vec<u8>,
    offset: usize,
    done: bool,
}

impl SubFrames {
    fn abort(&mut self, error: ProtocolError) -> Option<ProtocolResult<SubFrame>> {
        self.done = true;
        Some(Err(error))
    }
}

impl Iterator for SubFrames {
    type Item = ProtocolResult<SubFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.batch.len() {
            return None;
        }

        let rest = &self.batch[self.offset..];
        let header = match FrameHeader::parse(rest) {
            Ok(header) => header,
            Err(e) => return self.abort(e),
        };

        let length = header.total_length as usize;
        if length < HEADER_LENGTH {
            return self.abort(ProtocolError::BadLength {
                length: header.total_length,
            });
        }
        if length > rest.len() {
            let error = ProtocolError::Overrun {
                offset: self.offset,
                length,
                available: rest.len(),
            };
            return self.abort(error);
        }

        let payload = rest[HEADER_LENGTH..length].to_vec();
        self.offset += length;

        if header.header_length as usize != HEADER_LENGTH {
            return Some(Err(ProtocolError::BadHeaderLength(header.header_length)));
        }

        Some(Ok(SubFrame { header, payload }))
    }
}

impl FusedIterator for SubFrames {}
