//! Frame codec and message dispatch for the live-chat broadcast protocol.
//!
//! # Protocol Overview
//!
//! The server speaks a binary protocol over WebSocket. Every frame carries a
//! 16-byte big-endian header followed by its payload:
//! - verify (op 7) and heartbeat (op 2) requests go client to server
//! - verify replies (op 8), heartbeat replies (op 3) and messages (op 5)
//!   come back, the latter usually as a zlib-compressed batch
//!
//! [`decode_frames`] splits one socket read into sub-frames, and
//! [`MessageDispatcher`] turns each sub-frame into a [`Dispatch`].
//!
//! # Example
//!
//! ```rust
//! use livechat_protocol::{Dispatch, MessageDispatcher, decode_frames, encode_heartbeat_frame};
//!
//! let dispatcher = MessageDispatcher::default();
//! for frame in decode_frames(&encode_heartbeat_frame()).unwrap() {
//!     let dispatch = dispatcher.dispatch(&frame.unwrap()).unwrap();
//!     assert!(matches!(dispatch, Dispatch::Ignored { operation: 2, .. }));
//! }
//! ```

mod dispatch;
mod error;
mod framing;
mod types;

pub use dispatch::{CMD_DANMU, CMD_GIFT, CMD_SUPER_CHAT, Dispatch, MessageDispatcher, UnknownCommandPolicy};
pub use error::{ProtocolError, ProtocolResult};
pub use framing::{
    FrameHeader, HEARTBEAT_FRAME, SubFrame, SubFrames, decode_frames, encode_frame,
    encode_heartbeat_frame, encode_verify_frame,
};
pub use types::{
    CLIENT_VERSION, HEADER_LENGTH, Operation, PLATFORM, ProtocolVersion, REQUESTED_PROTOVER,
    SEQUENCE, VerifyPayload, VerifyReply,
};

/// Maximum size of an inflated batch (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
