//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding or dispatching frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Fewer bytes than a header needs.
    #[error("truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// Declared total length is smaller than the header itself.
    #[error("invalid frame length {length} (header alone is 16 bytes)")]
    BadLength { length: u32 },

    /// Declared total length reads past the end of the batch.
    #[error("frame at offset {offset} declares {length} bytes but only {available} remain")]
    Overrun {
        offset: usize,
        length: usize,
        available: usize,
    },

    /// Header length field is not 16.
    #[error("unexpected header length {0}")]
    BadHeaderLength(u16),

    /// Inflated batch exceeds the size limit.
    #[error("frame too large: more than {max} bytes")]
    FrameTooLarge { max: usize },

    /// zlib inflate failed.
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    /// Payload is not valid JSON.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON is valid but a required field is missing or mistyped.
    #[error("malformed {command} payload: {reason}")]
    Decode { command: String, reason: String },
}

impl ProtocolError {
    /// Creates a decode error for the given command.
    pub fn decode(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error ends the walk through the current batch.
    ///
    /// Length errors leave no trustworthy offset for the next sub-frame;
    /// everything else only affects the sub-frame it was raised for.
    pub fn aborts_batch(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::BadLength { .. }
                | Self::Overrun { .. }
                | Self::FrameTooLarge { .. }
                | Self::Decompress(_)
        )
    }
}
