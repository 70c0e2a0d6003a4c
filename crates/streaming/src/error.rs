//! Wire-level errors (§7: "protocol errors... connection closed; no server
//! state change").

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamingError>;

#[derive(Debug, Error)]
pub enum StreamingError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("payload length {len} exceeds the maximum of {max} bytes")]
    OversizePayload { len: u32, max: u32 },

    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<std::string::FromUtf8Error> for StreamingError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        StreamingError::Malformed(format!("invalid utf-8: {e}"))
    }
}
