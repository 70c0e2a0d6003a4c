//! Error types shared by the ring, storage engine, and node/master state machines.

use thiserror::Error;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("invalid node descriptor: {0}")]
    InvalidNode(String),

    #[error("ring operation failed: {0}")]
    RingOperation(String),

    #[error("node {0} not found in ring")]
    UnknownNode(String),

    #[error("key exceeds the 2^31-1 byte limit")]
    KeyTooLarge,

    #[error("value exceeds the 2^31-1 byte limit")]
    ValueTooLarge,

    #[error("internal error: {0}")]
    Internal(String),
}
