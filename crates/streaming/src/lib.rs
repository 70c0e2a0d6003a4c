//! The LoopCache binary wire protocol (§6).
//!
//! Framing in `frame`, message types and payload codecs in `protocol`. This
//! crate has no server or client logic — it only knows how to turn bytes on
//! a socket into a `Message` and back.

pub mod error;
pub mod frame;
pub mod protocol;

pub use error::{Result, StreamingError};
pub use frame::{read_frame, write_frame, PayloadReader, PayloadWriter, RawFrame, DEFAULT_MAX_PAYLOAD_BYTES};
pub use protocol::{ConfigPayload, Message, MessageType, NodeInfo, PUT_FLAG_MIGRATION};
