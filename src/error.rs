use thiserror::Error;

use crate::models::message::Handle;

/// Errors raised while routing a message into the dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Message for handle `{handle}` is unroutable: {reason}")]
    UnroutableMessage {
        handle: Handle,
        reason: &'static str,
    },
}

/// Errors raised while encoding or decoding binary gateway frames.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Device token must decode to 32 bytes (got {length} hex characters)")]
    InvalidTokenLength { length: usize },

    #[error("Device token contains a non-hex character: {0:?}")]
    InvalidTokenCharacter(char),

    #[error("Payload is too large for a frame item ({0} bytes)")]
    PayloadTooLarge(usize),

    #[error("Malformed frame: {0}")]
    MalformedFrame(&'static str),

    #[error("Payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
