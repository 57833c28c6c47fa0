//! # Shared Error Types
//!
//! Errors produced while encoding or decoding the wire format, and the error
//! payload the native peer reports back for a failed call.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to encode or decode a wire message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("unknown command kind '{0}'")]
    UnknownKind(String),

    #[error("unknown extension type {0}")]
    UnknownExtType(i8),

    #[error("invalid object reference payload")]
    InvalidReference,

    #[error("integer {0} does not fit in a signed 64-bit value")]
    IntegerOverflow(u64),

    #[error("duplicate map key {0}")]
    DuplicateKey(String),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("msgpack encode failed: {0}")]
    Encode(String),

    #[error("msgpack decode failed: {0}")]
    Decode(String),
}

/// Error reported by the native peer for a call it could not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("remote error: {message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
