//! # Bridge Errors
//!
//! Error taxonomy of the declarative-runtime side of the bridge.

use nbridge_shared::{ObjectId, RemoteError, WireError};
use thiserror::Error;

/// Result type used throughout the client module
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Everything that can go wrong on the local side of the bridge
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// An operation addressed an id with no live local object
    #[error("reference id={id} never existed or has already been destroyed")]
    StaleReference { id: ObjectId },

    /// A call supplied arguments inconsistent with the declared signature
    #[error("invalid number of arguments for {member}: given {given}, expected {expected}")]
    ArgumentCount {
        member: String,
        expected: String,
        given: usize,
    },

    /// The capability is intentionally not provided by the bridge
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The native side reported a failure for a call
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A local callback handler failed while handling a native event
    #[error("handler {member} failed: {message}")]
    Handler { member: String, message: String },

    #[error("no proxy class registered for native type '{0}'")]
    UnknownClass(String),

    #[error("{type_name}.{member} is not implemented")]
    UnknownMember { type_name: String, member: String },

    /// The member exists but is a different kind of descriptor
    #[error("{type_name}.{member} is a {actual}, not a {expected}")]
    MemberKind {
        type_name: String,
        member: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The id is already bound to a proxy of an unrelated class
    #[error("id={id} is bound to {bound}, not {requested}")]
    ClassMismatch {
        id: ObjectId,
        bound: String,
        requested: String,
    },

    #[error("invalid signature for {member}: {reason}")]
    InvalidSignature { member: String, reason: String },

    #[error("member {member} declared twice on {type_name}")]
    DuplicateMember { type_name: String, member: String },

    /// The peer sent a command kind that only flows outbound
    #[error("unexpected inbound '{0}' command")]
    UnexpectedCommand(String),

    #[error("transport failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    /// Whether the error is a caller bug that must surface immediately
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            BridgeError::ArgumentCount { .. }
                | BridgeError::UnknownClass(_)
                | BridgeError::UnknownMember { .. }
                | BridgeError::MemberKind { .. }
                | BridgeError::ClassMismatch { .. }
                | BridgeError::InvalidSignature { .. }
                | BridgeError::DuplicateMember { .. }
        )
    }
}
