//! # Command Envelope
//!
//! One marshaled operation of the bridge protocol. Commands are immutable
//! once built; only the codec and the peer look inside them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{kind, NO_RESULT};
use crate::object::ObjectId;
use crate::types::Arg;

/// Kinds of command in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Create,
    Proxy,
    Method,
    StaticMethod,
    Field,
    Delete,
    Result,
    Error,
    /// Native-to-local call addressed at an object's member
    Event,
}

impl CommandKind {
    /// Short tag used on the wire
    pub fn tag(self) -> &'static str {
        match self {
            CommandKind::Create => kind::CREATE,
            CommandKind::Proxy => kind::PROXY,
            CommandKind::Method => kind::METHOD,
            CommandKind::StaticMethod => kind::STATIC_METHOD,
            CommandKind::Field => kind::FIELD,
            CommandKind::Delete => kind::DELETE,
            CommandKind::Result => kind::RESULT,
            CommandKind::Error => kind::ERROR,
            CommandKind::Event => kind::EVENT,
        }
    }

    /// Parse a wire tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            kind::CREATE => CommandKind::Create,
            kind::PROXY => CommandKind::Proxy,
            kind::METHOD => CommandKind::Method,
            kind::STATIC_METHOD => CommandKind::StaticMethod,
            kind::FIELD => CommandKind::Field,
            kind::DELETE => CommandKind::Delete,
            kind::RESULT => CommandKind::Result,
            kind::ERROR => CommandKind::Error,
            kind::EVENT => CommandKind::Event,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single bridge command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Construct a native object and bind it to `target_id`
    Create {
        target_id: ObjectId,
        type_name: String,
        args: Vec<Arg>,
    },

    /// Construct a native interface implementation routing callbacks to `ref_id`
    Proxy {
        target_id: ObjectId,
        type_name: String,
        ref_id: ObjectId,
    },

    /// Invoke a member on a native object
    Method {
        target_id: ObjectId,
        result_id: ObjectId,
        member: String,
        args: Vec<Arg>,
    },

    /// Invoke a member on a native class
    StaticMethod {
        type_name: String,
        result_id: ObjectId,
        member: String,
        args: Vec<Arg>,
    },

    /// Assign a field or property on a native object
    Field {
        target_id: ObjectId,
        member: String,
        value: Arg,
    },

    /// Release the native object bound to `target_id`
    Delete { target_id: ObjectId },

    /// Successful reply to the call registered under `result_id`
    Result { result_id: ObjectId, value: Arg },

    /// Failed reply to the call registered under `result_id`.
    /// With `result_id == 0` it asks the host to display the message.
    Error { result_id: ObjectId, message: String },

    /// Call from the native side into a local object's member
    Event {
        target_id: ObjectId,
        result_id: ObjectId,
        member: String,
        args: Vec<Arg>,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Create { .. } => CommandKind::Create,
            Command::Proxy { .. } => CommandKind::Proxy,
            Command::Method { .. } => CommandKind::Method,
            Command::StaticMethod { .. } => CommandKind::StaticMethod,
            Command::Field { .. } => CommandKind::Field,
            Command::Delete { .. } => CommandKind::Delete,
            Command::Result { .. } => CommandKind::Result,
            Command::Error { .. } => CommandKind::Error,
            Command::Event { .. } => CommandKind::Event,
        }
    }

    /// Object the command is addressed at, if any
    pub fn target_id(&self) -> Option<ObjectId> {
        match self {
            Command::Create { target_id, .. }
            | Command::Proxy { target_id, .. }
            | Command::Method { target_id, .. }
            | Command::Field { target_id, .. }
            | Command::Delete { target_id }
            | Command::Event { target_id, .. } => Some(*target_id),
            _ => None,
        }
    }

    /// Result id the command carries, `0` when no reply is expected
    pub fn result_id(&self) -> ObjectId {
        match self {
            Command::Method { result_id, .. }
            | Command::StaticMethod { result_id, .. }
            | Command::Result { result_id, .. }
            | Command::Error { result_id, .. }
            | Command::Event { result_id, .. } => *result_id,
            _ => NO_RESULT,
        }
    }

    /// Member name, absent for create / proxy / delete / result / error
    pub fn member(&self) -> Option<&str> {
        match self {
            Command::Method { member, .. }
            | Command::StaticMethod { member, .. }
            | Command::Field { member, .. }
            | Command::Event { member, .. } => Some(member),
            _ => None,
        }
    }

    /// Human readable JSON rendering, used for traffic dumps
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unprintable {} command: {}>", self.kind(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn kind_tags_round_trip() {
        for kind in [
            CommandKind::Create,
            CommandKind::Proxy,
            CommandKind::Method,
            CommandKind::StaticMethod,
            CommandKind::Field,
            CommandKind::Delete,
            CommandKind::Result,
            CommandKind::Error,
            CommandKind::Event,
        ] {
            assert_eq!(CommandKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(CommandKind::from_tag("zz"), None);
    }

    #[test]
    fn accessors() {
        let cmd = Command::Method {
            target_id: 5,
            result_id: 9,
            member: "setText".into(),
            args: vec![Arg::new("str", Value::from("hi"))],
        };
        assert_eq!(cmd.kind(), CommandKind::Method);
        assert_eq!(cmd.target_id(), Some(5));
        assert_eq!(cmd.result_id(), 9);
        assert_eq!(cmd.member(), Some("setText"));

        let delete = Command::Delete { target_id: 5 };
        assert_eq!(delete.result_id(), NO_RESULT);
        assert_eq!(delete.member(), None);
    }

    #[test]
    fn json_rendering_names_the_variant() {
        let json = Command::Delete { target_id: 5 }.to_json();
        assert_eq!(json, r#"{"Delete":{"target_id":5}}"#);
    }
}
