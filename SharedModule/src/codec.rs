//! # Wire Codec
//!
//! Encodes batches of commands into the compact msgpack representation the
//! native peer reads, and decodes the batches it sends back. Each command is
//! an array `[kind, ...fields]`; each argument is `[type_tag, value]`. Object
//! references travel as msgpack extension type 1 whose payload is the
//! msgpack-encoded id.

use log::debug;
use rmpv::Value as Wire;
use std::io::Cursor;

use crate::command::{Command, CommandKind};
use crate::constants::EXT_OBJECT_REF;
use crate::error::WireError;
use crate::object::ObjectId;
use crate::types::{check_unique_keys, Arg, Value};

/// Serialize a batch of commands as one wire message
pub fn encode_batch(commands: &[Command]) -> Result<Vec<u8>, WireError> {
    let items = commands
        .iter()
        .map(command_to_wire)
        .collect::<Result<Vec<_>, _>>()?;
    write_wire(&Wire::Array(items))
}

/// Serialize a single command
pub fn encode_command(command: &Command) -> Result<Vec<u8>, WireError> {
    write_wire(&command_to_wire(command)?)
}

/// Decode a wire message, failing if any command in it is invalid
pub fn decode_batch(data: &[u8]) -> Result<Vec<Command>, WireError> {
    decode_batch_lenient(data)?.into_iter().collect()
}

/// Decode a wire message, reporting each command's decode outcome separately
///
/// Only a message whose outer envelope is unreadable fails as a whole; a bad
/// command leaves its siblings intact.
pub fn decode_batch_lenient(data: &[u8]) -> Result<Vec<Result<Command, WireError>>, WireError> {
    match read_wire(data)? {
        Wire::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                command_from_wire(item).map_err(|err| {
                    debug!("Command {} of inbound batch rejected: {}", i, err);
                    err
                })
            })
            .collect()),
        other => Err(WireError::Malformed(format!("expected a command array, got {}", other))),
    }
}

/// Decode a single command
pub fn decode_command(data: &[u8]) -> Result<Command, WireError> {
    command_from_wire(read_wire(data)?)
}

fn write_wire(value: &Wire) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, value).map_err(|e| WireError::Encode(e.to_string()))?;
    Ok(buf)
}

fn read_wire(data: &[u8]) -> Result<Wire, WireError> {
    let mut cursor = Cursor::new(data);
    let value = rmpv::decode::read_value(&mut cursor).map_err(|e| WireError::Decode(e.to_string()))?;
    if (cursor.position() as usize) != data.len() {
        return Err(WireError::Malformed(format!(
            "{} trailing bytes after message",
            data.len() - cursor.position() as usize
        )));
    }
    Ok(value)
}

// --- Encoding ---

fn command_to_wire(command: &Command) -> Result<Wire, WireError> {
    let tag = Wire::from(command.kind().tag());
    let fields = match command {
        Command::Create { target_id, type_name, args } => vec![
            tag,
            Wire::from(*target_id),
            Wire::from(type_name.as_str()),
            args_to_wire(args)?,
        ],
        Command::Proxy { target_id, type_name, ref_id } => vec![
            tag,
            Wire::from(*target_id),
            Wire::from(type_name.as_str()),
            Wire::from(*ref_id),
        ],
        Command::Method { target_id, result_id, member, args } => vec![
            tag,
            Wire::from(*target_id),
            Wire::from(*result_id),
            Wire::from(member.as_str()),
            args_to_wire(args)?,
        ],
        Command::StaticMethod { type_name, result_id, member, args } => vec![
            tag,
            Wire::from(type_name.as_str()),
            Wire::from(*result_id),
            Wire::from(member.as_str()),
            args_to_wire(args)?,
        ],
        Command::Field { target_id, member, value } => vec![
            tag,
            Wire::from(*target_id),
            Wire::from(member.as_str()),
            Wire::Array(vec![arg_to_wire(value)?]),
        ],
        Command::Delete { target_id } => vec![tag, Wire::from(*target_id)],
        Command::Result { result_id, value } => {
            vec![tag, Wire::from(*result_id), arg_to_wire(value)?]
        }
        Command::Error { result_id, message } => {
            vec![tag, Wire::from(*result_id), Wire::from(message.as_str())]
        }
        Command::Event { target_id, result_id, member, args } => vec![
            tag,
            Wire::from(*target_id),
            Wire::from(*result_id),
            Wire::from(member.as_str()),
            args_to_wire(args)?,
        ],
    };
    Ok(Wire::Array(fields))
}

fn args_to_wire(args: &[Arg]) -> Result<Wire, WireError> {
    Ok(Wire::Array(args.iter().map(arg_to_wire).collect::<Result<Vec<_>, _>>()?))
}

fn arg_to_wire(arg: &Arg) -> Result<Wire, WireError> {
    Ok(Wire::Array(vec![Wire::from(arg.type_tag.as_str()), value_to_wire(&arg.value)?]))
}

/// Convert a bridge value into its msgpack form
pub fn value_to_wire(value: &Value) -> Result<Wire, WireError> {
    let wire = match value {
        Value::Nil => Wire::Nil,
        Value::Bool(b) => Wire::Boolean(*b),
        Value::Int(i) => Wire::from(*i),
        Value::Float(f) => Wire::F64(*f),
        Value::Str(s) => Wire::from(s.as_str()),
        Value::Bytes(b) => Wire::Binary(b.clone()),
        Value::List(items) => Wire::Array(items.iter().map(value_to_wire).collect::<Result<Vec<_>, _>>()?),
        Value::Map(entries) => {
            check_unique_keys(entries)?;
            let mut pairs = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                pairs.push((value_to_wire(k)?, value_to_wire(v)?));
            }
            Wire::Map(pairs)
        }
        Value::Ref(id) => Wire::Ext(EXT_OBJECT_REF, write_wire(&Wire::from(*id))?),
    };
    Ok(wire)
}

// --- Decoding ---

/// Remaining fields of a command being decoded
struct Fields {
    kind: CommandKind,
    items: std::vec::IntoIter<Wire>,
}

impl Fields {
    fn next(&mut self, what: &str) -> Result<Wire, WireError> {
        self.items
            .next()
            .ok_or_else(|| WireError::Malformed(format!("'{}' command is missing its {}", self.kind, what)))
    }

    fn id(&mut self, what: &str) -> Result<ObjectId, WireError> {
        let wire = self.next(what)?;
        wire_to_id(&wire).ok_or_else(|| WireError::Malformed(format!("'{}' {} is not an integer id", self.kind, what)))
    }

    fn string(&mut self, what: &str) -> Result<String, WireError> {
        match self.next(what)? {
            Wire::String(s) => s.into_str().ok_or(WireError::InvalidUtf8),
            other => Err(WireError::Malformed(format!("'{}' {} is not a string: {}", self.kind, what, other))),
        }
    }

    fn args(&mut self) -> Result<Vec<Arg>, WireError> {
        match self.next("arguments")? {
            Wire::Array(items) => items.into_iter().map(arg_from_wire).collect(),
            other => Err(WireError::Malformed(format!("'{}' arguments are not a list: {}", self.kind, other))),
        }
    }

    fn arg(&mut self) -> Result<Arg, WireError> {
        arg_from_wire(self.next("value")?)
    }

    fn finish(mut self) -> Result<(), WireError> {
        match self.items.next() {
            None => Ok(()),
            Some(_) => Err(WireError::Malformed(format!("'{}' command has extra fields", self.kind))),
        }
    }
}

fn command_from_wire(wire: Wire) -> Result<Command, WireError> {
    let items = match wire {
        Wire::Array(items) => items,
        other => return Err(WireError::Malformed(format!("expected a command, got {}", other))),
    };
    let mut items = items.into_iter();
    let tag = match items.next() {
        Some(Wire::String(s)) => s.into_str().ok_or(WireError::InvalidUtf8)?,
        Some(other) => return Err(WireError::Malformed(format!("command kind is not a string: {}", other))),
        None => return Err(WireError::Malformed("empty command".to_string())),
    };
    let kind = CommandKind::from_tag(&tag).ok_or(WireError::UnknownKind(tag))?;
    let mut f = Fields { kind, items };

    let command = match kind {
        CommandKind::Create => Command::Create {
            target_id: f.id("target id")?,
            type_name: f.string("type name")?,
            args: f.args()?,
        },
        CommandKind::Proxy => Command::Proxy {
            target_id: f.id("target id")?,
            type_name: f.string("type name")?,
            ref_id: f.id("reference id")?,
        },
        CommandKind::Method => Command::Method {
            target_id: f.id("target id")?,
            result_id: f.id("result id")?,
            member: f.string("member name")?,
            args: f.args()?,
        },
        CommandKind::StaticMethod => Command::StaticMethod {
            type_name: f.string("type name")?,
            result_id: f.id("result id")?,
            member: f.string("member name")?,
            args: f.args()?,
        },
        CommandKind::Field => {
            let target_id = f.id("target id")?;
            let member = f.string("member name")?;
            let mut args = f.args()?;
            if args.len() != 1 {
                return Err(WireError::Malformed(format!(
                    "field assignment carries {} values, expected 1",
                    args.len()
                )));
            }
            Command::Field { target_id, member, value: args.remove(0) }
        }
        CommandKind::Delete => Command::Delete { target_id: f.id("target id")? },
        CommandKind::Result => Command::Result {
            result_id: f.id("result id")?,
            value: f.arg()?,
        },
        CommandKind::Error => Command::Error {
            result_id: f.id("result id")?,
            message: f.string("message")?,
        },
        CommandKind::Event => Command::Event {
            target_id: f.id("target id")?,
            result_id: f.id("result id")?,
            member: f.string("member name")?,
            args: f.args()?,
        },
    };
    f.finish()?;
    Ok(command)
}

fn arg_from_wire(wire: Wire) -> Result<Arg, WireError> {
    let mut pair = match wire {
        Wire::Array(pair) if pair.len() == 2 => pair.into_iter(),
        other => return Err(WireError::Malformed(format!("argument is not a [type, value] pair: {}", other))),
    };
    let type_tag = match pair.next() {
        Some(Wire::String(s)) => s.into_str().ok_or(WireError::InvalidUtf8)?,
        // The peer may leave the tag empty for results of untyped calls
        Some(Wire::Nil) => String::new(),
        Some(other) => return Err(WireError::Malformed(format!("argument type is not a string: {}", other))),
        None => unreachable!("pair length checked above"),
    };
    let value = match pair.next() {
        Some(v) => value_from_wire(v)?,
        None => unreachable!("pair length checked above"),
    };
    Ok(Arg { type_tag, value })
}

fn wire_to_id(wire: &Wire) -> Option<ObjectId> {
    match wire {
        Wire::Integer(i) => i.as_i64(),
        _ => None,
    }
}

/// Convert a msgpack value into a bridge value
pub fn value_from_wire(wire: Wire) -> Result<Value, WireError> {
    let value = match wire {
        Wire::Nil => Value::Nil,
        Wire::Boolean(b) => Value::Bool(b),
        Wire::Integer(i) => match i.as_i64() {
            Some(v) => Value::Int(v),
            None => return Err(WireError::IntegerOverflow(i.as_u64().unwrap_or(u64::MAX))),
        },
        Wire::F32(f) => Value::Float(f as f64),
        Wire::F64(f) => Value::Float(f),
        Wire::String(s) => Value::Str(s.into_str().ok_or(WireError::InvalidUtf8)?),
        Wire::Binary(b) => Value::Bytes(b),
        Wire::Array(items) => Value::List(items.into_iter().map(value_from_wire).collect::<Result<Vec<_>, _>>()?),
        Wire::Map(pairs) => {
            let mut entries = Vec::with_capacity(pairs.len());
            for (k, v) in pairs {
                entries.push((value_from_wire(k)?, value_from_wire(v)?));
            }
            check_unique_keys(&entries)?;
            Value::Map(entries)
        }
        Wire::Ext(EXT_OBJECT_REF, payload) => {
            let id = read_wire(&payload).map_err(|_| WireError::InvalidReference)?;
            Value::Ref(wire_to_id(&id).ok_or(WireError::InvalidReference)?)
        }
        Wire::Ext(tag, _) => return Err(WireError::UnknownExtType(tag)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EXT_PEER_PROXY;

    fn sample_commands() -> Vec<Command> {
        vec![
            Command::Create {
                target_id: 1,
                type_name: "android.widget.Button".into(),
                args: vec![Arg::new("android.content.Context", Value::Ref(-1))],
            },
            Command::Proxy { target_id: 2, type_name: "android.view.View$OnClickListener".into(), ref_id: 1 },
            Command::Method {
                target_id: 1,
                result_id: 0,
                member: "setText".into(),
                args: vec![Arg::new("str", "hi")],
            },
            Command::StaticMethod {
                type_name: "android.widget.Toast".into(),
                result_id: 3,
                member: "makeText".into(),
                args: vec![],
            },
            Command::Field { target_id: 1, member: "enabled".into(), value: Arg::new("boolean", true) },
            Command::Delete { target_id: 1 },
            Command::Result { result_id: 3, value: Arg::new("int", 42) },
            Command::Error { result_id: 4, message: "boom".into() },
            Command::Event { target_id: 1, result_id: 0, member: "onClick".into(), args: vec![Arg::new("android.view.View", Value::Ref(1))] },
        ]
    }

    #[test]
    fn every_command_kind_survives_the_wire() {
        let batch = sample_commands();
        let bytes = encode_batch(&batch).unwrap();
        assert_eq!(decode_batch(&bytes).unwrap(), batch);
    }

    #[test]
    fn nested_references_and_empty_args() {
        let cmd = Command::Method {
            target_id: 10,
            result_id: 11,
            member: "addViews".into(),
            args: vec![
                Arg::new("java.util.List", Value::List(vec![Value::Ref(12), Value::List(vec![Value::Ref(13)])])),
                Arg::new("java.util.Map", Value::Map(vec![(Value::from("child"), Value::Ref(14))])),
            ],
        };
        let empty = Command::Create { target_id: 15, type_name: "android.view.View".into(), args: vec![] };
        let bytes = encode_batch(&[cmd.clone(), empty.clone()]).unwrap();
        assert_eq!(decode_batch(&bytes).unwrap(), vec![cmd, empty]);
    }

    #[test]
    fn references_are_extension_values() {
        let wire = value_to_wire(&Value::Ref(77)).unwrap();
        match wire {
            Wire::Ext(tag, payload) => {
                assert_eq!(tag, EXT_OBJECT_REF);
                assert_eq!(read_wire(&payload).unwrap(), Wire::from(77));
            }
            other => panic!("expected ext value, got {:?}", other),
        }
    }

    #[test]
    fn unknown_extension_types_are_rejected() {
        let wire = Wire::Ext(EXT_PEER_PROXY, write_wire(&Wire::from(5)).unwrap());
        assert_eq!(value_from_wire(wire), Err(WireError::UnknownExtType(EXT_PEER_PROXY)));
    }

    #[test]
    fn method_wire_layout() {
        let cmd = Command::Method {
            target_id: 8,
            result_id: 0,
            member: "setText".into(),
            args: vec![Arg::new("str", "hi")],
        };
        let bytes = encode_command(&cmd).unwrap();
        let expected = Wire::Array(vec![
            Wire::from("m"),
            Wire::from(8),
            Wire::from(0),
            Wire::from("setText"),
            Wire::Array(vec![Wire::Array(vec![Wire::from("str"), Wire::from("hi")])]),
        ]);
        assert_eq!(read_wire(&bytes).unwrap(), expected);
        assert_eq!(decode_command(&bytes).unwrap(), cmd);
    }

    #[test]
    fn lenient_decoding_isolates_bad_commands() {
        let good = command_to_wire(&Command::Delete { target_id: 3 }).unwrap();
        let bad_kind = Wire::Array(vec![Wire::from("zz"), Wire::from(1)]);
        let short = Wire::Array(vec![Wire::from("r")]);
        let bytes = write_wire(&Wire::Array(vec![good, bad_kind, short])).unwrap();

        let decoded = decode_batch_lenient(&bytes).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0], Ok(Command::Delete { target_id: 3 }));
        assert_eq!(decoded[1], Err(WireError::UnknownKind("zz".into())));
        assert!(matches!(decoded[2], Err(WireError::Malformed(_))));
        assert!(decode_batch(&bytes).is_err());
    }

    #[test]
    fn rejects_non_array_envelope_and_trailing_bytes() {
        let bytes = write_wire(&Wire::from("hello")).unwrap();
        assert!(matches!(decode_batch_lenient(&bytes), Err(WireError::Malformed(_))));

        let mut bytes = encode_batch(&[]).unwrap();
        bytes.push(0xc0);
        assert!(matches!(decode_batch(&bytes), Err(WireError::Malformed(_))));
    }

    #[test]
    fn duplicate_map_keys_fail_both_ways() {
        let dup = Value::Map(vec![(Value::Int(1), Value::Nil), (Value::Int(1), Value::Bool(true))]);
        assert!(matches!(value_to_wire(&dup), Err(WireError::DuplicateKey(_))));

        let wire = Wire::Map(vec![(Wire::from(1), Wire::Nil), (Wire::from(1), Wire::Nil)]);
        assert!(matches!(value_from_wire(wire), Err(WireError::DuplicateKey(_))));
    }

    #[test]
    fn oversized_unsigned_integers_are_rejected() {
        let wire = Wire::from(u64::MAX);
        assert_eq!(value_from_wire(wire), Err(WireError::IntegerOverflow(u64::MAX)));
    }
}
