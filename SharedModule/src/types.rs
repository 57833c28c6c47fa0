//! # Bridge Value Types
//!
//! The values that can travel in command arguments and results. Scalars map
//! directly onto msgpack types; object references are a distinguished
//! variant so they are always sent as an id, never by value.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::WireError;
use crate::object::{ObjectId, RemoteObject};

/// A value carried over the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value (msgpack nil)
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Ordered list
    List(Vec<Value>),
    /// Map with unique keys, kept in insertion order
    Map(Vec<(Value, Value)>),
    /// Reference to an object known to the bridge
    Ref(ObjectId),
}

impl Value {
    /// Reference to a remote object
    pub fn reference(obj: &impl RemoteObject) -> Self {
        Value::Ref(obj.object_id())
    }

    /// Build a map, rejecting duplicate keys
    pub fn map(entries: Vec<(Value, Value)>) -> Result<Self, WireError> {
        check_unique_keys(&entries)?;
        Ok(Value::Map(entries))
    }

    /// Type tag used when a value is sent without a declared type
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
            Value::Ref(_) => "ref",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Id of the referenced object, if this is a reference
    pub fn as_ref_id(&self) -> Option<ObjectId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }
}

/// Verify that no key appears twice in a map's entries
pub(crate) fn check_unique_keys(entries: &[(Value, Value)]) -> Result<(), WireError> {
    // Values aren't hashable (floats), so compare through their debug form
    let mut seen = HashSet::with_capacity(entries.len());
    for (key, _) in entries {
        let repr = format!("{:?}", key);
        if !seen.insert(repr.clone()) {
            return Err(WireError::DuplicateKey(repr));
        }
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Ref(id) => write!(f, "<ref {}>", id),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f as f64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Nil)
    }
}

/// A typed argument: the declared native type tag plus the encoded value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    /// Native type name (e.g. `java.lang.CharSequence`, `int`, `str`)
    pub type_tag: String,
    pub value: Value,
}

impl Arg {
    pub fn new(type_tag: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            type_tag: type_tag.into(),
            value: value.into(),
        }
    }

    /// Argument tagged with the value's own type name
    pub fn inferred(value: Value) -> Self {
        Self {
            type_tag: value.type_name().to_string(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_rejects_duplicate_keys() {
        let ok = Value::map(vec![(Value::from("a"), Value::Int(1)), (Value::from("b"), Value::Int(2))]);
        assert!(ok.is_ok());

        let dup = Value::map(vec![(Value::from("a"), Value::Int(1)), (Value::from("a"), Value::Int(2))]);
        assert!(matches!(dup, Err(WireError::DuplicateKey(_))));
    }

    #[test]
    fn inferred_tags_follow_value_type() {
        assert_eq!(Arg::inferred(Value::Int(3)).type_tag, "int");
        assert_eq!(Arg::inferred(Value::from("x")).type_tag, "str");
        assert_eq!(Arg::inferred(Value::Ref(4)).type_tag, "ref");
        assert_eq!(Arg::inferred(Value::Nil).type_tag, "nil");
    }

    #[test]
    fn reference_uses_only_the_id() {
        let id: ObjectId = 42;
        assert_eq!(Value::reference(&id), Value::Ref(42));
        assert_eq!(Value::Ref(42).as_ref_id(), Some(42));
    }

    #[test]
    fn display_is_readable() {
        let v = Value::List(vec![Value::Int(1), Value::from("hi"), Value::Ref(7)]);
        assert_eq!(v.to_string(), r#"[1, "hi", <ref 7>]"#);
    }
}
