//! # Proxy Class System
//!
//! Each native type the bridge talks to is described once, at startup, by a
//! `ProxyClass`: its native name, constructor signature and a table of remote
//! members (methods, static methods, fields, callbacks). Proxy instances only
//! point at their class; descriptors are never copied per instance.

use log::{debug, warn};
use nbridge_shared::codec::value_to_wire;
use nbridge_shared::constants::VARIADIC_SUFFIX;
use nbridge_shared::{Arg, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::error::{BridgeError, BridgeResult};
use crate::object::Proxy;

/// Built-in implementation of a callback used when no handler is connected
pub type DefaultHandler = Rc<dyn Fn(&Proxy, &[Value]) -> Result<Value, String>>;

/// Kind of remote member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Local-to-native call on an instance
    Method,
    /// Local-to-native call on the native class
    StaticMethod,
    /// Write-only native field or property
    Field,
    /// Native-to-local call on an instance
    Callback,
}

impl MemberKind {
    pub fn describe(self) -> &'static str {
        match self {
            MemberKind::Method => "method",
            MemberKind::StaticMethod => "static method",
            MemberKind::Field => "field",
            MemberKind::Callback => "callback",
        }
    }
}

/// Positional argument types of a member
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    slots: Vec<String>,
    variadic: bool,
}

impl Signature {
    /// Parse declared slot types; a final slot ending in `...` is variadic
    pub fn parse(member: &str, slots: &[&str]) -> BridgeResult<Self> {
        let mut parsed = Vec::with_capacity(slots.len());
        let mut variadic = false;
        for (i, slot) in slots.iter().enumerate() {
            match slot.strip_suffix(VARIADIC_SUFFIX) {
                Some(base) if i + 1 == slots.len() => {
                    variadic = true;
                    parsed.push(base.to_string());
                }
                Some(_) => {
                    return Err(BridgeError::InvalidSignature {
                        member: member.to_string(),
                        reason: format!("only the last slot may be variadic, found '{}' at position {}", slot, i),
                    })
                }
                None => parsed.push(slot.to_string()),
            }
        }
        Ok(Self { slots: parsed, variadic })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    /// Pair each argument with its declared type tag, checking the count
    ///
    /// Every value must be encodable; a bad one fails here instead of
    /// poisoning the batch it would have been flushed with.
    pub fn pack(&self, member: &str, args: Vec<Value>) -> BridgeResult<Vec<Arg>> {
        let arity_ok = if self.variadic {
            args.len() + 1 >= self.slots.len()
        } else {
            args.len() == self.slots.len()
        };
        if !arity_ok {
            return Err(BridgeError::ArgumentCount {
                member: member.to_string(),
                expected: self.to_string(),
                given: args.len(),
            });
        }

        for value in &args {
            value_to_wire(value)?;
        }

        let last = self.slots.len().saturating_sub(1);
        Ok(args
            .into_iter()
            .enumerate()
            .map(|(i, value)| Arg {
                type_tag: self.slots[i.min(last)].clone(),
                value,
            })
            .collect())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", slot)?;
            if self.variadic && i + 1 == self.slots.len() {
                write!(f, "{}", VARIADIC_SUFFIX)?;
            }
        }
        write!(f, ")")
    }
}

/// A remote member declared on a proxy class
#[derive(Clone)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    pub signature: Signature,
    /// Declared return type; methods with one hand back a pending result
    pub returns: Option<String>,
    pub(crate) default_handler: Option<DefaultHandler>,
}

impl Member {
    pub fn has_default_handler(&self) -> bool {
        self.default_handler.is_some()
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("signature", &self.signature)
            .field("returns", &self.returns)
            .field("default_handler", &self.default_handler.is_some())
            .finish()
    }
}

/// Description of a native type and its remote members
#[derive(Debug, Clone)]
pub struct ProxyClass {
    native_name: String,
    constructor: Signature,
    members: HashMap<String, Member>,
    parent: Option<String>,
}

impl ProxyClass {
    pub fn builder(native_name: &str) -> ProxyClassBuilder {
        ProxyClassBuilder::new(native_name)
    }

    pub fn native_name(&self) -> &str {
        &self.native_name
    }

    pub fn constructor(&self) -> &Signature {
        &self.constructor
    }

    /// Native name of the class this one extends
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Look up a member and check it is of the expected kind
    pub fn expect_member(&self, name: &str, kind: MemberKind) -> BridgeResult<&Member> {
        let member = self.members.get(name).ok_or_else(|| BridgeError::UnknownMember {
            type_name: self.native_name.clone(),
            member: name.to_string(),
        })?;
        if member.kind != kind {
            return Err(BridgeError::MemberKind {
                type_name: self.native_name.clone(),
                member: name.to_string(),
                expected: kind.describe(),
                actual: member.kind.describe(),
            });
        }
        Ok(member)
    }
}

/// Builder for `ProxyClass`; the first declaration error is reported by `build`
pub struct ProxyClassBuilder {
    native_name: String,
    constructor: Vec<String>,
    members: HashMap<String, Member>,
    declared: HashSet<String>,
    parent: Option<String>,
    error: Option<BridgeError>,
}

impl ProxyClassBuilder {
    fn new(native_name: &str) -> Self {
        Self {
            native_name: native_name.to_string(),
            constructor: Vec::new(),
            members: HashMap::new(),
            declared: HashSet::new(),
            parent: None,
            error: None,
        }
    }

    /// Inherit every member of `parent`; members declared here override
    pub fn extends(mut self, parent: &ProxyClass) -> Self {
        for (name, member) in &parent.members {
            if !self.declared.contains(name) {
                self.members.insert(name.clone(), member.clone());
            }
        }
        self.parent = Some(parent.native_name.clone());
        self
    }

    pub fn constructor(mut self, slots: &[&str]) -> Self {
        self.constructor = slots.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn method(self, name: &str, slots: &[&str]) -> Self {
        self.declare(name, MemberKind::Method, slots, None, None)
    }

    pub fn method_returning(self, name: &str, slots: &[&str], returns: &str) -> Self {
        self.declare(name, MemberKind::Method, slots, Some(returns), None)
    }

    pub fn static_method(self, name: &str, slots: &[&str]) -> Self {
        self.declare(name, MemberKind::StaticMethod, slots, None, None)
    }

    pub fn static_method_returning(self, name: &str, slots: &[&str], returns: &str) -> Self {
        self.declare(name, MemberKind::StaticMethod, slots, Some(returns), None)
    }

    pub fn field(self, name: &str, type_tag: &str) -> Self {
        self.declare(name, MemberKind::Field, &[type_tag], None, None)
    }

    pub fn callback(self, name: &str, slots: &[&str]) -> Self {
        self.declare(name, MemberKind::Callback, slots, None, None)
    }

    /// Callback whose native caller waits for a value of type `returns`
    pub fn callback_returning(self, name: &str, slots: &[&str], returns: &str) -> Self {
        self.declare(name, MemberKind::Callback, slots, Some(returns), None)
    }

    /// Callback with a built-in implementation used until a handler is connected
    pub fn callback_with_default<F>(self, name: &str, slots: &[&str], returns: Option<&str>, handler: F) -> Self
    where
        F: Fn(&Proxy, &[Value]) -> Result<Value, String> + 'static,
    {
        self.declare(name, MemberKind::Callback, slots, returns, Some(Rc::new(handler)))
    }

    fn declare(
        mut self,
        name: &str,
        kind: MemberKind,
        slots: &[&str],
        returns: Option<&str>,
        default_handler: Option<DefaultHandler>,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        if !self.declared.insert(name.to_string()) {
            self.error = Some(BridgeError::DuplicateMember {
                type_name: self.native_name.clone(),
                member: name.to_string(),
            });
            return self;
        }
        match Signature::parse(name, slots) {
            Ok(signature) => {
                self.members.insert(
                    name.to_string(),
                    Member {
                        name: name.to_string(),
                        kind,
                        signature,
                        returns: returns.map(str::to_string),
                        default_handler,
                    },
                );
            }
            Err(err) => self.error = Some(err),
        }
        self
    }

    pub fn build(self) -> BridgeResult<ProxyClass> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let ctor: Vec<&str> = self.constructor.iter().map(String::as_str).collect();
        let constructor = Signature::parse(&format!("{}.<init>", self.native_name), &ctor)?;
        Ok(ProxyClass {
            native_name: self.native_name,
            constructor,
            members: self.members,
            parent: self.parent,
        })
    }
}

/// Table of proxy classes registered at startup, keyed by native name
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: HashMap<String, Rc<ProxyClass>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, replacing any previous class with the same native name
    pub fn register(&mut self, class: ProxyClass) -> Rc<ProxyClass> {
        let name = class.native_name.clone();
        let class = Rc::new(class);
        if self.classes.insert(name.clone(), class.clone()).is_some() {
            warn!("Replacing existing proxy class registration for: {}", name);
        }
        debug!("Registered proxy class: {}", name);
        class
    }

    pub fn get(&self, native_name: &str) -> BridgeResult<Rc<ProxyClass>> {
        self.classes
            .get(native_name)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownClass(native_name.to_string()))
    }

    pub fn contains(&self, native_name: &str) -> bool {
        self.classes.contains_key(native_name)
    }

    /// Whether `class` is `ancestor` or extends it through registered parents
    pub fn is_kind_of(&self, class: &str, ancestor: &str) -> bool {
        let mut current = Some(class);
        // A re-registered parent could close a cycle; never walk further than the table
        for _ in 0..=self.classes.len() {
            match current {
                Some(name) if name == ancestor => return true,
                Some(name) => current = self.classes.get(name).and_then(|c| c.parent()),
                None => return false,
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
