//! # Remote Object Proxy
//!
//! Local handle to a native-side object. A proxy carries only data (its id,
//! its class, suppression flags and connected callbacks); everything it can
//! do remotely is described by its `ProxyClass`.

use log::{debug, trace};
use nbridge_shared::object::{is_reserved, reserved_name};
use nbridge_shared::{Command, ObjectId, RemoteObject, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::app::{Bridge, BridgeInner};
use crate::class::ProxyClass;
use crate::error::BridgeResult;

/// Local handler connected to a callback
pub type Handler = Rc<dyn Fn(&[Value]) -> Result<Value, String>>;

pub(crate) struct Connected {
    pub handler: Handler,
    /// Return type declared for the callback, used to tag replies
    pub returns: Option<String>,
}

/// Mutable per-object state, shared by a root proxy and its nested handles
#[derive(Default)]
pub(crate) struct ProxyState {
    /// Wire member names whose propagation is currently suppressed
    pub suppressed: HashSet<String>,
    /// Connected handlers by wire member name
    pub callbacks: HashMap<String, Connected>,
    /// Member-name prefixes of nested handles, with their classes
    pub nested: Vec<(String, Rc<ProxyClass>)>,
    pub destroyed: bool,
}

pub(crate) struct ProxyInner {
    pub id: ObjectId,
    pub class: Rc<ProxyClass>,
    pub bridge: Rc<BridgeInner>,
    /// `""` for a root object, `"attr."` (accumulated) for nested handles
    pub prefix: String,
    /// Nested handles keep their root alive and share its state
    pub root: Option<Proxy>,
    /// Whether destroying this handle tells the peer to delete the object
    pub owned: bool,
    state: RefCell<ProxyState>,
}

impl ProxyInner {
    pub(crate) fn new(id: ObjectId, class: Rc<ProxyClass>, bridge: Rc<BridgeInner>) -> Self {
        Self {
            id,
            class,
            bridge,
            prefix: String::new(),
            root: None,
            owned: !is_reserved(id),
            state: RefCell::new(ProxyState::default()),
        }
    }

    pub(crate) fn state(&self) -> &RefCell<ProxyState> {
        match &self.root {
            Some(root) => root.inner.state(),
            None => &self.state,
        }
    }

    fn destroy(&self) {
        if self.root.is_some() {
            trace!("Nested handle {}{} has nothing to destroy", self.id, self.prefix);
            return;
        }

        let callbacks = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.suppressed.clear();
            std::mem::take(&mut state.callbacks)
        };
        // Handlers may own other proxies; drop them with no borrow held
        drop(callbacks);

        self.bridge.objects.borrow_mut().unregister(self.id);
        if self.owned {
            debug!("Destroying {} id={}", self.class.native_name(), self.id);
            self.bridge.enqueue(Command::Delete { target_id: self.id }, false);
        } else if let Some(name) = reserved_name(self.id) {
            debug!("Released handle to {} (id={})", name, self.id);
        }
    }
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Handle to a native-side object
///
/// Clones share one object. Dropping the last clone destroys it, exactly
/// like calling `destroy`.
#[derive(Clone)]
pub struct Proxy {
    pub(crate) inner: Rc<ProxyInner>,
}

impl Proxy {
    pub(crate) fn from_inner(inner: Rc<ProxyInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn class(&self) -> &ProxyClass {
        &self.inner.class
    }

    pub fn native_name(&self) -> &str {
        self.inner.class.native_name()
    }

    /// The bridge this proxy talks through
    pub fn bridge(&self) -> Bridge {
        Bridge::from_inner(self.inner.bridge.clone())
    }

    pub fn is_nested(&self) -> bool {
        self.inner.root.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state().borrow().destroyed
    }

    /// Delete the native object and forget it locally. Safe to call again.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    /// Handle addressing the property `attr` of this object as a `class`
    ///
    /// It shares this object's id; its members go out as `attr.member`. It is
    /// never registered and never creates or deletes anything natively.
    pub fn nested(&self, attr: &str, class: &str) -> BridgeResult<Proxy> {
        let class = self.inner.bridge.class(class)?;
        let root = self.inner.root.clone().unwrap_or_else(|| self.clone());
        let prefix = format!("{}{}.", self.inner.prefix, attr);

        {
            let mut state = root.inner.state.borrow_mut();
            if !state.nested.iter().any(|(p, _)| *p == prefix) {
                state.nested.push((prefix.clone(), class.clone()));
            }
        }

        Ok(Proxy::from_inner(Rc::new(ProxyInner {
            id: self.inner.id,
            class,
            bridge: self.inner.bridge.clone(),
            prefix,
            root: Some(root),
            owned: false,
            state: RefCell::new(ProxyState::default()),
        })))
    }

    /// Member name as it goes on the wire
    pub(crate) fn wire_name(&self, member: &str) -> String {
        format!("{}{}", self.inner.prefix, member)
    }
}

impl RemoteObject for Proxy {
    fn object_id(&self) -> ObjectId {
        self.inner.id
    }
}

impl From<&Proxy> for Value {
    fn from(proxy: &Proxy) -> Self {
        Value::Ref(proxy.id())
    }
}

impl From<Proxy> for Value {
    fn from(proxy: Proxy) -> Self {
        Value::Ref(proxy.id())
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.inner.id)
            .field("class", &self.inner.class.native_name())
            .field("prefix", &self.inner.prefix)
            .finish()
    }
}
