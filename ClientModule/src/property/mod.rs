//! # Remote Members
//!
//! Operations behind the members a `ProxyClass` declares. Outbound ones
//! (methods, fields) turn into queued commands instead of local work;
//! callbacks are the reverse direction and run local handlers.

mod suppress;

pub use suppress::SuppressionGuard;

use log::{debug, warn};
use nbridge_shared::constants::NO_RESULT;
use nbridge_shared::{Command, Value};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::class::{Member, MemberKind};
use crate::error::{BridgeError, BridgeResult};
use crate::object::proxy::Connected;
use crate::object::Proxy;
use crate::rpc::PendingResult;

/// What happened when the peer fired a callback
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fired {
    /// The member is suppressed; nothing ran
    Suppressed,
    /// Neither a connected handler nor a default implementation exists
    Unhandled { returns: Option<String> },
    Handled { value: Value, returns: Option<String> },
}

impl Proxy {
    /// Call the remote method `method`
    ///
    /// Returns immediately. Methods declared with a return type hand back a
    /// `PendingResult`; others return `None`, as does any call made while
    /// the method is suppressed.
    pub fn call(&self, method: &str, args: Vec<Value>) -> BridgeResult<Option<PendingResult>> {
        let member = self.class().expect_member(method, MemberKind::Method)?;
        let wire = self.wire_name(method);
        if self.is_suppressed(method) {
            debug!("Skipping suppressed call {} on {}", wire, self.id());
            return Ok(None);
        }
        self.ensure_live()?;

        let args = member.signature.pack(method, args)?;
        let bridge = &self.inner.bridge;
        let pending = member
            .returns
            .as_ref()
            .map(|returns| bridge.register_result(Some(returns.clone())));
        let result_id = pending.as_ref().map_or(NO_RESULT, PendingResult::id);

        bridge.enqueue(
            Command::Method {
                target_id: self.id(),
                result_id,
                member: wire,
                args,
            },
            false,
        );
        Ok(pending)
    }

    /// Assign the remote field `field`
    pub fn set(&self, field: &str, value: impl Into<Value>) -> BridgeResult<()> {
        let member = self.class().expect_member(field, MemberKind::Field)?;
        let wire = self.wire_name(field);
        if self.is_suppressed(field) {
            debug!("Skipping suppressed update of {} on {}", wire, self.id());
            return Ok(());
        }
        self.ensure_live()?;

        let value = member
            .signature
            .pack(field, vec![value.into()])?
            .pop()
            .ok_or_else(|| BridgeError::InvalidSignature {
                member: field.to_string(),
                reason: "fields carry exactly one value".to_string(),
            })?;

        self.inner.bridge.enqueue(
            Command::Field {
                target_id: self.id(),
                member: wire,
                value,
            },
            false,
        );
        Ok(())
    }

    /// Remote fields are write-only; this always fails
    pub fn get(&self, field: &str) -> BridgeResult<Value> {
        self.class().expect_member(field, MemberKind::Field)?;
        Err(BridgeError::UnsupportedOperation(format!(
            "{}.{} is write-only; the native side owns its value",
            self.native_name(),
            field
        )))
    }

    /// Connect `handler` to the callback `callback`, replacing any previous one
    pub fn connect<F>(&self, callback: &str, handler: F) -> BridgeResult<()>
    where
        F: Fn(&[Value]) -> Result<Value, String> + 'static,
    {
        let member = self.class().expect_member(callback, MemberKind::Callback)?;
        let wire = self.wire_name(callback);
        let connected = Connected {
            handler: Rc::new(handler),
            returns: member.returns.clone(),
        };
        let previous = self.inner.state().borrow_mut().callbacks.insert(wire.clone(), connected);
        if previous.is_some() {
            warn!("Replacing handler for {} on {}", wire, self.id());
        }
        Ok(())
    }

    /// Disconnect the handler of `callback`; returns whether one was connected
    pub fn disconnect(&self, callback: &str) -> BridgeResult<bool> {
        self.class().expect_member(callback, MemberKind::Callback)?;
        let wire = self.wire_name(callback);
        let previous = self.inner.state().borrow_mut().callbacks.remove(&wire);
        Ok(previous.is_some())
    }

    pub fn is_connected(&self, callback: &str) -> bool {
        let wire = self.wire_name(callback);
        self.inner.state().borrow().callbacks.contains_key(&wire)
    }

    /// Suppress `member` until the returned guard is dropped
    pub fn suppress(&self, member: &str) -> SuppressionGuard {
        SuppressionGuard::new(self, member)
    }

    /// Run `f` with `member` suppressed
    pub fn with_suppressed<R>(&self, member: &str, f: impl FnOnce() -> R) -> R {
        let _guard = self.suppress(member);
        f()
    }

    pub fn is_suppressed(&self, member: &str) -> bool {
        let wire = self.wire_name(member);
        self.inner.state().borrow().suppressed.contains(&wire)
    }

    fn ensure_live(&self) -> BridgeResult<()> {
        if self.is_destroyed() {
            return Err(BridgeError::StaleReference { id: self.id() });
        }
        Ok(())
    }

    /// Deliver an inbound call of the callback named `wire` on the wire
    pub(crate) fn fire(&self, wire: &str, args: &[Value]) -> BridgeResult<Fired> {
        let member = self.resolve_callback(wire)?;
        let (suppressed, connected) = {
            let state = self.inner.state().borrow();
            let connected = state
                .callbacks
                .get(wire)
                .map(|c| (c.handler.clone(), c.returns.clone()));
            (state.suppressed.contains(wire), connected)
        };
        if suppressed {
            debug!("Callback {} on {} suppressed", wire, self.id());
            return Ok(Fired::Suppressed);
        }

        if let Some((handler, returns)) = connected {
            let value = guarded(wire, || handler(args))?;
            return Ok(Fired::Handled { value, returns });
        }
        match &member.default_handler {
            Some(default) => {
                let default = default.clone();
                let value = guarded(wire, || default(self, args))?;
                Ok(Fired::Handled {
                    value,
                    returns: member.returns.clone(),
                })
            }
            None => {
                debug!("No handler connected for {} on {}", wire, self.id());
                Ok(Fired::Unhandled {
                    returns: member.returns.clone(),
                })
            }
        }
    }

    /// Find the callback declaration for a wire member name, including
    /// members of nested handles
    fn resolve_callback(&self, wire: &str) -> BridgeResult<Member> {
        if self.class().member(wire).is_some() {
            return self.class().expect_member(wire, MemberKind::Callback).map(Clone::clone);
        }

        let nested = self.inner.state().borrow().nested.clone();
        for (prefix, class) in nested {
            if let Some(local) = wire.strip_prefix(prefix.as_str()) {
                if class.member(local).is_some() {
                    return class.expect_member(local, MemberKind::Callback).map(Clone::clone);
                }
            }
        }
        Err(BridgeError::UnknownMember {
            type_name: self.native_name().to_string(),
            member: wire.to_string(),
        })
    }
}

/// Run user code, turning an error or a panic into `BridgeError::Handler`
fn guarded(member: &str, f: impl FnOnce() -> Result<Value, String>) -> BridgeResult<Value> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(message)) => Err(BridgeError::Handler {
            member: member.to_string(),
            message,
        }),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_string());
            Err(BridgeError::Handler {
                member: member.to_string(),
                message: format!("panicked: {}", message),
            })
        }
    }
}
