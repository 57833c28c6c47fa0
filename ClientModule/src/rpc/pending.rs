//! # Pending Results
//!
//! Placeholder for the reply to a call that declared a return type.

use log::trace;
use nbridge_shared::{ObjectId, RemoteObject, Value};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::{BridgeError, BridgeResult};

/// Continuation run when a result settles
type Waiter = Box<dyn FnOnce(&BridgeResult<Value>)>;

/// Where a pending result is in its life
#[derive(Debug, Clone, PartialEq)]
pub enum ResultState {
    Pending,
    Resolved(Value),
    Failed(BridgeError),
}

struct Shared {
    id: ObjectId,
    return_type: Option<String>,
    state: ResultState,
    waiters: Vec<Waiter>,
    wakers: Vec<Waker>,
}

/// Handle to the eventual return value of a remote call
///
/// Clones share one state. It settles at most once; continuations run in the
/// order they were registered, and ones registered after settlement run
/// immediately. Awaiting it yields the same outcome.
#[derive(Clone)]
pub struct PendingResult {
    shared: Rc<RefCell<Shared>>,
}

impl PendingResult {
    pub(crate) fn new(id: ObjectId, return_type: Option<String>) -> Self {
        Self {
            shared: Rc::new(RefCell::new(Shared {
                id,
                return_type,
                state: ResultState::Pending,
                waiters: Vec::new(),
                wakers: Vec::new(),
            })),
        }
    }

    /// Id the peer replies to
    pub fn id(&self) -> ObjectId {
        self.shared.borrow().id
    }

    /// Declared native return type, if the call had one
    pub fn return_type(&self) -> Option<String> {
        self.shared.borrow().return_type.clone()
    }

    pub fn state(&self) -> ResultState {
        self.shared.borrow().state.clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.shared.borrow().state, ResultState::Pending)
    }

    /// The settled outcome, `None` while pending
    pub fn outcome(&self) -> Option<BridgeResult<Value>> {
        settled(&self.shared.borrow().state)
    }

    /// Settle with `outcome`; returns false if it had already settled
    pub(crate) fn resolve(&self, outcome: BridgeResult<Value>) -> bool {
        let (waiters, wakers) = {
            let mut shared = self.shared.borrow_mut();
            if !matches!(shared.state, ResultState::Pending) {
                trace!("Ignoring second settlement of result {}", shared.id);
                return false;
            }
            shared.state = match &outcome {
                Ok(value) => ResultState::Resolved(value.clone()),
                Err(err) => ResultState::Failed(err.clone()),
            };
            (std::mem::take(&mut shared.waiters), std::mem::take(&mut shared.wakers))
        };

        for waiter in waiters {
            waiter(&outcome);
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Run `f` with the outcome once settled
    pub fn on_complete(&self, f: impl FnOnce(&BridgeResult<Value>) + 'static) {
        let outcome = {
            let mut shared = self.shared.borrow_mut();
            match settled(&shared.state) {
                Some(outcome) => outcome,
                None => {
                    shared.waiters.push(Box::new(f));
                    return;
                }
            }
        };
        f(&outcome);
    }

    /// Run `f` with the value if the call succeeds
    pub fn then(&self, f: impl FnOnce(&Value) + 'static) {
        self.on_complete(move |outcome| {
            if let Ok(value) = outcome {
                f(value)
            }
        });
    }

    /// Run `f` with the error if the call fails
    pub fn catch(&self, f: impl FnOnce(&BridgeError) + 'static) {
        self.on_complete(move |outcome| {
            if let Err(err) = outcome {
                f(err)
            }
        });
    }
}

fn settled(state: &ResultState) -> Option<BridgeResult<Value>> {
    match state {
        ResultState::Pending => None,
        ResultState::Resolved(value) => Some(Ok(value.clone())),
        ResultState::Failed(err) => Some(Err(err.clone())),
    }
}

impl RemoteObject for PendingResult {
    fn object_id(&self) -> ObjectId {
        self.id()
    }
}

impl Future for PendingResult {
    type Output = BridgeResult<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.borrow_mut();
        match settled(&shared.state) {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                if !shared.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    shared.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl fmt::Debug for PendingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.borrow();
        f.debug_struct("PendingResult")
            .field("id", &shared.id)
            .field("return_type", &shared.return_type)
            .field("state", &shared.state)
            .field("waiters", &shared.waiters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbridge_shared::RemoteError;

    #[test]
    fn settles_once_and_runs_waiters_in_order() {
        let pending = PendingResult::new(11, Some("int".into()));
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = log.clone();
        pending.then(move |v| first.borrow_mut().push(format!("first {}", v)));
        let second = log.clone();
        pending.on_complete(move |o| second.borrow_mut().push(format!("second {:?}", o.is_ok())));

        assert!(pending.resolve(Ok(Value::Int(42))));
        assert!(!pending.resolve(Ok(Value::Int(7))));
        assert_eq!(*log.borrow(), ["first 42", "second true"]);
        assert_eq!(pending.state(), ResultState::Resolved(Value::Int(42)));
    }

    #[test]
    fn late_continuations_run_immediately() {
        let pending = PendingResult::new(12, None);
        pending.resolve(Err(BridgeError::Remote(RemoteError::new("boom"))));

        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        pending.catch(move |e| *sink.borrow_mut() = Some(e.to_string()));
        pending.then(|_| panic!("must not run for a failed result"));

        assert_eq!(seen.borrow().as_deref(), Some("remote error: boom"));
    }

    #[test]
    fn never_settles_without_a_reply() {
        let pending = PendingResult::new(13, Some("int".into()));
        assert!(pending.is_pending());
        assert_eq!(pending.outcome(), None);
        assert_eq!(pending.object_id(), 13);
    }

    #[tokio::test]
    async fn awaiting_yields_the_outcome() {
        let pending = PendingResult::new(14, Some("str".into()));
        let resolver = pending.clone();
        let local = tokio::task::LocalSet::new();
        let value = local
            .run_until(async move {
                tokio::task::spawn_local(async move {
                    resolver.resolve(Ok(Value::from("done")));
                });
                pending.await
            })
            .await;
        assert_eq!(value, Ok(Value::from("done")));
    }
}
