//! # Builtin Event Loop
//!
//! Deterministic loop on a virtual clock, driven by the host or by tests.

use log::debug;
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use super::{EventLoop, Task};

#[derive(Default)]
struct LoopState {
    now: Duration,
    next_seq: u64,
    /// Keyed by (deadline, scheduling order)
    tasks: BTreeMap<(Duration, u64), Task>,
}

/// Deterministic single-threaded loop on a virtual clock
///
/// Nothing runs until the host drives it with `run_ready`, `advance` or
/// `run_until_idle`. Clones share the same task queue, so the host keeps one
/// clone and hands another to the bridge.
#[derive(Clone, Default)]
pub struct BuiltinEventLoop {
    state: Rc<RefCell<LoopState>>,
}

impl BuiltinEventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    pub fn pending_tasks(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    fn schedule(&self, delay: Duration, task: Task) {
        let mut state = self.state.borrow_mut();
        let key = (state.now + delay, state.next_seq);
        state.next_seq += 1;
        state.tasks.insert(key, task);
    }

    /// Pop the earliest task due at or before `until`, moving the clock to it
    fn pop_due(&self, until: Option<Duration>) -> Option<Task> {
        let mut state = self.state.borrow_mut();
        let (&key, _) = state.tasks.iter().next()?;
        if until.map_or(false, |limit| key.0 > limit) {
            return None;
        }
        let task = state.tasks.remove(&key)?;
        if key.0 > state.now {
            state.now = key.0;
        }
        Some(task)
    }

    fn drain(&self, until: Option<Duration>) -> usize {
        let mut ran = 0;
        // The borrow is released before each task runs so tasks can schedule more
        while let Some(task) = self.pop_due(until) {
            task();
            ran += 1;
        }
        ran
    }

    /// Run every task due now, including ones they schedule with no delay
    pub fn run_ready(&self) -> usize {
        let now = self.now();
        self.drain(Some(now))
    }

    /// Move the clock forward by `by`, running everything that falls due
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let ran = self.drain(Some(target));
        self.state.borrow_mut().now = target;
        ran
    }

    /// Run tasks in deadline order, jumping the clock, until none remain
    pub fn run_until_idle(&self) -> usize {
        let ran = self.drain(None);
        debug!("Builtin event loop idle after {} tasks at {:?}", ran, self.now());
        ran
    }
}

impl EventLoop for BuiltinEventLoop {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn deferred_call(&self, task: Task) {
        self.schedule(Duration::ZERO, task);
    }

    fn timed_call(&self, delay: Duration, task: Task) {
        self.schedule(delay, task);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
