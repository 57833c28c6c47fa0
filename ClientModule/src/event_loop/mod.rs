//! # Event Loop Adapter
//!
//! The bridge never runs its own thread. Flush checks and inbound batches
//! are handed to whichever cooperative loop the host picked at startup.

mod builtin;
mod tokio_loop;

pub use builtin::BuiltinEventLoop;
pub use tokio_loop::TokioEventLoop;

use log::info;
use std::any::Any;
use std::time::Duration;

use crate::config::EventLoopKind;

/// Unit of work scheduled on the loop
pub type Task = Box<dyn FnOnce() + 'static>;

/// Scheduler the bridge runs on
pub trait EventLoop {
    fn name(&self) -> &'static str;

    /// Run `task` on a later turn of the loop
    fn deferred_call(&self, task: Task);

    /// Run `task` once `delay` has elapsed
    fn timed_call(&self, delay: Duration, task: Task);

    fn as_any(&self) -> &dyn Any;
}

/// Build the loop selected by the configuration
pub fn from_kind(kind: EventLoopKind) -> Box<dyn EventLoop> {
    let event_loop: Box<dyn EventLoop> = match kind {
        EventLoopKind::Builtin => Box::new(BuiltinEventLoop::new()),
        EventLoopKind::Tokio => Box::new(TokioEventLoop::new()),
    };
    info!("Using {} event loop", event_loop.name());
    event_loop
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_follows_kind() {
        assert_eq!(from_kind(EventLoopKind::Builtin).name(), "builtin");
        assert_eq!(from_kind(EventLoopKind::Tokio).name(), "tokio");
        assert!(from_kind(EventLoopKind::Builtin)
            .as_any()
            .downcast_ref::<BuiltinEventLoop>()
            .is_some());
    }
}
