//! # Tokio Event Loop

use std::any::Any;
use std::time::Duration;

use super::{EventLoop, Task};

/// Schedules onto the current tokio `LocalSet`
///
/// Bridge state is single-threaded, so tasks go through `spawn_local`.
/// Scheduling outside a `LocalSet` panics inside tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioEventLoop;

impl TokioEventLoop {
    pub fn new() -> Self {
        Self
    }
}

impl EventLoop for TokioEventLoop {
    fn name(&self) -> &'static str {
        "tokio"
    }

    fn deferred_call(&self, task: Task) {
        tokio::task::spawn_local(async move { task() });
    }

    fn timed_call(&self, delay: Duration, task: Task) {
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            task()
        });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[tokio::test]
    async fn runs_tasks_on_the_local_set() {
        let local = tokio::task::LocalSet::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let seen = log.clone();
        local
            .run_until(async move {
                let event_loop = TokioEventLoop::new();
                let a = seen.clone();
                let b = seen.clone();
                event_loop.timed_call(Duration::from_millis(5), Box::new(move || a.borrow_mut().push("timed")));
                event_loop.deferred_call(Box::new(move || b.borrow_mut().push("deferred")));
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
            .await;

        assert_eq!(*log.borrow(), ["deferred", "timed"]);
    }
}
