//! # Suppression Guard

use log::trace;

use crate::object::Proxy;

/// Scoped suppression of one member of one object
///
/// While held, calls and sets of the member emit nothing and inbound
/// callbacks for it are not delivered. Dropping the guard, including during
/// unwinding, restores the flag to what it was when the guard was taken, so
/// guards nest.
#[must_use = "suppression ends as soon as the guard is dropped"]
pub struct SuppressionGuard {
    proxy: Proxy,
    member: String,
    was_suppressed: bool,
}

impl SuppressionGuard {
    pub(crate) fn new(proxy: &Proxy, member: &str) -> Self {
        let member = proxy.wire_name(member);
        let was_suppressed = !proxy.inner.state().borrow_mut().suppressed.insert(member.clone());
        trace!("Suppressing {} on {}", member, proxy.id());
        Self {
            proxy: proxy.clone(),
            member,
            was_suppressed,
        }
    }

    /// Wire name of the suppressed member
    pub fn member(&self) -> &str {
        &self.member
    }
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        if !self.was_suppressed {
            self.proxy.inner.state().borrow_mut().suppressed.remove(&self.member);
            trace!("Released suppression of {} on {}", self.member, self.proxy.id());
        }
    }
}
