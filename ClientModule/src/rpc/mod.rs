//! # Result Correlation
//!
//! Remote calls that declare a return type get a `PendingResult` registered
//! under a fresh id. The id travels as the command's `result_id`, and the
//! peer's RESULT or ERROR reply settles it.

mod pending;

pub use pending::{PendingResult, ResultState};

use log::debug;
use nbridge_shared::ObjectId;
use std::collections::HashMap;

/// Pending results waiting for a reply, by result id
#[derive(Debug, Default)]
pub struct ResultCorrelator {
    pending: HashMap<ObjectId, PendingResult>,
}

impl ResultCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, result: PendingResult) {
        let id = result.id();
        debug!("Awaiting result {}", id);
        self.pending.insert(id, result);
    }

    /// Remove and return the pending result for `id`
    pub fn take(&mut self, id: ObjectId) -> Option<PendingResult> {
        self.pending.remove(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
