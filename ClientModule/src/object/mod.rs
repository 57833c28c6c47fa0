//! # Object Registry
//!
//! Table of every live proxy known to the bridge, keyed by object id.
//!
//! The registry never owns what it indexes: each slot holds a `Weak` handle,
//! and destroying an object turns its slot into a tombstone until the bridge
//! purges it after the next flush. Lookups return `Option` instead of
//! depending on when the last owner happened to drop, so an event racing
//! with a local destroy is detected as a stale reference.

pub mod proxy;

pub use proxy::Proxy;

use log::debug;
use nbridge_shared::ObjectId;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::error::{BridgeError, BridgeResult};

#[derive(Debug)]
enum Slot<T> {
    Live(Weak<T>),
    Tombstone,
}

/// Non-owning id → object table
#[derive(Debug)]
pub struct ObjectRegistry<T> {
    slots: HashMap<ObjectId, Slot<T>>,
}

impl<T> Default for ObjectRegistry<T> {
    fn default() -> Self {
        Self { slots: HashMap::new() }
    }
}

impl<T> ObjectRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `obj` under `id` without taking ownership of it
    pub fn register(&mut self, id: ObjectId, obj: &Rc<T>) {
        if let Some(Slot::Tombstone) = self.slots.get(&id) {
            debug!("Re-registering previously destroyed id {}", id);
        }
        self.slots.insert(id, Slot::Live(Rc::downgrade(obj)));
    }

    /// Weak handle for `id` if its object is still alive
    pub fn lookup(&self, id: ObjectId) -> Option<Weak<T>> {
        match self.slots.get(&id) {
            Some(Slot::Live(weak)) if weak.strong_count() > 0 => Some(weak.clone()),
            _ => None,
        }
    }

    /// Strong handle for `id`, or `StaleReference` when nothing live is there
    pub fn get(&self, id: ObjectId) -> BridgeResult<Rc<T>> {
        self.lookup(id)
            .and_then(|weak| weak.upgrade())
            .ok_or(BridgeError::StaleReference { id })
    }

    /// Tombstone the slot for `id`; returns whether it was live
    pub fn unregister(&mut self, id: ObjectId) -> bool {
        match self.slots.insert(id, Slot::Tombstone) {
            Some(Slot::Live(weak)) => weak.strong_count() > 0,
            _ => false,
        }
    }

    pub fn is_tombstoned(&self, id: ObjectId) -> bool {
        matches!(self.slots.get(&id), Some(Slot::Tombstone))
    }

    /// Number of ids whose object is still alive
    pub fn live_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Live(weak) if weak.strong_count() > 0))
            .count()
    }

    /// Slots in use, tombstones included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop tombstones and slots whose object vanished without unregistering
    pub fn purge(&mut self) -> usize {
        let before = self.slots.len();
        self.slots
            .retain(|_, slot| matches!(slot, Slot::Live(weak) if weak.strong_count() > 0));
        before - self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_does_not_keep_objects_alive() {
        let mut registry = ObjectRegistry::new();
        let obj = Rc::new("button");
        registry.register(7, &obj);
        assert!(registry.lookup(7).is_some());
        assert_eq!(Rc::strong_count(&obj), 1);

        drop(obj);
        assert!(registry.lookup(7).is_none());
        assert_eq!(registry.get(7).unwrap_err(), BridgeError::StaleReference { id: 7 });
    }

    #[test]
    fn unregister_leaves_tombstone() {
        let mut registry = ObjectRegistry::new();
        let obj = Rc::new(1u8);
        registry.register(3, &obj);

        assert!(registry.unregister(3));
        assert!(registry.is_tombstoned(3));
        assert!(registry.lookup(3).is_none());
        assert!(!registry.unregister(3));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn unknown_ids_are_stale() {
        let registry: ObjectRegistry<u8> = ObjectRegistry::new();
        assert!(registry.lookup(99).is_none());
        assert!(!registry.is_tombstoned(99));
        assert!(matches!(registry.get(99), Err(BridgeError::StaleReference { id: 99 })));
    }

    #[test]
    fn purge_removes_dead_slots() {
        let mut registry = ObjectRegistry::new();
        let keep = Rc::new(1u8);
        let gone = Rc::new(2u8);
        registry.register(1, &keep);
        registry.register(2, &gone);
        registry.register(3, &keep);
        registry.unregister(3);
        drop(gone);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.purge(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.live_count(), 1);
        assert!(registry.lookup(1).is_some());
        assert!(!registry.is_tombstoned(3));
    }
}
