//! # Shared Object Ids
//!
//! Object identifiers used on both sides of the bridge and the process-wide
//! allocator that hands them out.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::constants::{HOST_APPLICATION_ID, HOST_WINDOW_ID};

/// Unique identifier for an object known to the bridge
///
/// Positive ids are allocated locally and never reused within the process.
/// Negative ids name native singletons that exist before the bridge starts.
pub type ObjectId = i64;

/// Next id to hand out. Independent of any registry occupancy.
static NEXT_OBJECT_ID: AtomicI64 = AtomicI64::new(1);

/// Generate a fresh object id
///
/// Ids are strictly increasing for every caller and are shared between
/// proxies and pending results, so a result id can itself be referenced
/// on the wire before it resolves.
pub fn generate_id() -> ObjectId {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Check whether an id names a pre-existing native singleton
pub fn is_reserved(id: ObjectId) -> bool {
    id < 0
}

/// Human readable name of a reserved id, if it is one we know
pub fn reserved_name(id: ObjectId) -> Option<&'static str> {
    match id {
        HOST_APPLICATION_ID => Some("host application"),
        HOST_WINDOW_ID => Some("host window"),
        _ => None,
    }
}

/// Capability of being a handle to a native-side object
///
/// Anything implementing this is encoded on the wire as a typed reference
/// carrying only its id, never by copying its state.
pub trait RemoteObject {
    /// Id of the native object this handle refers to
    fn object_id(&self) -> ObjectId;
}

impl RemoteObject for ObjectId {
    fn object_id(&self) -> ObjectId {
        *self
    }
}
