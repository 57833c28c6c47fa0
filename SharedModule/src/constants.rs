//! # Bridge Constants
//!
//! Wire-level constants shared by the declarative runtime and the native peer.

use crate::object::ObjectId;

/// `result_id` carried by commands that expect no reply
pub const NO_RESULT: ObjectId = 0;

/// Reserved id of the pre-existing host application object (activity / app delegate)
pub const HOST_APPLICATION_ID: ObjectId = -1;

/// Reserved id of the pre-existing host window (window / root view controller)
pub const HOST_WINDOW_ID: ObjectId = -2;

/// Msgpack extension type carrying an object reference
pub const EXT_OBJECT_REF: i8 = 1;

/// Msgpack extension type the peer uses for its own proxies; never accepted inbound
pub const EXT_PEER_PROXY: i8 = 2;

/// Default delay in milliseconds before a scheduled flush check runs
pub const DEFAULT_FLUSH_DELAY_MS: u64 = 1;

/// Suffix marking the final slot of a signature as variadic
pub const VARIADIC_SUFFIX: &str = "...";

/// Wire tags of each command kind
pub mod kind {
    pub const CREATE: &str = "c";
    pub const PROXY: &str = "p";
    pub const METHOD: &str = "m";
    pub const STATIC_METHOD: &str = "sm";
    pub const FIELD: &str = "f";
    pub const DELETE: &str = "d";
    pub const RESULT: &str = "r";
    pub const ERROR: &str = "e";
    pub const EVENT: &str = "event";
}
