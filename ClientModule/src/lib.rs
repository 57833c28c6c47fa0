//! # Bridge Client Module
//!
//! Declarative-runtime side of the native object bridge. Code here creates,
//! mutates and calls native objects it does not own through proxies, and
//! receives their callbacks, without ever blocking.
//!
//! The system is organized into several sub-modules:
//! - `object`: object registry and proxies
//! - `class`: proxy classes and their member tables
//! - `property`: method, field and callback operations, suppression
//! - `net`: transport and the batching command queue
//! - `rpc`: pending results and their correlation
//! - `dispatch`: routing of inbound batches
//! - `event_loop`: scheduler adapters
//! - `ffi`: C entry points for the native host

pub mod app;
pub mod class;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event_loop;
pub mod ffi;
pub mod net;
pub mod object;
pub mod property;
pub mod rpc;

use log::info;

// Re-export commonly used items
pub use app::Bridge;
pub use class::{MemberKind, ProxyClass, Signature};
pub use config::{BridgeConfig, EventLoopKind};
pub use dispatch::CommandOutcome;
pub use error::{BridgeError, BridgeResult};
pub use event_loop::{BuiltinEventLoop, EventLoop, TokioEventLoop};
pub use net::Transport;
pub use object::Proxy;
pub use property::SuppressionGuard;
pub use rpc::{PendingResult, ResultState};

pub use nbridge_shared as shared;
pub use nbridge_shared::{Arg, Command, ObjectId, RemoteError, RemoteObject, Value};

/// Build a `Vec<Value>` argument list from anything convertible to `Value`
///
/// ```
/// let args = nbridge_client::args!["hi", 3, true];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}

/// Create the process's bridge from `config` and install it for the FFI
/// entry points on the calling thread
pub fn init(config: BridgeConfig) -> Bridge {
    info!("Initializing bridge client module");
    let bridge = Bridge::from_config(config);
    ffi::install(&bridge);
    bridge
}

/// `init` with configuration read from the `NBRIDGE_*` environment variables
pub fn init_from_env() -> BridgeResult<Bridge> {
    Ok(init(BridgeConfig::from_env()?))
}
