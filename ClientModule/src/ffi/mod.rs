//! # FFI Layer
//!
//! C entry points for the native host. The host installs one dispatcher
//! function that receives outbound batches, then feeds inbound batches to
//! `nbridge_on_events`. Both act on the bridge installed on the calling
//! thread with `install`.

#[cfg(feature = "cpp")]
mod cpp;

use log::{info, warn};
use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::sync::{Mutex, PoisonError};

use crate::app::Bridge;
use crate::net::Transport;

/// Native `void (*)(const uint8_t*, size_t)` receiving outbound batches
static DISPATCHER: Lazy<Mutex<usize>> = Lazy::new(|| Mutex::new(0));

thread_local! {
    static CURRENT: RefCell<Option<Bridge>> = RefCell::new(None);
}

fn dispatcher() -> usize {
    *DISPATCHER.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_dispatcher(ptr: usize) {
    *DISPATCHER.lock().unwrap_or_else(PoisonError::into_inner) = ptr;
}

/// Transport publishing batches through the installed native dispatcher
#[derive(Debug, Default, Clone, Copy)]
pub struct FfiTransport;

impl Transport for FfiTransport {
    fn dispatch(&self, batch: &[u8]) -> Result<(), String> {
        let ptr = dispatcher();
        if ptr == 0 {
            return Err("no native dispatcher installed".to_string());
        }
        let func: unsafe extern "C" fn(*const u8, usize) = unsafe { std::mem::transmute(ptr) };
        unsafe { func(batch.as_ptr(), batch.len()) };
        Ok(())
    }
}

/// Make `bridge` the target of the FFI entry points on this thread
pub fn install(bridge: &Bridge) {
    bridge.set_transport(FfiTransport);
    CURRENT.with(|current| *current.borrow_mut() = Some(bridge.clone()));
    info!("Bridge installed for FFI on this thread");
}

/// Remove the bridge installed on this thread
pub fn uninstall() -> Option<Bridge> {
    CURRENT.with(|current| current.borrow_mut().take())
}

fn with_current<R>(f: impl FnOnce(&Bridge) -> R) -> Option<R> {
    let bridge = CURRENT.with(|current| current.borrow().clone());
    match bridge {
        Some(bridge) => Some(f(&bridge)),
        None => {
            warn!("No bridge installed on this thread");
            None
        }
    }
}

fn on_events(data: &[u8]) -> bool {
    with_current(|bridge| bridge.on_events(data)).is_some()
}

fn force_update() -> bool {
    with_current(Bridge::force_update).is_some()
}

/// Register the function that receives outbound batches; `0` removes it
#[no_mangle]
pub extern "C" fn nbridge_install_dispatcher(ptr: usize) {
    set_dispatcher(ptr);
    info!("Native dispatcher {}", if ptr == 0 { "removed" } else { "installed" });
}

/// Deliver an inbound batch; returns false if no bridge is installed
///
/// # Safety
/// `data` must point to `len` readable bytes for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn nbridge_on_events(data: *const u8, len: usize) -> bool {
    if data.is_null() {
        warn!("nbridge_on_events called with a null buffer");
        return false;
    }
    let batch = std::slice::from_raw_parts(data, len);
    on_events(batch)
}

/// Flush queued commands now; returns false if no bridge is installed
#[no_mangle]
pub extern "C" fn nbridge_force_update() -> bool {
    force_update()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ProxyClass;
    use crate::config::BridgeConfig;
    use crate::event_loop::BuiltinEventLoop;
    use nbridge_shared::{decode_batch, encode_batch, Arg, Command, Value};
    use std::sync::Mutex;

    static RECEIVED: Lazy<Mutex<Vec<Vec<u8>>>> = Lazy::new(|| Mutex::new(Vec::new()));

    extern "C" fn record(data: *const u8, len: usize) {
        let batch = unsafe { std::slice::from_raw_parts(data, len) }.to_vec();
        RECEIVED.lock().unwrap().push(batch);
    }

    #[test]
    fn round_trip_through_the_c_entry_points() {
        let event_loop = BuiltinEventLoop::new();
        let bridge = Bridge::new(BridgeConfig::default(), Box::new(event_loop.clone()));
        bridge.register_class(
            ProxyClass::builder("android.widget.CheckBox")
                .field("checked", "boolean")
                .method_returning("isChecked", &[], "boolean")
                .build()
                .unwrap(),
        );
        install(&bridge);
        nbridge_install_dispatcher(record as usize);

        let check = bridge.wrap("android.widget.CheckBox", 7001).unwrap();
        check.set("checked", true).unwrap();
        let pending = check.call("isChecked", vec![]).unwrap().unwrap();
        assert!(nbridge_force_update());

        let sent = decode_batch(&RECEIVED.lock().unwrap()[0]).unwrap();
        assert_eq!(
            sent[0],
            Command::Field {
                target_id: 7001,
                member: "checked".into(),
                value: Arg::new("boolean", true),
            }
        );

        let reply = encode_batch(&[Command::Result {
            result_id: pending.id(),
            value: Arg::new("boolean", true),
        }])
        .unwrap();
        assert!(unsafe { nbridge_on_events(reply.as_ptr(), reply.len()) });
        assert!(pending.is_pending());
        event_loop.run_until_idle();
        assert_eq!(pending.outcome(), Some(Ok(Value::Bool(true))));

        assert!(uninstall().is_some());
        assert!(!nbridge_force_update());
        assert!(!unsafe { nbridge_on_events(std::ptr::null(), 0) });
        nbridge_install_dispatcher(0);
    }
}
