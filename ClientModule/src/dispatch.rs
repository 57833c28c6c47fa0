//! # Inbound Dispatch
//!
//! Routes each command of an inbound batch on its own. A command that fails
//! to decode or route is reported and the rest of the batch still runs.

use log::{debug, warn};
use nbridge_shared::constants::NO_RESULT;
use nbridge_shared::{decode_batch_lenient, Arg, Command, ObjectId, RemoteError, Value};
use std::panic::{self, AssertUnwindSafe};

use crate::app::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::net;
use crate::property::Fired;

/// How one inbound command ended
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The command took effect
    Applied,
    /// Nothing needed doing (unknown result id, suppressed or unconnected
    /// callback)
    Dropped,
    Failed(BridgeError),
}

impl Bridge {
    /// Decode and route an inbound batch now
    pub fn process_events(&self, data: &[u8]) -> Vec<CommandOutcome> {
        let decoded = match decode_batch_lenient(data) {
            Ok(decoded) => decoded,
            Err(err) => {
                let err = BridgeError::Wire(err);
                self.inner.report_error(&err);
                return vec![CommandOutcome::Failed(err)];
            }
        };

        if self.config().debug {
            let commands: Vec<Command> = decoded.iter().filter_map(|c| c.as_ref().ok().cloned()).collect();
            net::dump_batch("Rust <-- Native", &commands);
        }

        decoded
            .into_iter()
            .map(|command| match command {
                Ok(command) => self.route(command),
                Err(err) => {
                    let err = BridgeError::Wire(err);
                    self.inner.report_error(&err);
                    CommandOutcome::Failed(err)
                }
            })
            .collect()
    }

    fn route(&self, command: Command) -> CommandOutcome {
        match command {
            Command::Result { result_id, value } => self.settle(result_id, Ok(value.value)),
            Command::Error { result_id: NO_RESULT, message } => {
                warn!("Native side reported an error: {}", message);
                CommandOutcome::Applied
            }
            Command::Error { result_id, message } => {
                self.settle(result_id, Err(BridgeError::Remote(RemoteError::new(message))))
            }
            Command::Event {
                target_id,
                result_id,
                member,
                args,
            } => self.handle_event(target_id, result_id, &member, args),
            other => {
                let err = BridgeError::UnexpectedCommand(other.kind().tag().to_string());
                warn!("{}", err);
                CommandOutcome::Failed(err)
            }
        }
    }

    fn settle(&self, result_id: ObjectId, outcome: BridgeResult<Value>) -> CommandOutcome {
        let pending = self.inner.results.borrow_mut().take(result_id);
        let pending = match pending {
            Some(pending) => pending,
            None => {
                warn!("Dropping reply for unknown result id {}", result_id);
                return CommandOutcome::Dropped;
            }
        };

        debug!("Settling result {} ({})", result_id, if outcome.is_ok() { "ok" } else { "error" });
        match panic::catch_unwind(AssertUnwindSafe(|| pending.resolve(outcome))) {
            Ok(_) => CommandOutcome::Applied,
            Err(_) => {
                let err = BridgeError::Handler {
                    member: format!("result {}", result_id),
                    message: "continuation panicked".to_string(),
                };
                self.inner.report_error(&err);
                CommandOutcome::Failed(err)
            }
        }
    }

    fn handle_event(&self, target_id: ObjectId, result_id: ObjectId, member: &str, args: Vec<Arg>) -> CommandOutcome {
        let values: Vec<Value> = args.into_iter().map(|arg| arg.value).collect();
        let fired = match self.lookup(target_id) {
            Some(proxy) => {
                debug!("Event {} on {} id={}", member, proxy.native_name(), target_id);
                proxy.fire(member, &values)
            }
            None => Err(BridgeError::StaleReference { id: target_id }),
        };

        match fired {
            Ok(fired) => {
                let (outcome, value, returns) = match fired {
                    Fired::Handled { value, returns } => (CommandOutcome::Applied, value, returns),
                    Fired::Unhandled { returns } => (CommandOutcome::Dropped, Value::Nil, returns),
                    Fired::Suppressed => (CommandOutcome::Dropped, Value::Nil, None),
                };
                if result_id != NO_RESULT {
                    let type_tag = returns.unwrap_or_else(|| value.type_name().to_string());
                    self.inner.enqueue(
                        Command::Result {
                            result_id,
                            value: Arg::new(type_tag, value),
                        },
                        false,
                    );
                }
                outcome
            }
            Err(err) => {
                match &err {
                    // The peer may fire a last event for an object destroyed here
                    BridgeError::StaleReference { .. } => {
                        warn!("Error processing event {} for {}: {}", member, target_id, err)
                    }
                    _ => self.inner.report_error(&err),
                }
                if result_id != NO_RESULT {
                    self.inner.enqueue(
                        Command::Error {
                            result_id,
                            message: err.to_string(),
                        },
                        false,
                    );
                }
                CommandOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ProxyClass;
    use crate::config::BridgeConfig;
    use crate::event_loop::BuiltinEventLoop;
    use nbridge_shared::encode_batch;

    fn bridge() -> Bridge {
        let config = BridgeConfig {
            forward_errors: false,
            ..BridgeConfig::default()
        };
        let bridge = Bridge::new(config, Box::new(BuiltinEventLoop::new()));
        bridge.register_class(
            ProxyClass::builder("android.widget.SeekBar")
                .method_returning("getProgress", &[], "int")
                .callback("onProgressChanged", &["android.widget.SeekBar", "int", "boolean"])
                .build()
                .unwrap(),
        );
        bridge
    }

    fn batch(commands: &[Command]) -> Vec<u8> {
        encode_batch(commands).unwrap()
    }

    #[test]
    fn unknown_result_ids_are_dropped() {
        let bridge = bridge();
        let outcomes = bridge.process_events(&batch(&[Command::Result {
            result_id: 123_456,
            value: Arg::new("int", 1),
        }]));
        assert_eq!(outcomes, vec![CommandOutcome::Dropped]);
    }

    #[test]
    fn error_replies_fail_the_pending_result() {
        let bridge = bridge();
        let seek = bridge.wrap("android.widget.SeekBar", 4000).unwrap();
        let pending = seek.call("getProgress", vec![]).unwrap().unwrap();

        let outcomes = bridge.process_events(&batch(&[Command::Error {
            result_id: pending.id(),
            message: "NullPointerException".into(),
        }]));
        assert_eq!(outcomes, vec![CommandOutcome::Applied]);
        assert_eq!(
            pending.outcome(),
            Some(Err(BridgeError::Remote(RemoteError::new("NullPointerException"))))
        );
        assert_eq!(bridge.pending_results(), 0);
    }

    #[test]
    fn outbound_only_kinds_are_rejected() {
        let bridge = bridge();
        let outcomes = bridge.process_events(&batch(&[Command::Delete { target_id: 1 }]));
        assert_eq!(outcomes, vec![CommandOutcome::Failed(BridgeError::UnexpectedCommand("d".into()))]);
    }

    #[test]
    fn garbage_is_a_wire_failure() {
        let bridge = bridge();
        let outcomes = bridge.process_events(&[0xc1]);
        assert!(matches!(outcomes.as_slice(), [CommandOutcome::Failed(BridgeError::Wire(_))]));
    }

    #[test]
    fn callback_receives_decoded_args() {
        let bridge = bridge();
        let seek = bridge.wrap("android.widget.SeekBar", 4001).unwrap();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = seen.clone();
        seek.connect("onProgressChanged", move |args| {
            sink.borrow_mut().extend_from_slice(args);
            Ok(Value::Nil)
        })
        .unwrap();

        let outcomes = bridge.process_events(&batch(&[Command::Event {
            target_id: 4001,
            result_id: NO_RESULT,
            member: "onProgressChanged".into(),
            args: vec![
                Arg::new("android.widget.SeekBar", Value::Ref(4001)),
                Arg::new("int", 30),
                Arg::new("boolean", true),
            ],
        }]));
        assert_eq!(outcomes, vec![CommandOutcome::Applied]);
        assert_eq!(*seen.borrow(), vec![Value::Ref(4001), Value::Int(30), Value::Bool(true)]);
    }
}
