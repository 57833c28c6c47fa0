//! # Bridge
//!
//! The single bridge instance of a process. It owns the object registry,
//! the class table, the outbound command queue, the result correlator and
//! the error channel, and runs everything on the event loop chosen at
//! startup. `Bridge` is a cheap handle; clones share one instance.

use log::{debug, error, info, warn};
use nbridge_shared::constants::NO_RESULT;
use nbridge_shared::object::generate_id;
use nbridge_shared::codec::encode_command;
use nbridge_shared::{encode_batch, Command, ObjectId, Value, WireError};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::class::{ClassRegistry, MemberKind, ProxyClass};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::event_loop::{self, BuiltinEventLoop, EventLoop};
use crate::net::{self, CommandQueue, Transport};
use crate::object::proxy::ProxyInner;
use crate::object::{ObjectRegistry, Proxy};
use crate::rpc::{PendingResult, ResultCorrelator};

/// Sink of the bridge's error channel
pub type ErrorHandler = Rc<dyn Fn(&BridgeError)>;

pub(crate) struct BridgeInner {
    config: BridgeConfig,
    event_loop: Box<dyn EventLoop>,
    transport: RefCell<Option<Rc<dyn Transport>>>,
    pub(crate) objects: RefCell<ObjectRegistry<ProxyInner>>,
    classes: RefCell<ClassRegistry>,
    queue: RefCell<CommandQueue>,
    pub(crate) results: RefCell<ResultCorrelator>,
    error_handler: RefCell<Option<ErrorHandler>>,
    this: Weak<BridgeInner>,
}

impl BridgeInner {
    pub(crate) fn class(&self, native_name: &str) -> BridgeResult<Rc<ProxyClass>> {
        self.classes.borrow().get(native_name)
    }

    /// Allocate a result id and start waiting for its reply
    pub(crate) fn register_result(&self, return_type: Option<String>) -> PendingResult {
        let pending = PendingResult::new(generate_id(), return_type);
        self.results.borrow_mut().register(pending.clone());
        pending
    }

    /// Queue `command`; with `now` the queue is flushed before returning
    pub(crate) fn enqueue(&self, command: Command, now: bool) {
        self.queue.borrow_mut().push(command);
        if now {
            self.flush_check(true);
        } else {
            self.schedule_flush_check();
        }
    }

    fn schedule_flush_check(&self) {
        let this = self.this.clone();
        let task = Box::new(move || {
            if let Some(inner) = this.upgrade() {
                inner.flush_check(false);
            }
        });
        let delay = self.config.flush_delay();
        if delay.is_zero() {
            self.event_loop.deferred_call(task);
        } else {
            self.event_loop.timed_call(delay, task);
        }
    }

    fn flush_check(&self, now: bool) {
        let batch = self.queue.borrow_mut().check(now);
        if let Some(batch) = batch {
            self.send(batch);
            // The DELETE for every tombstoned id is now on the wire
            let purged = self.objects.borrow_mut().purge();
            if purged > 0 {
                debug!("Purged {} destroyed object slots", purged);
            }
        }
    }

    /// Encode one batch and publish it through the transport
    fn send(&self, mut batch: Vec<Command>) {
        if self.config.debug {
            net::dump_batch("Rust --> Native", &batch);
        }
        let mut rejected = Vec::new();
        let encoded = match encode_batch(&batch) {
            Ok(data) => Ok(data),
            Err(_) => {
                rejected = drop_unencodable(&mut batch);
                encode_batch(&batch)
            }
        };

        match encoded {
            Ok(_) if batch.is_empty() => {}
            Ok(data) => {
                let transport = self.transport.borrow().clone();
                match transport {
                    Some(transport) => {
                        debug!("Flushing {} commands ({} bytes)", batch.len(), data.len());
                        if let Err(message) = transport.dispatch(&data) {
                            self.report_error(&BridgeError::Transport(message));
                        }
                    }
                    None => warn!("No transport installed; dropping batch of {} commands", batch.len()),
                }
            }
            Err(err) => rejected.push(err),
        }

        // Reported after the batch so a forwarded error never overtakes it
        for err in rejected {
            self.report_error(&BridgeError::Wire(err));
        }
    }

    /// Publish an error on the error channel
    pub(crate) fn report_error(&self, err: &BridgeError) {
        error!("{}", err);
        let handler = self.error_handler.borrow().clone();
        match handler {
            Some(handler) => handler(err),
            // Transport failures are not sent back over the failing transport
            None if self.config.forward_errors && !matches!(err, BridgeError::Transport(_)) => {
                self.show_error(&err.to_string());
            }
            None => {}
        }
    }

    fn show_error(&self, message: &str) {
        self.enqueue(
            Command::Error {
                result_id: NO_RESULT,
                message: message.to_string(),
            },
            true,
        );
    }
}

/// Remove the commands that cannot be encoded, keeping the rest in order
fn drop_unencodable(batch: &mut Vec<Command>) -> Vec<WireError> {
    let mut rejected = Vec::new();
    batch.retain(|command| match encode_command(command) {
        Ok(_) => true,
        Err(err) => {
            warn!("Dropping unencodable '{}' command: {}", command.kind(), err);
            rejected.push(err);
            false
        }
    });
    rejected
}

/// Handle to the process's bridge
#[derive(Clone)]
pub struct Bridge {
    pub(crate) inner: Rc<BridgeInner>,
}

impl Bridge {
    /// Create a bridge running on `event_loop`
    pub fn new(config: BridgeConfig, event_loop: Box<dyn EventLoop>) -> Self {
        info!(
            "Creating bridge on {} event loop (flush delay {:?}, debug {})",
            event_loop.name(),
            config.flush_delay(),
            config.debug
        );
        let inner = Rc::new_cyclic(|this| BridgeInner {
            config,
            event_loop,
            transport: RefCell::new(None),
            objects: RefCell::new(ObjectRegistry::new()),
            classes: RefCell::new(ClassRegistry::new()),
            queue: RefCell::new(CommandQueue::new()),
            results: RefCell::new(ResultCorrelator::new()),
            error_handler: RefCell::new(None),
            this: this.clone(),
        });
        Self { inner }
    }

    /// Create a bridge on the event loop the configuration selects
    pub fn from_config(config: BridgeConfig) -> Self {
        let event_loop = event_loop::from_kind(config.event_loop);
        Self::new(config, event_loop)
    }

    pub(crate) fn from_inner(inner: Rc<BridgeInner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn event_loop(&self) -> &dyn EventLoop {
        self.inner.event_loop.as_ref()
    }

    /// The builtin loop driving this bridge, if that is the one in use
    pub fn builtin_loop(&self) -> Option<BuiltinEventLoop> {
        self.inner
            .event_loop
            .as_any()
            .downcast_ref::<BuiltinEventLoop>()
            .cloned()
    }

    /// Install the sink outbound batches are published to
    pub fn set_transport(&self, transport: impl Transport + 'static) {
        *self.inner.transport.borrow_mut() = Some(Rc::new(transport));
        info!("Bridge transport installed");
    }

    pub fn clear_transport(&self) {
        self.inner.transport.borrow_mut().take();
    }

    /// Replace the error channel's sink
    pub fn set_error_handler(&self, handler: impl Fn(&BridgeError) + 'static) {
        *self.inner.error_handler.borrow_mut() = Some(Rc::new(handler));
    }

    /// Make a proxy class available to `create`, `wrap` and friends
    pub fn register_class(&self, class: ProxyClass) -> Rc<ProxyClass> {
        self.inner.classes.borrow_mut().register(class)
    }

    pub fn class(&self, native_name: &str) -> BridgeResult<Rc<ProxyClass>> {
        self.inner.class(native_name)
    }

    fn bind(&self, id: ObjectId, class: Rc<ProxyClass>) -> Proxy {
        let inner = Rc::new(ProxyInner::new(id, class, self.inner.clone()));
        self.inner.objects.borrow_mut().register(id, &inner);
        Proxy::from_inner(inner)
    }

    /// Construct a new native object of type `class`
    ///
    /// Proxies among `args` are sent as references.
    pub fn create(&self, class: &str, args: Vec<Value>) -> BridgeResult<Proxy> {
        let class = self.class(class)?;
        let args = class
            .constructor()
            .pack(&format!("{}.<init>", class.native_name()), args)?;
        let id = generate_id();
        let type_name = class.native_name().to_string();
        let proxy = self.bind(id, class);

        debug!("Creating {} id={}", type_name, id);
        self.inner.enqueue(
            Command::Create {
                target_id: id,
                type_name,
                args,
            },
            false,
        );
        Ok(proxy)
    }

    /// Wrap an object the native side already holds under `id`
    ///
    /// No CREATE is sent. Reserved singleton ids are never deleted either.
    /// An id that already has a live proxy returns that proxy, provided its
    /// class is `class` or extends it; otherwise `ClassMismatch`.
    pub fn wrap(&self, class: &str, id: ObjectId) -> BridgeResult<Proxy> {
        if let Some(existing) = self.lookup(id) {
            if !self.inner.classes.borrow().is_kind_of(existing.native_name(), class) {
                return Err(BridgeError::ClassMismatch {
                    id,
                    bound: existing.native_name().to_string(),
                    requested: class.to_string(),
                });
            }
            return Ok(existing);
        }
        let class = self.class(class)?;
        debug!("Wrapping existing {} id={}", class.native_name(), id);
        Ok(self.bind(id, class))
    }

    /// Create a native implementation of the interface `class` whose
    /// callbacks are routed to `forward_to` (or to the new proxy itself)
    pub fn create_interface_proxy(&self, class: &str, forward_to: Option<&Proxy>) -> BridgeResult<Proxy> {
        let class = self.class(class)?;
        let id = generate_id();
        let ref_id = forward_to.map_or(id, Proxy::id);
        let type_name = class.native_name().to_string();
        let proxy = self.bind(id, class);

        debug!("Creating interface proxy {} id={} routed to {}", type_name, id, ref_id);
        self.inner.enqueue(
            Command::Proxy {
                target_id: id,
                type_name,
                ref_id,
            },
            false,
        );
        Ok(proxy)
    }

    /// Call the static method `method` of the native class `class`
    pub fn call_static(&self, class: &str, method: &str, args: Vec<Value>) -> BridgeResult<Option<PendingResult>> {
        let class = self.class(class)?;
        let member = class.expect_member(method, MemberKind::StaticMethod)?;
        let args = member.signature.pack(method, args)?;
        let pending = member
            .returns
            .as_ref()
            .map(|returns| self.inner.register_result(Some(returns.clone())));
        let result_id = pending.as_ref().map_or(NO_RESULT, PendingResult::id);

        self.inner.enqueue(
            Command::StaticMethod {
                type_name: class.native_name().to_string(),
                result_id,
                member: method.to_string(),
                args,
            },
            false,
        );
        Ok(pending)
    }

    /// Live proxy registered under `id`
    pub fn lookup(&self, id: ObjectId) -> Option<Proxy> {
        let inner = self.inner.objects.borrow().lookup(id).and_then(|weak| weak.upgrade());
        inner.map(Proxy::from_inner)
    }

    /// A pending result the peer can settle by id
    pub fn create_future(&self) -> PendingResult {
        self.inner.register_result(None)
    }

    /// Flush the queue now instead of waiting for outstanding checks
    pub fn force_update(&self) {
        self.inner.queue.borrow_mut().request_flush();
        self.inner.flush_check(true);
    }

    /// Ask the native host to display `message`
    pub fn show_error(&self, message: &str) {
        self.inner.show_error(message);
    }

    /// Report `err` on the error channel
    pub fn report_error(&self, err: &BridgeError) {
        self.inner.report_error(err);
    }

    /// Accept an inbound batch; it is processed on the next loop turn
    pub fn on_events(&self, data: &[u8]) {
        let data = data.to_vec();
        let this = Rc::downgrade(&self.inner);
        self.inner.event_loop.deferred_call(Box::new(move || {
            if let Some(inner) = this.upgrade() {
                Bridge::from_inner(inner).process_events(&data);
            }
        }));
    }

    /// Commands waiting for the next flush
    pub fn queued_len(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Flush checks scheduled but not yet run
    pub fn pending_flushes(&self) -> usize {
        self.inner.queue.borrow().pending()
    }

    /// Calls still waiting for a reply
    pub fn pending_results(&self) -> usize {
        self.inner.results.borrow().len()
    }

    pub fn live_objects(&self) -> usize {
        self.inner.objects.borrow().live_count()
    }

    /// Registry slots in use, tombstones of unflushed destroys included
    pub fn tracked_objects(&self) -> usize {
        self.inner.objects.borrow().len()
    }
}
