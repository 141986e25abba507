//! Forwarding delegate proxy.
//!
//! A [`DelegateProxy`] is an object to hand out wherever a delegate is
//! expected. It never implements anything through its class; every message
//! reaches the proxy's forwarder, which resolves it in this order:
//!
//! 1. A wired handler registered on the builder.
//! 2. The forward target, if one is set and responds.
//! 3. Otherwise the message is absorbed and the default value for its
//!    return shape is returned.
//!
//! Each message notifies the selector's "sent" observers before dispatch.
//! Void messages also notify "invoked" observers after dispatch, whether
//! they were wired, forwarded or absorbed.
//!
//! Observers are completed from an early teardown hook on the proxy object,
//! so they finish before any deallocation observer on the proxy fires.

use std::fmt;
use std::sync::{Arc, Weak};

use hookwire_object::{
	Class, Forwarder, ObjectRef, Protocol, ReturnShape, SendError, Selector, Signature, TargetRef,
	TeardownPhase, Value,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::{InterceptError, Result};
use crate::observer::{MessageObserver, ObserverSet, Phase, SubscriptionId, complete_all, observer_fn};


/// Handler for a wired selector.
pub type WiredHandler = dyn Fn(&WiredCall<'_>) -> Value + Send + Sync;

/// A message delivered to a wired handler.
pub struct WiredCall<'a> {
	selector: &'a Selector,
	args: &'a [Value],
	target: Option<&'a ObjectRef>,
}

impl WiredCall<'_> {
	pub fn selector(&self) -> &Selector {
		self.selector
	}

	pub fn args(&self) -> &[Value] {
		self.args
	}

	pub fn arg(&self, index: usize) -> Option<&Value> {
		self.args.get(index)
	}

	pub fn forward_target(&self) -> Option<&ObjectRef> {
		self.target
	}

	/// Sends the same message to the forward target, if it responds.
	pub fn forward(&self) -> Option<std::result::Result<Value, SendError>> {
		let target = self.target.filter(|t| t.responds_to(self.selector))?;
		Some(target.send(self.selector, self.args))
	}
}

struct Wired {
	signature: Signature,
	handler: Arc<WiredHandler>,
}

#[derive(Default)]
struct SelectorObservers {
	sent: ObserverSet,
	invoked: ObserverSet,
}

impl SelectorObservers {
	fn set(&self, phase: Phase) -> &ObserverSet {
		match phase {
			Phase::Before => &self.sent,
			Phase::After => &self.invoked,
		}
	}

	fn is_empty(&self) -> bool {
		self.sent.is_empty() && self.invoked.is_empty()
	}
}

struct ProxyState {
	protocol: Protocol,
	wired: FxHashMap<Selector, Wired>,
	target: RwLock<Option<TargetRef>>,
	observers: RwLock<FxHashMap<Selector, Arc<SelectorObservers>>>,
}

impl ProxyState {
	fn target(&self) -> Option<ObjectRef> {
		self.target.read().as_ref().and_then(TargetRef::upgrade)
	}

	fn return_shape(&self, selector: &Selector, target: Option<&ObjectRef>) -> ReturnShape {
		self.wired
			.get(selector)
			.map(|w| w.signature.returns)
			.or_else(|| self.protocol.signature(selector).map(|s| s.returns))
			.or_else(|| {
				target
					.and_then(|t| t.resolve(selector))
					.map(|m| m.signature.returns)
			})
			.unwrap_or(ReturnShape::Void)
	}

	fn observers(&self, selector: &Selector) -> Option<Arc<SelectorObservers>> {
		self.observers.read().get(selector).cloned()
	}

	/// Completes every registered observer once. Later calls find the sets
	/// drained and complete nothing.
	fn complete(&self) -> usize {
		let all: Vec<_> = self.observers.read().values().cloned().collect();
		complete_all(all.iter().flat_map(|o| [&o.sent, &o.invoked]))
	}

	/// Drops the map entry for `selector` if it is still `observers` and no
	/// longer holds anyone.
	fn prune(&self, selector: &Selector, observers: &Arc<SelectorObservers>) {
		let mut map = self.observers.write();
		if map.get(selector).is_some_and(|o| Arc::ptr_eq(o, observers) && o.is_empty()) {
			map.remove(selector);
		}
	}
}

impl Forwarder for ProxyState {
	fn responds_to(&self, selector: &Selector) -> bool {
		self.wired.contains_key(selector)
			|| self.protocol.declares_void(selector)
			|| self.target().is_some_and(|t| t.responds_to(selector))
	}

	fn forward(
		&self,
		_receiver: &ObjectRef,
		selector: &Selector,
		args: &[Value],
	) -> std::result::Result<Value, SendError> {
		let target = self.target();
		let shape = self.return_shape(selector, target.as_ref());
		let observers = self.observers(selector);
		if let Some(observers) = &observers {
			observers.sent.notify_sent(args, None);
		}

		let result = if let Some(wired) = self.wired.get(selector) {
			trace!(%selector, "proxy: wired");
			let call = WiredCall {
				selector,
				args,
				target: target.as_ref(),
			};
			let value = (wired.handler)(&call);
			if shape.is_void() { Value::Unit } else { value }
		} else if let Some(target) = target.as_ref().filter(|t| t.responds_to(selector)) {
			trace!(%selector, target = %target.id(), "proxy: forwarded");
			target.send(selector, args)?
		} else {
			trace!(%selector, ?shape, "proxy: absorbed");
			shape.default_value()
		};

		if shape.is_void()
			&& let Some(observers) = &observers
		{
			observers.invoked.notify_invoked(args, None);
		}
		Ok(result)
	}
}

impl Drop for ProxyState {
	fn drop(&mut self) {
		let map = self.observers.get_mut();
		complete_all(map.values().flat_map(|o| [&o.sent, &o.invoked]));
	}
}

/// Builder for [`DelegateProxy`].
pub struct DelegateProxyBuilder {
	class_name: String,
	protocol: Protocol,
	wired: FxHashMap<Selector, Wired>,
}

impl DelegateProxyBuilder {
	/// Wires `selector` to `handler`, using the protocol's declared
	/// signature or void if the protocol does not declare it.
	pub fn wire(
		self,
		selector: impl Into<Selector>,
		handler: impl Fn(&WiredCall<'_>) -> Value + Send + Sync + 'static,
	) -> Self {
		let selector = selector.into();
		let signature = self.protocol.signature(&selector).unwrap_or(Signature::VOID);
		self.wire_with(selector, signature, handler)
	}

	/// Wires `selector` with an explicit signature.
	pub fn wire_with(
		mut self,
		selector: impl Into<Selector>,
		signature: Signature,
		handler: impl Fn(&WiredCall<'_>) -> Value + Send + Sync + 'static,
	) -> Self {
		self.wired.insert(
			selector.into(),
			Wired {
				signature,
				handler: Arc::new(handler),
			},
		);
		self
	}

	pub fn build(self) -> DelegateProxy {
		let class = Class::builder(&self.class_name).build();
		let state = Arc::new(ProxyState {
			protocol: self.protocol,
			wired: self.wired,
			target: RwLock::new(None),
			observers: RwLock::new(FxHashMap::default()),
		});
		let object = ObjectRef::with_forwarder(&class, state.clone());
		let hook_state = Arc::downgrade(&state);
		object.add_teardown_hook(TeardownPhase::Early, move |id| {
			if let Some(state) = hook_state.upgrade() {
				let completed = state.complete();
				trace!(proxy = %id, completed, "proxy observers completed");
			}
		});
		debug!(
			proxy = %object.id(),
			class = %self.class_name,
			protocol = state.protocol.name(),
			wired = state.wired.len(),
			"built delegate proxy"
		);
		DelegateProxy { object, state }
	}
}

/// A forwarding receiver that can stand in for a delegate.
#[derive(Clone)]
pub struct DelegateProxy {
	object: ObjectRef,
	state: Arc<ProxyState>,
}

impl DelegateProxy {
	pub fn builder(class_name: &str, protocol: Protocol) -> DelegateProxyBuilder {
		DelegateProxyBuilder {
			class_name: class_name.to_owned(),
			protocol,
			wired: FxHashMap::default(),
		}
	}

	/// The object to install as the delegate.
	pub fn as_object(&self) -> &ObjectRef {
		&self.object
	}

	pub fn protocol(&self) -> &Protocol {
		&self.state.protocol
	}

	/// Sets where unwired messages go. The target is held weakly unless
	/// `retain` is set. `None` clears it.
	pub fn set_forward_target(&self, target: Option<&ObjectRef>, retain: bool) {
		let next = target.map(|t| TargetRef::new(t, retain));
		let previous = std::mem::replace(&mut *self.state.target.write(), next);
		debug!(
			proxy = %self.object.id(),
			target = ?target.map(ObjectRef::id),
			previous = ?previous.as_ref().map(TargetRef::id),
			retain,
			"proxy forward target changed"
		);
	}

	pub fn forward_target(&self) -> Option<ObjectRef> {
		self.state.target()
	}

	pub fn has_wired_implementation(&self, selector: &Selector) -> bool {
		self.state.wired.contains_key(selector)
	}

	/// Returns true if the protocol declares `selector` with a void return.
	pub fn void_methods_contain(&self, selector: &Selector) -> bool {
		self.state.protocol.declares_void(selector)
	}

	pub fn responds_to(&self, selector: &Selector) -> bool {
		self.object.responds_to(selector)
	}

	/// Sends a message to the proxy.
	pub fn send(&self, selector: &Selector, args: &[Value]) -> std::result::Result<Value, SendError> {
		self.object.send(selector, args)
	}

	/// Subscribes to messages the proxy receives for `selector`.
	///
	/// [`Phase::Before`] observes every message. [`Phase::After`] is refused
	/// for selectors known to return a value.
	pub fn observe(
		&self,
		selector: &Selector,
		phase: Phase,
		observer: Arc<dyn MessageObserver>,
	) -> Result<ProxySubscription> {
		if phase == Phase::After {
			let shape = self.state.return_shape(selector, self.forward_target().as_ref());
			if !shape.is_void() {
				return Err(InterceptError::UnsupportedReturnShape {
					selector: selector.clone(),
					shape,
				});
			}
		}

		let (observers, id) = {
			let mut map = self.state.observers.write();
			let observers = map.entry(selector.clone()).or_default().clone();
			let id = observers.set(phase).add(observer);
			(observers, id)
		};
		Ok(ProxySubscription {
			state: Arc::downgrade(&self.state),
			selector: selector.clone(),
			observers,
			phase,
			id,
		})
	}

	pub fn observe_fn(
		&self,
		selector: &Selector,
		phase: Phase,
		f: impl Fn(&[Value]) + Send + Sync + 'static,
	) -> Result<ProxySubscription> {
		self.observe(selector, phase, observer_fn(f))
	}
}

impl fmt::Debug for DelegateProxy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DelegateProxy")
			.field("object", &self.object)
			.field("protocol", &self.state.protocol.name())
			.field("target", &self.forward_target().map(|t| t.id()))
			.finish_non_exhaustive()
	}
}

/// Guard for an observer registered on a [`DelegateProxy`]. Dropping it
/// unsubscribes.
#[must_use = "dropping a ProxySubscription unsubscribes it"]
pub struct ProxySubscription {
	state: Weak<ProxyState>,
	selector: Selector,
	observers: Arc<SelectorObservers>,
	phase: Phase,
	id: SubscriptionId,
}

impl ProxySubscription {
	pub fn id(&self) -> SubscriptionId {
		self.id
	}

	pub fn selector(&self) -> &Selector {
		&self.selector
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	pub fn is_active(&self) -> bool {
		self.observers.set(self.phase).contains(self.id)
	}

	pub fn unsubscribe(self) -> bool {
		self.detach()
	}

	fn detach(&self) -> bool {
		let removed = self.observers.set(self.phase).remove(self.id);
		if removed
			&& self.observers.is_empty()
			&& let Some(state) = self.state.upgrade()
		{
			state.prune(&self.selector, &self.observers);
		}
		removed
	}
}

impl Drop for ProxySubscription {
	fn drop(&mut self) {
		self.detach();
	}
}

impl fmt::Debug for ProxySubscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProxySubscription")
			.field("id", &self.id)
			.field("selector", &self.selector)
			.field("phase", &self.phase)
			.finish()
	}
}
