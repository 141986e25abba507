//! Subscription front end over the dispatch rewriter.
//!
//! [`MessageInterceptor`] owns the map of active interception records and
//! hands out [`Subscription`] guards. The first subscription for an
//! `(object, selector)` pair installs (or revives) the shim; the last
//! unsubscribe retires the record from the map while the shim stays in place
//! as a pass-through.
//!
//! Each watched object also gets one early teardown hook. When the object
//! goes away every record it had is retired and each of its observers is
//! told through [`MessageObserver::completed`].

use std::sync::{Arc, LazyLock, Weak};

use hookwire_object::{ImpId, ObjectId, ObjectRef, Selector, TeardownPhase, Value, WeakObject};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{InterceptError, Result};
use crate::observer::{MessageObserver, Phase, SubscriptionId, observer_fn};
use crate::record::{InterceptionRecord, RecordKey};
use crate::rewriter::{DispatchRewriter, ShimHandle};

#[cfg(test)]
mod tests;

type ObjectRecords = FxHashMap<Selector, Arc<InterceptionRecord>>;

#[derive(Default)]
struct InterceptorState {
	rewriter: DispatchRewriter,
	/// Watched objects and their active records. An object stays here until
	/// teardown, even with no active records, so its hook is only added once.
	active: Mutex<FxHashMap<ObjectId, ObjectRecords>>,
}

impl InterceptorState {
	fn detach(&self, record: &Arc<InterceptionRecord>, phase: Phase, id: SubscriptionId) -> bool {
		let mut active = self.active.lock();
		let removed = record.observers(phase).remove(id);
		if removed && record.is_empty() {
			let retired = active
				.get_mut(&record.object_id())
				.and_then(|records| {
					let current = records.get(record.selector())?;
					Arc::ptr_eq(current, record).then(|| records.remove(record.selector()))
				})
				.flatten();
			if retired.is_some() {
				debug!(record = %record.key(), "retired interception record");
			}
		}
		removed
	}

	fn retire_object(&self, object: ObjectId) {
		let Some(records) = self.active.lock().remove(&object) else {
			return;
		};
		for record in records.into_values() {
			let completed = record.complete();
			debug!(record = %record.key(), completed, "object torn down, record retired");
		}
	}
}

/// Routes subscriptions to dispatch rewrites and tracks active records.
#[derive(Clone, Default)]
pub struct MessageInterceptor {
	state: Arc<InterceptorState>,
}

static GLOBAL: LazyLock<MessageInterceptor> = LazyLock::new(|| {
	crate::config::init_from_env();
	MessageInterceptor::new()
});

impl MessageInterceptor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Process-wide interceptor. The first call also applies the hazard
	/// policy from the environment.
	pub fn global() -> &'static MessageInterceptor {
		&GLOBAL
	}

	/// Subscribes `observer` to `selector` on `object`.
	///
	/// [`Phase::After`] is only available for void selectors; anything else
	/// fails with [`InterceptError::UnsupportedReturnShape`].
	pub fn observe(
		&self,
		object: &ObjectRef,
		selector: &Selector,
		observer: Arc<dyn MessageObserver>,
		phase: Phase,
	) -> Result<Subscription> {
		let handle = self.state.rewriter.ensure_observing(object, selector)?;
		let record = handle.record().clone();
		if phase == Phase::After && !record.is_void() {
			return Err(InterceptError::UnsupportedReturnShape {
				selector: selector.clone(),
				shape: record.original().signature.returns,
			});
		}

		let (id, first_for_object) = {
			let mut active = self.state.active.lock();
			let first_for_object = !active.contains_key(&object.id());
			let records = active.entry(object.id()).or_default();
			let current = records.entry(selector.clone()).or_insert_with(|| record.clone());
			if !Arc::ptr_eq(current, &record) {
				*current = record.clone();
			}
			if record.is_empty() {
				debug!(record = %record.key(), "activated interception record");
			}
			(record.observers(phase).add(observer), first_for_object)
		};

		if first_for_object {
			let state = Arc::downgrade(&self.state);
			object.add_teardown_hook(TeardownPhase::Early, move |id| {
				if let Some(state) = state.upgrade() {
					state.retire_object(id);
				}
			});
		}

		Ok(Subscription {
			state: Arc::downgrade(&self.state),
			record,
			phase,
			id,
		})
	}

	/// Like [`Self::observe`], for a target that may already be gone.
	pub fn observe_weak(
		&self,
		object: &WeakObject,
		selector: &Selector,
		observer: Arc<dyn MessageObserver>,
		phase: Phase,
	) -> Result<Subscription> {
		let object = object.upgrade().ok_or(InterceptError::ObjectDeallocated)?;
		self.observe(&object, selector, observer, phase)
	}

	/// Subscribes a closure.
	pub fn observe_fn(
		&self,
		object: &ObjectRef,
		selector: &Selector,
		phase: Phase,
		f: impl Fn(&[Value]) + Send + Sync + 'static,
	) -> Result<Subscription> {
		self.observe(object, selector, observer_fn(f), phase)
	}

	/// Ends a subscription. Same as dropping it.
	pub fn unobserve(&self, subscription: Subscription) -> bool {
		subscription.unsubscribe()
	}

	/// Returns the shim handle if `selector` on `object` has a live record.
	pub fn shim(&self, object: &ObjectRef, selector: &Selector) -> Option<ShimHandle> {
		let live = self
			.state
			.active
			.lock()
			.get(&object.id())
			.is_some_and(|records| records.contains_key(selector));
		if !live {
			return None;
		}
		self.state.rewriter.installed(object, selector)
	}

	/// Returns true if `selector` on `object` has at least one observer.
	pub fn is_observing(&self, object: &ObjectRef, selector: &Selector) -> bool {
		self.observer_count(object.id(), selector) > 0
	}

	pub fn observer_count(&self, object: ObjectId, selector: &Selector) -> usize {
		self.state
			.active
			.lock()
			.get(&object)
			.and_then(|records| records.get(selector))
			.map_or(0, |record| record.observer_count())
	}

	/// Keys of every active record.
	pub fn active_records(&self) -> Vec<RecordKey> {
		self.state
			.active
			.lock()
			.values()
			.flat_map(|records| records.values().map(|r| r.key().clone()))
			.collect()
	}
}

/// Guard for one observer registration.
///
/// Dropping the guard unsubscribes. Dropping or unsubscribing after the
/// object has gone away is a no-op.
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
	state: Weak<InterceptorState>,
	record: Arc<InterceptionRecord>,
	phase: Phase,
	id: SubscriptionId,
}

impl Subscription {
	pub fn id(&self) -> SubscriptionId {
		self.id
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	pub fn selector(&self) -> &Selector {
		self.record.selector()
	}

	pub fn object_id(&self) -> ObjectId {
		self.record.object_id()
	}

	pub fn shim_id(&self) -> Option<ImpId> {
		self.record.shim_id()
	}

	/// Returns false once unsubscribed or completed by teardown.
	pub fn is_active(&self) -> bool {
		self.record.observers(self.phase).contains(self.id)
	}

	/// Unsubscribes now. Returns true if the observer was still registered.
	pub fn unsubscribe(self) -> bool {
		self.detach()
	}

	fn detach(&self) -> bool {
		match self.state.upgrade() {
			Some(state) => state.detach(&self.record, self.phase, self.id),
			None => self.record.observers(self.phase).remove(self.id),
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.detach();
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("id", &self.id)
			.field("record", self.record.key())
			.field("phase", &self.phase)
			.finish()
	}
}
