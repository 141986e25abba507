//! Per-(object, selector) interception state.
//!
//! A record is shared between the shim installed in the object's override
//! map (as the shim's cookie and inside its body) and the interceptor's
//! active map. The shim outlives the active entry: once the last observer
//! leaves, the record is retired from the map but the shim keeps running as
//! a pass-through, and a later subscription revives the same record.

use std::fmt;
use std::sync::{Arc, OnceLock};

use hookwire_object::{ImpId, Implementation, Method, ObjectId, ObjectRef, Selector, Value};
use smallvec::SmallVec;

use crate::observer::{ObserverSet, Phase, complete_all};

#[cfg(test)]
mod tests;

/// Key of an [`InterceptionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
	pub object: ObjectId,
	pub selector: Selector,
}

impl fmt::Display for RecordKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.object, self.selector)
	}
}

/// Arguments captured for observers.
pub(crate) type ArgSnapshot = SmallVec<[Value; 4]>;

/// Interception state for one selector on one object.
pub struct InterceptionRecord {
	key: RecordKey,
	original: Method,
	shim: OnceLock<ImpId>,
	before: ObserverSet,
	after: ObserverSet,
}

impl InterceptionRecord {
	pub(crate) fn new(key: RecordKey, original: Method) -> Self {
		Self {
			key,
			original,
			shim: OnceLock::new(),
			before: ObserverSet::default(),
			after: ObserverSet::default(),
		}
	}

	/// Builds the shim implementation for `record` and binds its identity.
	pub(crate) fn build_shim(record: &Arc<Self>) -> Method {
		let body_record = Arc::clone(record);
		let imp = Implementation::new(move |receiver, args| body_record.dispatch(receiver, args))
			.with_cookie(record.clone());
		let _ = record.shim.set(imp.id());
		Method::new(record.original.signature, imp)
	}

	pub fn key(&self) -> &RecordKey {
		&self.key
	}

	pub fn selector(&self) -> &Selector {
		&self.key.selector
	}

	pub fn object_id(&self) -> ObjectId {
		self.key.object
	}

	/// The implementation the shim calls through to.
	pub fn original(&self) -> &Method {
		&self.original
	}

	/// Identity of the installed shim.
	pub fn shim_id(&self) -> Option<ImpId> {
		self.shim.get().copied()
	}

	pub fn is_void(&self) -> bool {
		self.original.signature.is_void()
	}

	pub fn arity(&self) -> usize {
		self.key.selector.arity()
	}

	pub(crate) fn observers(&self, phase: Phase) -> &ObserverSet {
		match phase {
			Phase::Before => &self.before,
			Phase::After => &self.after,
		}
	}

	pub fn observer_count(&self) -> usize {
		self.before.len() + self.after.len()
	}

	pub fn is_empty(&self) -> bool {
		self.before.is_empty() && self.after.is_empty()
	}

	/// Drops every observer, calling `completed` once on each.
	pub(crate) fn complete(&self) -> usize {
		complete_all([&self.before, &self.after])
	}

	/// Shim body.
	fn dispatch(&self, receiver: &ObjectRef, args: &[Value]) -> Value {
		if self.is_empty() {
			return self.original.invoke(receiver, args);
		}

		tracing::trace!(record = %self.key, observers = self.observer_count(), "intercepted call");
		let captured = self.capture(args);
		let shim = self.shim_id();
		self.before.notify_sent(&captured, shim);
		let result = self.original.invoke(receiver, args);
		if self.is_void() {
			self.after.notify_invoked(&captured, shim);
		}
		result
	}

	/// Copies the positional arguments, padding missing ones with
	/// [`Value::Nil`].
	fn capture(&self, args: &[Value]) -> ArgSnapshot {
		let arity = self.arity().max(args.len());
		let mut captured: ArgSnapshot = args.iter().cloned().collect();
		captured.resize(arity, Value::Nil);
		captured
	}
}

impl fmt::Debug for InterceptionRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InterceptionRecord")
			.field("key", &self.key)
			.field("original", &self.original.id())
			.field("shim", &self.shim_id())
			.field("before", &self.before.len())
			.field("after", &self.after.len())
			.finish()
	}
}
