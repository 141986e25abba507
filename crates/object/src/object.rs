//! Object instances and message dispatch.
//!
//! # Dispatch order
//!
//! [`ObjectRef::send`] resolves a selector in this order:
//!
//! 1. The instance's override map. Entries there affect only this object, so
//!    behavior can be rewritten per instance without touching the class that
//!    sibling instances share.
//! 2. The class chain, starting at the object's current class.
//! 3. The object's [`Forwarder`], if it has one.
//!
//! A selector that none of these handles fails with
//! [`SendError::Unrecognized`].
//!
//! # Teardown
//!
//! When the last [`ObjectRef`] is dropped the object runs its teardown hooks
//! (see [`crate::teardown`]) and then releases its storage. Hooks get only the
//! [`ObjectId`]; instance state is not reachable from them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use rustc_hash::FxHashMap;

use crate::class::Class;
use crate::error::{SendError, SlotConflict};
use crate::forward::Forwarder;
use crate::imp::{ImpId, Method};
use crate::properties::PropertyTable;
use crate::selector::Selector;
use crate::teardown::TeardownHooks;
use crate::value::Value;

static NEXT_OBJECT: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an object. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ObjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "obj#{}", self.0)
	}
}

pub(crate) struct ObjectInner {
	pub(crate) id: ObjectId,
	isa: RwLock<Class>,
	overrides: RwLock<FxHashMap<Selector, Method>>,
	pub(crate) properties: Mutex<PropertyTable>,
	pub(crate) teardown: Mutex<TeardownHooks>,
	forwarder: Option<Arc<dyn Forwarder>>,
	sync: ReentrantMutex<()>,
}

impl Drop for ObjectInner {
	fn drop(&mut self) {
		let hooks = std::mem::take(self.teardown.get_mut());
		if !hooks.is_empty() {
			tracing::trace!(object = %self.id, hooks = hooks.len(), "running teardown hooks");
		}
		hooks.run(self.id);
	}
}

/// Strong reference to an object.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectInner>);

impl ObjectRef {
	/// Allocates an instance of `class`.
	pub fn new(class: &Class) -> Self {
		Self::alloc(class, None)
	}

	/// Allocates an instance whose unrecognized messages go to `forwarder`.
	pub fn with_forwarder(class: &Class, forwarder: Arc<dyn Forwarder>) -> Self {
		Self::alloc(class, Some(forwarder))
	}

	fn alloc(class: &Class, forwarder: Option<Arc<dyn Forwarder>>) -> Self {
		Self(Arc::new(ObjectInner {
			id: ObjectId(NEXT_OBJECT.fetch_add(1, Ordering::Relaxed)),
			isa: RwLock::new(class.clone()),
			overrides: RwLock::new(FxHashMap::default()),
			properties: Mutex::new(PropertyTable::default()),
			teardown: Mutex::new(TeardownHooks::default()),
			forwarder,
			sync: ReentrantMutex::new(()),
		}))
	}

	pub fn id(&self) -> ObjectId {
		self.0.id
	}

	pub(crate) fn inner(&self) -> &ObjectInner {
		&self.0
	}

	/// Current class of the instance.
	pub fn class(&self) -> Class {
		self.0.isa.read().clone()
	}

	/// Swaps the instance's class, returning the previous one.
	pub fn set_class(&self, class: &Class) -> Class {
		std::mem::replace(&mut *self.0.isa.write(), class.clone())
	}

	pub fn downgrade(&self) -> WeakObject {
		WeakObject {
			id: self.0.id,
			inner: Arc::downgrade(&self.0),
		}
	}

	pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}

	/// Runs `f` while holding the instance's re-entrant lock.
	pub fn synchronized<R>(&self, f: impl FnOnce() -> R) -> R {
		let _guard = self.0.sync.lock();
		f()
	}

	/// Resolves what a send of `selector` would execute, ignoring the
	/// forwarder.
	pub fn resolve(&self, selector: &Selector) -> Option<Method> {
		if let Some(method) = self.0.overrides.read().get(selector) {
			return Some(method.clone());
		}
		self.class().lookup(selector)
	}

	pub fn responds_to(&self, selector: &Selector) -> bool {
		self.resolve(selector).is_some()
			|| self
				.0
				.forwarder
				.as_ref()
				.is_some_and(|fwd| fwd.responds_to(selector))
	}

	/// Sends `selector` with positional `args`.
	pub fn send(&self, selector: &Selector, args: &[Value]) -> Result<Value, SendError> {
		if args.len() != selector.arity() {
			return Err(SendError::ArityMismatch {
				selector: selector.clone(),
				expected: selector.arity(),
				got: args.len(),
			});
		}
		if let Some(method) = self.resolve(selector) {
			return Ok(method.invoke(self, args));
		}
		match &self.0.forwarder {
			Some(fwd) => fwd.forward(self, selector, args),
			None => Err(SendError::Unrecognized {
				selector: selector.clone(),
				class: self.class().name().into(),
			}),
		}
	}

	/// Returns the per-instance override for `selector`.
	pub fn override_method(&self, selector: &Selector) -> Option<Method> {
		self.0.overrides.read().get(selector).cloned()
	}

	/// Unconditionally sets the per-instance override for `selector`.
	pub fn set_override(&self, selector: Selector, method: Method) -> Option<Method> {
		self.0.overrides.write().insert(selector, method)
	}

	pub fn remove_override(&self, selector: &Selector) -> Option<Method> {
		self.0.overrides.write().remove(selector)
	}

	/// Installs `method` as the per-instance override for `selector` only if
	/// dispatch currently resolves to `expected`.
	///
	/// The check and the store happen under the override write lock, so a
	/// concurrent writer that went through this method cannot interleave.
	pub fn compare_and_set_override(
		&self,
		selector: &Selector,
		expected: Option<ImpId>,
		method: Method,
	) -> Result<(), SlotConflict> {
		let mut overrides = self.0.overrides.write();
		let found = match overrides.get(selector) {
			Some(current) => Some(current.id()),
			None => self.class().lookup(selector).map(|m| m.id()),
		};
		if found != expected {
			return Err(SlotConflict {
				selector: selector.clone(),
				expected,
				found,
			});
		}
		overrides.insert(selector.clone(), method);
		Ok(())
	}

	/// Selectors with a per-instance override, in no particular order.
	pub fn overridden_selectors(&self) -> Vec<Selector> {
		self.0.overrides.read().keys().cloned().collect()
	}
}

impl PartialEq for ObjectRef {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ObjectRef")
			.field("id", &self.0.id)
			.field("class", &self.class().name())
			.finish_non_exhaustive()
	}
}

/// Non-owning reference to an object.
///
/// Keeps the identity around after the object is gone so callers can still
/// tell which object a stale reference pointed at.
#[derive(Clone)]
pub struct WeakObject {
	id: ObjectId,
	inner: Weak<ObjectInner>,
}

impl WeakObject {
	pub fn id(&self) -> ObjectId {
		self.id
	}

	/// Returns a strong reference if the object is still alive.
	///
	/// Fails once teardown has started.
	pub fn upgrade(&self) -> Option<ObjectRef> {
		self.inner.upgrade().map(ObjectRef)
	}

	pub fn is_alive(&self) -> bool {
		self.inner.strong_count() > 0
	}
}

impl fmt::Debug for WeakObject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WeakObject")
			.field("id", &self.id)
			.field("alive", &self.is_alive())
			.finish()
	}
}
