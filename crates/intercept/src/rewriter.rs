//! Dispatch slot rewriting.
//!
//! [`DispatchRewriter`] replaces what an object runs for a selector with a
//! shim that notifies observers and calls through to the captured original.
//! Rewrites are per instance: the shim goes in the object's override map and
//! the class, shared with sibling instances, is never modified.
//!
//! # Ownership of a slot
//!
//! A slot may already be rewritten when we arrive. The rewriter tells these
//! cases apart by looking at the implementation currently in the slot:
//!
//! - Our own shim (its cookie is an [`InterceptionRecord`]) is reused, never
//!   wrapped again.
//! - A forwarding trampoline or an implementation tagged by another installer
//!   belongs to someone else, and we refuse to stack on top of it.
//! - An instance whose class was synthesized by another mechanism is refused
//!   outright. That mechanism owns the isa and may swap it back.
//!
//! # Commit
//!
//! Checks run under the object lock and then the class lock. The final store
//! goes through [`ObjectRef::compare_and_set_override`] so that a writer
//! which bypasses those locks is still detected. That case is a threading
//! hazard and is handled according to [`crate::config::hazard_policy`].

use std::fmt;
use std::sync::Arc;

use hookwire_object::{
	Class, ImpId, ImpKind, KEY_VALUE_OBSERVING, Method, ObjectId, ObjectRef, Selector, SlotConflict,
};
use tracing::{debug, error, trace, warn};

use crate::config::{HazardPolicy, hazard_policy};
use crate::error::{ForeignMechanism, InterceptError, Result};
use crate::record::{InterceptionRecord, RecordKey};


/// Handle to an installed shim.
#[derive(Clone)]
pub struct ShimHandle {
	record: Arc<InterceptionRecord>,
}

impl ShimHandle {
	pub fn shim_id(&self) -> Option<ImpId> {
		self.record.shim_id()
	}

	pub fn selector(&self) -> &Selector {
		self.record.selector()
	}

	pub fn object_id(&self) -> ObjectId {
		self.record.object_id()
	}

	pub fn is_void(&self) -> bool {
		self.record.is_void()
	}

	pub fn arity(&self) -> usize {
		self.record.arity()
	}

	/// Implementation the shim calls through to.
	pub fn original(&self) -> &Method {
		self.record.original()
	}

	pub(crate) fn record(&self) -> &Arc<InterceptionRecord> {
		&self.record
	}

	/// Returns true if both handles refer to the same shim.
	pub fn same_shim(&self, other: &ShimHandle) -> bool {
		Arc::ptr_eq(&self.record, &other.record)
	}
}

impl fmt::Debug for ShimHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ShimHandle")
			.field("key", self.record.key())
			.field("shim", &self.record.shim_id())
			.finish()
	}
}

#[cfg(test)]
type CommitHook = Box<dyn Fn(&ObjectRef, &Selector) + Send + Sync>;

/// Installs interception shims into per-instance dispatch slots.
#[derive(Default)]
pub struct DispatchRewriter {
	/// Runs between the checks and the commit.
	#[cfg(test)]
	before_commit: Option<CommitHook>,
}

impl DispatchRewriter {
	pub fn new() -> Self {
		Self::default()
	}

	#[cfg(test)]
	pub(crate) fn with_before_commit(hook: impl Fn(&ObjectRef, &Selector) + Send + Sync + 'static) -> Self {
		Self {
			before_commit: Some(Box::new(hook)),
		}
	}

	/// Ensures `selector` on `object` dispatches through a shim, installing
	/// one if needed. An existing shim is returned as is.
	pub fn ensure_observing(&self, object: &ObjectRef, selector: &Selector) -> Result<ShimHandle> {
		match self.install(object, selector) {
			Err(InterceptError::AlreadyIntercepted { handle, .. }) => {
				trace!(object = %object.id(), %selector, "reusing installed shim");
				Ok(handle)
			}
			other => other,
		}
	}

	/// Installs a fresh shim.
	///
	/// Unlike [`Self::ensure_observing`], an existing shim is reported as
	/// [`InterceptError::AlreadyIntercepted`].
	pub fn install(&self, object: &ObjectRef, selector: &Selector) -> Result<ShimHandle> {
		if selector.is_internal() || selector.is_dealloc() {
			return Err(InterceptError::ReservedSelector {
				selector: selector.clone(),
			});
		}

		object.synchronized(|| {
			let class = object.class();
			class.synchronized(|| self.install_locked(object, &class, selector))
		})
	}

	/// Returns the shim installed for `selector` on `object`, if any.
	pub fn installed(&self, object: &ObjectRef, selector: &Selector) -> Option<ShimHandle> {
		let method = object.override_method(selector)?;
		let record = method.imp.cookie_as::<InterceptionRecord>()?;
		(record.object_id() == object.id()).then_some(ShimHandle { record })
	}

	#[cfg(test)]
	fn before_commit(&self, object: &ObjectRef, selector: &Selector) {
		if let Some(hook) = &self.before_commit {
			hook(object, selector);
		}
	}

	#[cfg(not(test))]
	fn before_commit(&self, _object: &ObjectRef, _selector: &Selector) {}

	fn install_locked(&self, object: &ObjectRef, class: &Class, selector: &Selector) -> Result<ShimHandle> {
		if let Some(mechanism) = class.synthesized_by() {
			let mechanism = ForeignMechanism::DynamicSubclass {
				class: class.name().into(),
				property_observation: mechanism == KEY_VALUE_OBSERVING,
			};
			return Err(foreign(object, selector, mechanism));
		}

		let current = object
			.resolve(selector)
			.ok_or_else(|| InterceptError::SelectorNotImplemented {
				selector: selector.clone(),
				class: class.name().into(),
			})?;

		if let Some(record) = current.imp.cookie_as::<InterceptionRecord>() {
			if record.object_id() == object.id() {
				return Err(InterceptError::AlreadyIntercepted {
					selector: selector.clone(),
					handle: ShimHandle { record },
				});
			}
			// A shim of ours that was copied into another object's slot.
			return Err(foreign(object, selector, ForeignMechanism::ForeignShim));
		}
		if current.imp.kind() == ImpKind::Forwarding {
			return Err(foreign(object, selector, ForeignMechanism::MessageForwarding));
		}
		if current.imp.cookie().is_some() {
			return Err(foreign(object, selector, ForeignMechanism::ForeignShim));
		}

		let shape = current.signature.returns;
		if !shape.is_transparent() {
			return Err(InterceptError::UnsupportedReturnShape {
				selector: selector.clone(),
				shape,
			});
		}

		let key = RecordKey {
			object: object.id(),
			selector: selector.clone(),
		};
		let record = Arc::new(InterceptionRecord::new(key, current.clone()));
		let shim = InterceptionRecord::build_shim(&record);

		self.before_commit(object, selector);
		if let Err(conflict) = object.compare_and_set_override(selector, Some(current.id()), shim) {
			return Err(threading_hazard(object, conflict));
		}
		object.set_override(selector.namespaced(), current);

		debug!(
			object = %object.id(),
			class = class.name(),
			%selector,
			original = %record.original().id(),
			shim = ?record.shim_id(),
			"installed interception shim"
		);
		Ok(ShimHandle { record })
	}
}

fn foreign(object: &ObjectRef, selector: &Selector, mechanism: ForeignMechanism) -> InterceptError {
	warn!(object = %object.id(), %selector, %mechanism, "slot owned by another mechanism");
	InterceptError::IncompatibleForeignInterception {
		selector: selector.clone(),
		mechanism,
	}
}

fn threading_hazard(object: &ObjectRef, conflict: SlotConflict) -> InterceptError {
	error!(
		object = %object.id(),
		selector = %conflict.selector,
		expected = ?conflict.expected,
		found = ?conflict.found,
		"dispatch slot changed during rewrite"
	);
	if hazard_policy() == HazardPolicy::Abort {
		error!("aborting on threading hazard");
		std::process::abort();
	}
	InterceptError::ThreadingHazard {
		selector: conflict.selector,
		object: object.id(),
	}
}
