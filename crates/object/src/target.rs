//! Back-references that are weak unless explicitly promoted.

use crate::object::{ObjectId, ObjectRef, WeakObject};

/// Reference to an object that is either borrowed or owned.
#[derive(Debug, Clone)]
pub enum TargetRef {
	/// Does not keep the object alive.
	Weak(WeakObject),
	/// Keeps the object alive until this reference is dropped.
	Owning(ObjectRef),
}

impl TargetRef {
	/// Builds an owning reference when `retain` is set, a weak one otherwise.
	pub fn new(object: &ObjectRef, retain: bool) -> Self {
		if retain {
			Self::Owning(object.clone())
		} else {
			Self::Weak(object.downgrade())
		}
	}

	pub fn id(&self) -> ObjectId {
		match self {
			Self::Weak(weak) => weak.id(),
			Self::Owning(object) => object.id(),
		}
	}

	pub fn is_owning(&self) -> bool {
		matches!(self, Self::Owning(_))
	}

	/// Returns a strong reference if the object is still alive.
	pub fn upgrade(&self) -> Option<ObjectRef> {
		match self {
			Self::Weak(weak) => weak.upgrade(),
			Self::Owning(object) => Some(object.clone()),
		}
	}
}
