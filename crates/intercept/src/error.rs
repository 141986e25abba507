//! Interception error taxonomy.

use std::fmt;

use hookwire_object::{ObjectId, ReturnShape, Selector};
use thiserror::Error;

use crate::rewriter::ShimHandle;

/// Another mechanism that already owns a dispatch slot or the object's class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForeignMechanism {
	/// The slot holds a message-forwarding trampoline.
	MessageForwarding,
	/// The slot holds an implementation tagged by some other installer.
	ForeignShim,
	/// The object's class was swapped for a synthesized subclass.
	DynamicSubclass {
		class: Box<str>,
		/// True when the subclass was synthesized for property observation.
		property_observation: bool,
	},
}

impl fmt::Display for ForeignMechanism {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::MessageForwarding => f.write_str("message forwarding"),
			Self::ForeignShim => f.write_str("foreign shim"),
			Self::DynamicSubclass {
				class,
				property_observation: true,
			} => write!(f, "property observation subclass {class}"),
			Self::DynamicSubclass { class, .. } => write!(f, "synthesized subclass {class}"),
		}
	}
}

/// Errors reported by the interception runtime.
#[derive(Debug, Clone, Error)]
pub enum InterceptError {
	/// The slot already dispatches through this runtime's shim.
	#[error("{selector} is already intercepted on {}", handle.object_id())]
	AlreadyIntercepted { selector: Selector, handle: ShimHandle },

	#[error("{selector} is already rewritten by {mechanism}")]
	IncompatibleForeignInterception {
		selector: Selector,
		mechanism: ForeignMechanism,
	},

	#[error("{selector} returns {shape:?}, which cannot be observed")]
	UnsupportedReturnShape { selector: Selector, shape: ReturnShape },

	/// The slot changed between the check and the commit.
	#[error("dispatch slot for {selector} on {object} changed during rewrite")]
	ThreadingHazard { selector: Selector, object: ObjectId },

	#[error("{class} does not implement {selector}")]
	SelectorNotImplemented { selector: Selector, class: Box<str> },

	#[error("{selector} is reserved and cannot be intercepted")]
	ReservedSelector { selector: Selector },

	#[error("target object was deallocated")]
	ObjectDeallocated,
}

impl InterceptError {
	/// Returns true if the caller can carry on without the interception,
	/// e.g. by not subscribing.
	pub fn is_recoverable(&self) -> bool {
		!matches!(self, Self::ThreadingHazard { .. })
	}

	/// The handle of an existing shim, for [`Self::AlreadyIntercepted`].
	pub fn existing_handle(&self) -> Option<&ShimHandle> {
		match self {
			Self::AlreadyIntercepted { handle, .. } => Some(handle),
			_ => None,
		}
	}

	pub fn selector(&self) -> Option<&Selector> {
		match self {
			Self::AlreadyIntercepted { selector, .. }
			| Self::IncompatibleForeignInterception { selector, .. }
			| Self::UnsupportedReturnShape { selector, .. }
			| Self::ThreadingHazard { selector, .. }
			| Self::SelectorNotImplemented { selector, .. }
			| Self::ReservedSelector { selector } => Some(selector),
			Self::ObjectDeallocated => None,
		}
	}
}

pub type Result<T> = std::result::Result<T, InterceptError>;
