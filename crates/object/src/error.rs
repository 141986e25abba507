//! Error types for message sends and slot updates.

use thiserror::Error;

use crate::imp::ImpId;
use crate::selector::Selector;

/// Errors raised by [`ObjectRef::send`](crate::ObjectRef::send).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
	/// Nothing along the dispatch path handles the selector.
	#[error("{class} does not recognize selector {selector}")]
	Unrecognized {
		selector: Selector,
		class: Box<str>,
	},

	/// The argument count disagrees with the selector's arity.
	#[error("selector {selector} takes {expected} argument(s), got {got}")]
	ArityMismatch {
		selector: Selector,
		expected: usize,
		got: usize,
	},
}

/// A compare-and-set on a dispatch slot found something other than what the
/// caller expected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dispatch slot for {selector} changed: expected {expected:?}, found {found:?}")]
pub struct SlotConflict {
	pub selector: Selector,
	pub expected: Option<ImpId>,
	pub found: Option<ImpId>,
}
