//! Fallback handling for messages an object has no method for.

use crate::error::SendError;
use crate::object::ObjectRef;
use crate::selector::Selector;
use crate::value::Value;

/// Receives every message the receiver's own dispatch path does not handle.
pub trait Forwarder: Send + Sync {
	/// Reports whether `selector` would be handled.
	fn responds_to(&self, selector: &Selector) -> bool;

	/// Handles a message on behalf of `receiver`.
	fn forward(&self, receiver: &ObjectRef, selector: &Selector, args: &[Value]) -> Result<Value, SendError>;
}
