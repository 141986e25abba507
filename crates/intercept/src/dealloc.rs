//! Deallocation notification.
//!
//! Teardown is not a message, so it is observed through a final-phase
//! teardown hook instead of a dispatch rewrite. The callback runs after every
//! early hook (including interceptor cleanup) and gets only the object's id.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use hookwire_object::{ObjectId, ObjectRef, TargetRef, TeardownPhase, TeardownToken};
use parking_lot::Mutex;
use tracing::{debug, trace};

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const DISPOSED: u8 = 2;

/// One-shot deallocation callback registration.
///
/// The callback fires at most once, and never after [`Self::dispose`].
/// Dropping the handle without disposing releases a retained target but
/// leaves the callback armed.
pub struct DeallocationObserver {
	object: ObjectId,
	token: TeardownToken,
	state: Arc<AtomicU8>,
	target: Mutex<Option<TargetRef>>,
}

impl DeallocationObserver {
	/// Arms `callback` for when `object` is torn down. With `retain_target`
	/// the handle keeps the object alive until it is disposed or dropped.
	pub fn observe_deallocation(
		object: &ObjectRef,
		retain_target: bool,
		callback: impl FnOnce(ObjectId) + Send + 'static,
	) -> Self {
		let state = Arc::new(AtomicU8::new(ARMED));
		let hook_state = state.clone();
		let token = object.add_teardown_hook(TeardownPhase::Final, move |id| {
			if hook_state
				.compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
				.is_ok()
			{
				trace!(object = %id, "deallocation observed");
				callback(id);
			}
		});
		debug!(object = %object.id(), retain_target, "observing deallocation");

		Self {
			object: object.id(),
			token,
			state,
			target: Mutex::new(Some(TargetRef::new(object, retain_target))),
		}
	}

	pub fn object_id(&self) -> ObjectId {
		self.object
	}

	pub fn has_fired(&self) -> bool {
		self.state.load(Ordering::Acquire) == FIRED
	}

	pub fn is_disposed(&self) -> bool {
		self.state.load(Ordering::Acquire) == DISPOSED
	}

	/// Disarms the callback and releases the target. A no-op once the
	/// callback has fired.
	pub fn dispose(&self) {
		let disarmed = self
			.state
			.compare_exchange(ARMED, DISPOSED, Ordering::AcqRel, Ordering::Acquire)
			.is_ok();
		let target = self.target.lock().take();
		if disarmed && let Some(object) = target.as_ref().and_then(TargetRef::upgrade) {
			object.remove_teardown_hook(self.token);
			debug!(object = %self.object, "disposed deallocation observer");
		}
		drop(target);
	}
}

impl std::fmt::Debug for DeallocationObserver {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = match self.state.load(Ordering::Acquire) {
			ARMED => "armed",
			FIRED => "fired",
			_ => "disposed",
		};
		f.debug_struct("DeallocationObserver")
			.field("object", &self.object)
			.field("state", &state)
			.finish()
	}
}
