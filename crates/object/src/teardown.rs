//! Object teardown hooks.
//!
//! Teardown is not a message send: it runs from the destructor of the last
//! strong reference and cannot be rewritten through method tables. Instead,
//! interested parties register hooks in one of two phases:
//!
//! - [`TeardownPhase::Early`] hooks run first, in registration order.
//! - [`TeardownPhase::Final`] hooks run after every early hook, in
//!   registration order, immediately before storage is released.
//!
//! Each hook runs at most once and receives only the [`ObjectId`]. The object
//! cannot be upgraded from a weak reference while its hooks run.

use crate::object::{ObjectId, ObjectRef};

type Hook = Box<dyn FnOnce(ObjectId) + Send>;

/// Ordering class for a teardown hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeardownPhase {
	Early,
	Final,
}

/// Handle for removing a registered hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TeardownToken {
	id: u64,
	phase: TeardownPhase,
}

impl TeardownToken {
	pub fn phase(&self) -> TeardownPhase {
		self.phase
	}
}

#[derive(Default)]
pub(crate) struct TeardownHooks {
	next: u64,
	early: Vec<(u64, Hook)>,
	last: Vec<(u64, Hook)>,
}

impl TeardownHooks {
	fn push(&mut self, phase: TeardownPhase, hook: Hook) -> TeardownToken {
		self.next += 1;
		let id = self.next;
		match phase {
			TeardownPhase::Early => self.early.push((id, hook)),
			TeardownPhase::Final => self.last.push((id, hook)),
		}
		TeardownToken { id, phase }
	}

	fn remove(&mut self, token: TeardownToken) -> bool {
		let list = match token.phase {
			TeardownPhase::Early => &mut self.early,
			TeardownPhase::Final => &mut self.last,
		};
		match list.iter().position(|(id, _)| *id == token.id) {
			Some(pos) => {
				let _hook = list.remove(pos);
				true
			}
			None => false,
		}
	}

	fn count(&self, phase: TeardownPhase) -> usize {
		match phase {
			TeardownPhase::Early => self.early.len(),
			TeardownPhase::Final => self.last.len(),
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.early.len() + self.last.len()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub(crate) fn run(self, id: ObjectId) {
		for (_, hook) in self.early {
			hook(id);
		}
		for (_, hook) in self.last {
			hook(id);
		}
	}
}

impl ObjectRef {
	/// Registers `hook` to run when this object is torn down.
	pub fn add_teardown_hook(
		&self,
		phase: TeardownPhase,
		hook: impl FnOnce(ObjectId) + Send + 'static,
	) -> TeardownToken {
		self.inner().teardown.lock().push(phase, Box::new(hook))
	}

	/// Unregisters a hook. Returns false if it was already removed.
	pub fn remove_teardown_hook(&self, token: TeardownToken) -> bool {
		self.inner().teardown.lock().remove(token)
	}

	/// Number of pending hooks in `phase`.
	pub fn teardown_hook_count(&self, phase: TeardownPhase) -> usize {
		self.inner().teardown.lock().count(phase)
	}
}
