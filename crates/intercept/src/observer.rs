//! Message observers and the lists that hold them.
//!
//! An [`ObserverSet`] is read on every intercepted call and written only on
//! subscribe and unsubscribe. Reads load an [`ArcSwap`] snapshot without
//! locking; writes copy the list under a mutex and publish the copy. A call
//! already in flight keeps the snapshot it loaded, so a concurrent
//! unsubscribe never blocks it and never shortens the list it is iterating.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use hookwire_object::{ImpId, Value};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;


/// When an observer is notified relative to the original implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
	/// Before the original runs.
	Before,
	/// After the original returns. Only defined for void selectors.
	After,
}

/// Receives notifications for one intercepted selector.
///
/// Only the method matching the subscription's [`Phase`] is called for a
/// message. Callbacks run synchronously on the sending thread with no runtime
/// lock held, so they may subscribe, unsubscribe, or send further messages.
pub trait MessageObserver: Send + Sync {
	/// Called with the arguments before the original runs.
	fn message_sent(&self, _args: &[Value]) {}

	/// Called with the arguments after a void original returns.
	fn method_invoked(&self, _args: &[Value]) {}

	/// Called once when the observed object goes away.
	fn completed(&self) {}

	/// Shim this observer was created for. Records whose shim differs skip it.
	fn target_implementation(&self) -> Option<ImpId> {
		None
	}
}

/// Closure adapter for [`MessageObserver`].
///
/// The closure runs for whichever phase the observer is subscribed to.
pub struct FnObserver<F>(F);

impl<F> FnObserver<F>
where
	F: Fn(&[Value]) + Send + Sync + 'static,
{
	pub fn new(f: F) -> Self {
		Self(f)
	}
}

impl<F> MessageObserver for FnObserver<F>
where
	F: Fn(&[Value]) + Send + Sync + 'static,
{
	fn message_sent(&self, args: &[Value]) {
		(self.0)(args);
	}

	fn method_invoked(&self, args: &[Value]) {
		(self.0)(args);
	}
}

/// Wraps a closure as a shareable observer.
pub fn observer_fn(f: impl Fn(&[Value]) + Send + Sync + 'static) -> Arc<dyn MessageObserver> {
	Arc::new(FnObserver::new(f))
}

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Identity of one registration in an [`ObserverSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
	fn next() -> Self {
		Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
	}

	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for SubscriptionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "sub#{}", self.0)
	}
}

#[derive(Clone)]
pub(crate) struct Entry {
	pub(crate) id: SubscriptionId,
	pub(crate) observer: Arc<dyn MessageObserver>,
}

impl Entry {
	fn accepts(&self, shim: Option<ImpId>) -> bool {
		match (self.observer.target_implementation(), shim) {
			(Some(target), Some(shim)) => target == shim,
			_ => true,
		}
	}
}

/// Ordered observer list with lock-free reads.
pub(crate) struct ObserverSet {
	entries: ArcSwap<Vec<Entry>>,
	write: Mutex<()>,
}

impl Default for ObserverSet {
	fn default() -> Self {
		Self {
			entries: ArcSwap::from_pointee(Vec::new()),
			write: Mutex::new(()),
		}
	}
}

impl ObserverSet {
	pub(crate) fn add(&self, observer: Arc<dyn MessageObserver>) -> SubscriptionId {
		let id = SubscriptionId::next();
		let _guard = self.write.lock();
		let mut next = Vec::clone(&self.entries.load());
		next.push(Entry { id, observer });
		self.entries.store(Arc::new(next));
		id
	}

	/// Removes `id`. Returns false if it was not present.
	pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
		let _guard = self.write.lock();
		let current = self.entries.load_full();
		let Some(pos) = current.iter().position(|e| e.id == id) else {
			return false;
		};
		let mut next = Vec::clone(&current);
		next.remove(pos);
		self.entries.store(Arc::new(next));
		true
	}

	/// Empties the set, returning what it held.
	pub(crate) fn drain(&self) -> Vec<Entry> {
		let _guard = self.write.lock();
		let taken = self.entries.swap(Arc::new(Vec::new()));
		Vec::clone(&taken)
	}

	pub(crate) fn snapshot(&self) -> Arc<Vec<Entry>> {
		self.entries.load_full()
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.load().len()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.entries.load().is_empty()
	}

	pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
		self.entries.load().iter().any(|e| e.id == id)
	}

	/// Calls [`MessageObserver::message_sent`] on each accepted observer.
	pub(crate) fn notify_sent(&self, args: &[Value], shim: Option<ImpId>) {
		for entry in self.snapshot().iter().filter(|e| e.accepts(shim)) {
			entry.observer.message_sent(args);
		}
	}

	/// Calls [`MessageObserver::method_invoked`] on each accepted observer.
	pub(crate) fn notify_invoked(&self, args: &[Value], shim: Option<ImpId>) {
		for entry in self.snapshot().iter().filter(|e| e.accepts(shim)) {
			entry.observer.method_invoked(args);
		}
	}
}

/// Drains every set and calls [`MessageObserver::completed`] once per
/// distinct observer, in registration order of first appearance.
pub(crate) fn complete_all<'a>(sets: impl IntoIterator<Item = &'a ObserverSet>) -> usize {
	let mut seen = FxHashSet::default();
	let mut completed = 0;
	for set in sets {
		for entry in set.drain() {
			let addr = Arc::as_ptr(&entry.observer).cast::<()>() as usize;
			if seen.insert(addr) {
				entry.observer.completed();
				completed += 1;
			}
		}
	}
	completed
}
