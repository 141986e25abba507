//! Property change observation with an owned lifetime.
//!
//! [`PropertyObserver`] wraps the object's property notification hooks in a
//! handle that unregisters on [`PropertyObserver::dispose`] or on drop. The
//! observed object is held weakly unless the caller asks to retain it.
//!
//! A dotted key path is observed along its whole length: every component that
//! currently resolves to an object carries its own registration, and when an
//! intermediate value is replaced the registrations below it move to the new
//! object.

use std::sync::{Arc, Weak};

use hookwire_object::{
	ObjectRef, ObservationToken, ObservingOptions, PropertyCallback, PropertyChange, TargetRef, Value,
	WeakObject,
};
use parking_lot::Mutex;
use tracing::{debug, trace};

struct Link {
	object: WeakObject,
	token: ObservationToken,
}

/// Registrations along one key path. `links[i]` observes `components[i]`.
/// `None` once disposed.
struct PathChain {
	components: Box<[Arc<str>]>,
	options: ObservingOptions,
	callback: Box<dyn Fn(Value) + Send + Sync>,
	links: Mutex<Option<Vec<Link>>>,
}

impl PathChain {
	fn last(&self) -> usize {
		self.components.len() - 1
	}

	fn callback_for(self: &Arc<Self>, level: usize) -> PropertyCallback {
		let chain: Weak<Self> = Arc::downgrade(self);
		Arc::new(move |object: &ObjectRef, change: &PropertyChange| {
			if let Some(chain) = chain.upgrade() {
				chain.changed(level, object, change);
			}
		})
	}

	/// Registers on each object reachable from `value`, starting at `level`.
	fn link_from(self: &Arc<Self>, links: &mut Vec<Link>, mut level: usize, mut value: Value) {
		while level < self.components.len() {
			let Value::Object(next) = value else {
				break;
			};
			let key = &self.components[level];
			let token = next.add_property_observer(key, self.options, self.callback_for(level));
			value = next.property(key);
			links.push(Link {
				object: next.downgrade(),
				token,
			});
			level += 1;
		}
	}

	fn unlink(links: impl IntoIterator<Item = Link>) {
		for link in links {
			if let Some(object) = link.object.upgrade() {
				object.remove_property_observer(&link.token);
			}
		}
	}

	fn changed(self: &Arc<Self>, level: usize, object: &ObjectRef, change: &PropertyChange) {
		{
			let mut guard = self.links.lock();
			let Some(links) = guard.as_mut() else {
				return;
			};
			if !links.get(level).is_some_and(|l| l.object.id() == object.id()) {
				return;
			}
			if level < self.last() && !change.is_prior {
				let stale: Vec<_> = links.drain(level + 1..).collect();
				Self::unlink(stale);
				let child = object.property(&self.components[level]);
				self.link_from(links, level + 1, child);
				trace!(object = %object.id(), level, depth = links.len(), "key path relinked");
			}
		}

		let requested = if change.is_prior {
			change.old.as_ref()
		} else {
			change.new.as_ref()
		};
		let value = match requested {
			None => Value::Nil,
			Some(value) if level == self.last() => value.clone(),
			Some(_) => object.value_for_key_path(&self.components[level..].join(".")),
		};
		trace!(object = %object.id(), key = %change.key, prior = change.is_prior, "property changed");
		(self.callback)(value);
	}
}

struct Registration {
	target: TargetRef,
	chain: Arc<PathChain>,
}

/// Disposable observation of one key path.
pub struct PropertyObserver {
	key_path: Arc<str>,
	registration: Mutex<Option<Registration>>,
}

impl PropertyObserver {
	/// Starts observing `key_path` on `object`.
	///
	/// The callback receives the value at `key_path` for each notification:
	/// the new value for a change, the old value for a prior notification,
	/// and the current value for the initial one. A notification whose value
	/// was not requested through `options` delivers [`Value::Nil`].
	pub fn observe_property(
		object: &ObjectRef,
		retain_target: bool,
		key_path: &str,
		options: ObservingOptions,
		callback: impl Fn(Value) + Send + Sync + 'static,
	) -> Self {
		let key_path: Arc<str> = Arc::from(key_path);
		let chain = Arc::new(PathChain {
			components: key_path.split('.').map(Arc::from).collect(),
			options: options.difference(ObservingOptions::INITIAL),
			callback: Box::new(callback),
			links: Mutex::new(Some(Vec::new())),
		});
		if let Some(links) = chain.links.lock().as_mut() {
			chain.link_from(links, 0, Value::Object(object.clone()));
		}
		debug!(object = %object.id(), %key_path, retain_target, "observing property");

		if options.contains(ObservingOptions::INITIAL) {
			(chain.callback)(object.value_for_key_path(&key_path));
		}

		Self {
			key_path,
			registration: Mutex::new(Some(Registration {
				target: TargetRef::new(object, retain_target),
				chain,
			})),
		}
	}

	pub fn key_path(&self) -> &str {
		&self.key_path
	}

	pub fn is_disposed(&self) -> bool {
		self.registration.lock().is_none()
	}

	/// Stops observing. Safe to call more than once, during the target's
	/// teardown, and after the target is gone.
	pub fn dispose(&self) {
		let Some(registration) = self.registration.lock().take() else {
			return;
		};
		let links = registration.chain.links.lock().take().unwrap_or_default();
		PathChain::unlink(links);
		debug!(object = %registration.target.id(), key_path = %self.key_path, "disposed property observer");
	}
}

impl Drop for PropertyObserver {
	fn drop(&mut self) {
		self.dispose();
	}
}

impl std::fmt::Debug for PropertyObserver {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PropertyObserver")
			.field("key_path", &self.key_path)
			.field("disposed", &self.is_disposed())
			.finish()
	}
}
