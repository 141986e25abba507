//! Named properties and their change notifications.
//!
//! Property observers are the object model's own change-notification
//! mechanism, independent of method dispatch. Writes through
//! [`ObjectRef::set_property`] notify observers registered for that key.
//!
//! Callbacks run on the writing thread with no object lock held.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::object::ObjectRef;
use crate::value::Value;

bitflags::bitflags! {
	/// What a property observer wants delivered.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct ObservingOptions: u8 {
		/// Include the new value in change notifications.
		const NEW = 1 << 0;
		/// Include the old value in change notifications.
		const OLD = 1 << 1;
		/// Notify once with the current value at registration.
		const INITIAL = 1 << 2;
		/// Notify before each change as well as after.
		const PRIOR = 1 << 3;
	}
}

/// One change notification.
#[derive(Debug, Clone)]
pub struct PropertyChange {
	pub key: Arc<str>,
	/// Present when [`ObservingOptions::OLD`] was requested.
	pub old: Option<Value>,
	/// Present when [`ObservingOptions::NEW`] or [`ObservingOptions::INITIAL`]
	/// applies. Never set on prior notifications.
	pub new: Option<Value>,
	/// Set on the notification sent before the value changes.
	pub is_prior: bool,
}

/// Property change callback. Receives the object that changed.
pub type PropertyCallback = Arc<dyn Fn(&ObjectRef, &PropertyChange) + Send + Sync>;

/// Registration handle returned by [`ObjectRef::add_property_observer`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObservationToken {
	key: Arc<str>,
	id: u64,
}

impl ObservationToken {
	pub fn key(&self) -> &str {
		&self.key
	}
}

#[derive(Clone)]
struct Registration {
	id: u64,
	options: ObservingOptions,
	callback: PropertyCallback,
}

#[derive(Default)]
pub(crate) struct PropertyTable {
	values: FxHashMap<Arc<str>, Value>,
	observers: FxHashMap<Arc<str>, Vec<Registration>>,
	next: u64,
}

impl PropertyTable {
	fn key(&self, key: &str) -> Arc<str> {
		self.values
			.get_key_value(key)
			.map(|(k, _)| k.clone())
			.or_else(|| self.observers.get_key_value(key).map(|(k, _)| k.clone()))
			.unwrap_or_else(|| Arc::from(key))
	}

	fn snapshot(&self, key: &str) -> Vec<Registration> {
		self.observers.get(key).cloned().unwrap_or_default()
	}
}

impl ObjectRef {
	/// Reads a property. Unset properties read as [`Value::Nil`].
	pub fn property(&self, key: &str) -> Value {
		self.inner()
			.properties
			.lock()
			.values
			.get(key)
			.cloned()
			.unwrap_or(Value::Nil)
	}

	/// Reads a dotted key path, following object-valued properties.
	///
	/// A path that runs through a non-object value reads as [`Value::Nil`].
	pub fn value_for_key_path(&self, path: &str) -> Value {
		let mut parts = path.split('.');
		let Some(first) = parts.next() else {
			return Value::Nil;
		};
		let mut value = self.property(first);
		for part in parts {
			value = match value {
				Value::Object(next) => next.property(part),
				_ => return Value::Nil,
			};
		}
		value
	}

	/// Writes a property and notifies its observers.
	pub fn set_property(&self, key: &str, value: Value) {
		let (key, observers, old) = {
			let table = self.inner().properties.lock();
			let key = table.key(key);
			let observers = table.snapshot(&key);
			let old = table.values.get(&key).cloned();
			(key, observers, old)
		};

		for reg in observers.iter().filter(|r| r.options.contains(ObservingOptions::PRIOR)) {
			let change = PropertyChange {
				key: key.clone(),
				old: reg
					.options
					.contains(ObservingOptions::OLD)
					.then(|| old.clone().unwrap_or(Value::Nil)),
				new: None,
				is_prior: true,
			};
			(reg.callback)(self, &change);
		}

		let old = self
			.inner()
			.properties
			.lock()
			.values
			.insert(key.clone(), value.clone());

		for reg in &observers {
			let change = PropertyChange {
				key: key.clone(),
				old: reg
					.options
					.contains(ObservingOptions::OLD)
					.then(|| old.clone().unwrap_or(Value::Nil)),
				new: reg.options.contains(ObservingOptions::NEW).then(|| value.clone()),
				is_prior: false,
			};
			(reg.callback)(self, &change);
		}
	}

	/// Registers `callback` for changes of `key`.
	///
	/// With [`ObservingOptions::INITIAL`] the callback runs once before this
	/// returns.
	pub fn add_property_observer(
		&self,
		key: &str,
		options: ObservingOptions,
		callback: PropertyCallback,
	) -> ObservationToken {
		let (token, current) = {
			let mut table = self.inner().properties.lock();
			let key = table.key(key);
			table.next += 1;
			let id = table.next;
			table.observers.entry(key.clone()).or_default().push(Registration {
				id,
				options,
				callback: callback.clone(),
			});
			let current = table.values.get(&key).cloned().unwrap_or(Value::Nil);
			(ObservationToken { key, id }, current)
		};

		if options.contains(ObservingOptions::INITIAL) {
			let change = PropertyChange {
				key: token.key.clone(),
				old: None,
				new: Some(current),
				is_prior: false,
			};
			callback(self, &change);
		}
		token
	}

	/// Unregisters an observer. Returns false if it was not registered.
	pub fn remove_property_observer(&self, token: &ObservationToken) -> bool {
		let mut table = self.inner().properties.lock();
		let Some(list) = table.observers.get_mut(&token.key) else {
			return false;
		};
		let before = list.len();
		list.retain(|r| r.id != token.id);
		let removed = list.len() != before;
		if list.is_empty() {
			table.observers.remove(&token.key);
		}
		removed
	}

	/// Number of observers registered for `key`.
	pub fn property_observer_count(&self, key: &str) -> usize {
		self.inner()
			.properties
			.lock()
			.observers
			.get(key)
			.map_or(0, Vec::len)
	}
}
