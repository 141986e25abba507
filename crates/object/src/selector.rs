//! Message selectors.
//!
//! A [`Selector`] names a message independently of any receiver. Arity is
//! encoded in the name the way keyword messages spell it: one argument per
//! `:` (`tableView:didSelectRow:` takes two arguments, `reload` takes none).
//!
//! Names starting with [`INTERNAL_PREFIX`] are reserved for the interception
//! runtime, which stores captured originals under them.

use std::borrow::Borrow;
use std::fmt;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

/// Reserved name prefix for runtime-internal selectors.
pub const INTERNAL_PREFIX: &str = "_hookwire_";

/// Name of the teardown message. It is never dispatched through method tables.
pub const DEALLOC: &str = "dealloc";

static INTERNED: LazyLock<Mutex<FxHashSet<Arc<str>>>> = LazyLock::new(Default::default);

fn intern(name: &str) -> Arc<str> {
	let mut table = INTERNED.lock();
	if let Some(existing) = table.get(name) {
		return existing.clone();
	}
	let name: Arc<str> = Arc::from(name);
	table.insert(name.clone());
	name
}

/// Interned message name.
///
/// Equality and hashing go through the name, so two selectors built from the
/// same string are interchangeable.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(Arc<str>);

impl Selector {
	/// Interns `name` and returns its selector.
	pub fn new(name: &str) -> Self {
		Self(intern(name))
	}

	/// Returns the teardown selector.
	pub fn dealloc() -> Self {
		Self::new(DEALLOC)
	}

	/// Returns the selector name.
	pub fn name(&self) -> &str {
		&self.0
	}

	/// Number of arguments the message takes.
	pub fn arity(&self) -> usize {
		self.0.bytes().filter(|b| *b == b':').count()
	}

	/// Returns true for names in the reserved runtime namespace.
	pub fn is_internal(&self) -> bool {
		self.0.starts_with(INTERNAL_PREFIX)
	}

	/// Returns true for the teardown selector.
	pub fn is_dealloc(&self) -> bool {
		&*self.0 == DEALLOC
	}

	/// Returns the reserved twin of this selector.
	///
	/// Namespacing an already internal selector returns it unchanged.
	pub fn namespaced(&self) -> Self {
		if self.is_internal() {
			return self.clone();
		}
		Self::new(&format!("{INTERNAL_PREFIX}{}", self.0))
	}

	/// Strips the reserved prefix, if present.
	pub fn public(&self) -> Self {
		match self.0.strip_prefix(INTERNAL_PREFIX) {
			Some(rest) => Self::new(rest),
			None => self.clone(),
		}
	}
}

impl fmt::Debug for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Selector {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

impl Borrow<str> for Selector {
	fn borrow(&self) -> &str {
		&self.0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn arity_counts_colons() {
		assert_eq!(Selector::new("reload").arity(), 0);
		assert_eq!(Selector::new("setTitle:").arity(), 1);
		assert_eq!(Selector::new("tableView:didSelectRow:").arity(), 2);
	}

	#[test]
	fn interned_selectors_share_storage() {
		let a = Selector::new("scrollViewDidScroll:");
		let b = Selector::from("scrollViewDidScroll:");
		assert_eq!(a, b);
		assert!(Arc::ptr_eq(&a.0, &b.0));
	}

	#[test]
	fn namespacing_roundtrip() {
		let sel = Selector::new("viewDidAppear:");
		let internal = sel.namespaced();
		assert!(internal.is_internal());
		assert_eq!(internal.name(), "_hookwire_viewDidAppear:");
		assert_eq!(internal.namespaced(), internal);
		assert_eq!(internal.public(), sel);
		assert_eq!(internal.arity(), 1);
	}

	#[test]
	fn dealloc_is_recognized() {
		assert!(Selector::dealloc().is_dealloc());
		assert!(!Selector::new("deallocate").is_dealloc());
	}
}
