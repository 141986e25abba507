//! Classes and their method tables.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{ReentrantMutex, RwLock};
use rustc_hash::FxHashMap;

use crate::imp::{Implementation, Method};
use crate::object::ObjectRef;
use crate::selector::Selector;
use crate::signature::Signature;
use crate::value::Value;

/// Mechanism name used by key-value-observing style isa swaps.
pub const KEY_VALUE_OBSERVING: &str = "key-value-observing";

static NEXT_CLASS: AtomicU64 = AtomicU64::new(1);

/// Identity of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u64);

impl fmt::Display for ClassId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "class#{}", self.0)
	}
}

/// Where a class came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassOrigin {
	/// Written by the application.
	Declared,
	/// Generated at runtime by some mechanism and swapped under live objects.
	Synthesized { mechanism: Arc<str> },
}

struct ClassInner {
	id: ClassId,
	name: Box<str>,
	superclass: Option<Class>,
	origin: ClassOrigin,
	methods: RwLock<FxHashMap<Selector, Method>>,
	/// Serializes table rewrites; pairs with the per-object lock.
	sync: ReentrantMutex<()>,
}

/// Shared handle to a class.
#[derive(Clone)]
pub struct Class(Arc<ClassInner>);

impl Class {
	pub fn builder(name: &str) -> ClassBuilder {
		ClassBuilder {
			name: Box::from(name),
			superclass: None,
			origin: ClassOrigin::Declared,
			methods: FxHashMap::default(),
		}
	}

	pub fn id(&self) -> ClassId {
		self.0.id
	}

	pub fn name(&self) -> &str {
		&self.0.name
	}

	pub fn superclass(&self) -> Option<&Class> {
		self.0.superclass.as_ref()
	}

	pub fn origin(&self) -> &ClassOrigin {
		&self.0.origin
	}

	/// Name of the mechanism that synthesized this class, if any.
	pub fn synthesized_by(&self) -> Option<&str> {
		match &self.0.origin {
			ClassOrigin::Declared => None,
			ClassOrigin::Synthesized { mechanism } => Some(&**mechanism),
		}
	}

	pub fn ptr_eq(&self, other: &Class) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}

	/// Returns true if `self` is `other` or inherits from it.
	pub fn is_subclass_of(&self, other: &Class) -> bool {
		let mut cur = Some(self);
		while let Some(class) = cur {
			if class.ptr_eq(other) {
				return true;
			}
			cur = class.superclass();
		}
		false
	}

	/// Resolves `selector` along the superclass chain.
	pub fn lookup(&self, selector: &Selector) -> Option<Method> {
		let mut cur = Some(self);
		while let Some(class) = cur {
			if let Some(method) = class.0.methods.read().get(selector) {
				return Some(method.clone());
			}
			cur = class.superclass();
		}
		None
	}

	/// Returns the method defined directly on this class.
	pub fn local_method(&self, selector: &Selector) -> Option<Method> {
		self.0.methods.read().get(selector).cloned()
	}

	pub fn instances_respond_to(&self, selector: &Selector) -> bool {
		self.lookup(selector).is_some()
	}

	/// Adds a method if this class does not define one already.
	///
	/// Returns false when a local definition exists.
	pub fn add_method(&self, selector: Selector, method: Method) -> bool {
		let mut methods = self.0.methods.write();
		if methods.contains_key(&selector) {
			return false;
		}
		methods.insert(selector, method);
		true
	}

	/// Unconditionally sets the local definition, returning the previous one.
	pub fn replace_method(&self, selector: Selector, method: Method) -> Option<Method> {
		self.0.methods.write().insert(selector, method)
	}

	/// Generates a subclass owned by `mechanism`.
	///
	/// The result is meant to be swapped under an instance with
	/// [`ObjectRef::set_class`].
	pub fn synthesize_subclass(&self, mechanism: &str) -> Class {
		let name = format!("{mechanism}_{}", self.name());
		let mut builder = Class::builder(&name).superclass(self);
		builder.origin = ClassOrigin::Synthesized {
			mechanism: Arc::from(mechanism),
		};
		builder.build()
	}

	/// Runs `f` while holding this class's rewrite lock.
	pub fn synchronized<R>(&self, f: impl FnOnce() -> R) -> R {
		let _guard = self.0.sync.lock();
		f()
	}
}

impl fmt::Debug for Class {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Class")
			.field("id", &self.0.id)
			.field("name", &self.0.name)
			.field("origin", &self.0.origin)
			.finish_non_exhaustive()
	}
}

/// Builder for [`Class`].
pub struct ClassBuilder {
	name: Box<str>,
	superclass: Option<Class>,
	origin: ClassOrigin,
	methods: FxHashMap<Selector, Method>,
}

impl ClassBuilder {
	pub fn superclass(mut self, superclass: &Class) -> Self {
		self.superclass = Some(superclass.clone());
		self
	}

	/// Defines a method from a closure.
	pub fn method(
		mut self,
		selector: impl Into<Selector>,
		signature: Signature,
		body: impl Fn(&ObjectRef, &[Value]) -> Value + Send + Sync + 'static,
	) -> Self {
		self.methods.insert(
			selector.into(),
			Method::new(signature, Implementation::new(body)),
		);
		self
	}

	/// Defines a method from a prepared [`Method`].
	pub fn with_method(mut self, selector: impl Into<Selector>, method: Method) -> Self {
		self.methods.insert(selector.into(), method);
		self
	}

	pub fn build(self) -> Class {
		Class(Arc::new(ClassInner {
			id: ClassId(NEXT_CLASS.fetch_add(1, Ordering::Relaxed)),
			name: self.name,
			superclass: self.superclass,
			origin: self.origin,
			methods: RwLock::new(self.methods),
			sync: ReentrantMutex::new(()),
		}))
	}
}
