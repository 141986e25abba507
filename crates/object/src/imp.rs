//! Method implementations.
//!
//! An [`Implementation`] is what a dispatch slot points at. Each one gets a
//! process-unique [`ImpId`] so slot contents can be compared without looking
//! at the body. Mechanisms that install their own implementations tag them
//! with a cookie and recognize them later by downcasting it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::object::ObjectRef;
use crate::signature::Signature;
use crate::value::Value;

static NEXT_IMP: AtomicU64 = AtomicU64::new(1);

/// Identity of an implementation. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImpId(u64);

impl ImpId {
	fn next() -> Self {
		Self(NEXT_IMP.fetch_add(1, Ordering::Relaxed))
	}

	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ImpId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "imp#{}", self.0)
	}
}

/// Callable body of a method.
pub type MethodBody = dyn Fn(&ObjectRef, &[Value]) -> Value + Send + Sync;

/// How an implementation reaches its behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpKind {
	/// The body runs the method.
	Direct,
	/// The body is a trampoline into a message-forwarding mechanism. Slots
	/// holding one belong to whoever installed the trampoline.
	Forwarding,
}

/// A dispatchable method body with identity.
#[derive(Clone)]
pub struct Implementation {
	id: ImpId,
	kind: ImpKind,
	body: Arc<MethodBody>,
	cookie: Option<Arc<dyn Any + Send + Sync>>,
}

impl Implementation {
	pub fn new(body: impl Fn(&ObjectRef, &[Value]) -> Value + Send + Sync + 'static) -> Self {
		Self {
			id: ImpId::next(),
			kind: ImpKind::Direct,
			body: Arc::new(body),
			cookie: None,
		}
	}

	/// Creates a forwarding trampoline.
	pub fn forwarding(body: impl Fn(&ObjectRef, &[Value]) -> Value + Send + Sync + 'static) -> Self {
		Self {
			kind: ImpKind::Forwarding,
			..Self::new(body)
		}
	}

	/// Attaches an installer cookie.
	pub fn with_cookie(mut self, cookie: Arc<dyn Any + Send + Sync>) -> Self {
		self.cookie = Some(cookie);
		self
	}

	pub fn id(&self) -> ImpId {
		self.id
	}

	pub fn kind(&self) -> ImpKind {
		self.kind
	}

	pub fn cookie(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
		self.cookie.as_ref()
	}

	/// Downcasts the cookie to `T`, if there is one of that type.
	pub fn cookie_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		self.cookie.clone()?.downcast::<T>().ok()
	}

	pub fn call(&self, receiver: &ObjectRef, args: &[Value]) -> Value {
		(self.body)(receiver, args)
	}
}

impl fmt::Debug for Implementation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Implementation")
			.field("id", &self.id)
			.field("kind", &self.kind)
			.field("cookie", &self.cookie.is_some())
			.finish_non_exhaustive()
	}
}

/// An implementation together with its reflection data.
#[derive(Debug, Clone)]
pub struct Method {
	pub signature: Signature,
	pub imp: Implementation,
}

impl Method {
	pub fn new(signature: Signature, imp: Implementation) -> Self {
		Self { signature, imp }
	}

	pub fn id(&self) -> ImpId {
		self.imp.id()
	}

	/// Invokes the body, normalizing the result of void methods to
	/// [`Value::Unit`].
	pub fn invoke(&self, receiver: &ObjectRef, args: &[Value]) -> Value {
		let result = self.imp.call(receiver, args);
		if self.signature.is_void() {
			Value::Unit
		} else {
			result
		}
	}
}
