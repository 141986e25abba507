//! Dynamically typed message values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::object::ObjectRef;

/// A single argument, return value, or property value.
///
/// Argument lists are plain positional slices of `Value`. An argument that was
/// not supplied is represented by [`Value::Nil`].
#[derive(Clone, Default)]
pub enum Value {
	/// Result of a void message.
	#[default]
	Unit,
	/// Absent object.
	Nil,
	Bool(bool),
	Int(i64),
	UInt(u64),
	Float(f64),
	Str(Arc<str>),
	Object(ObjectRef),
	/// Payload the object model does not interpret.
	Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
	/// Wraps an arbitrary payload.
	pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
		Self::Opaque(Arc::new(value))
	}

	/// Returns true for [`Value::Unit`].
	pub fn is_unit(&self) -> bool {
		matches!(self, Self::Unit)
	}

	/// Returns true for [`Value::Nil`].
	pub fn is_nil(&self) -> bool {
		matches!(self, Self::Nil)
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int(i) => Some(*i),
			_ => None,
		}
	}

	pub fn as_uint(&self) -> Option<u64> {
		match self {
			Self::UInt(u) => Some(*u),
			_ => None,
		}
	}

	pub fn as_float(&self) -> Option<f64> {
		match self {
			Self::Float(f) => Some(*f),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(s) => Some(s.as_ref()),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&ObjectRef> {
		match self {
			Self::Object(o) => Some(o),
			_ => None,
		}
	}

	/// Downcasts an opaque payload.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		match self {
			Self::Opaque(v) => v.downcast_ref(),
			_ => None,
		}
	}
}

/// Objects and opaque payloads compare by identity; everything else by value.
impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Unit, Self::Unit) | (Self::Nil, Self::Nil) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Int(a), Self::Int(b)) => a == b,
			(Self::UInt(a), Self::UInt(b)) => a == b,
			(Self::Float(a), Self::Float(b)) => a == b,
			(Self::Str(a), Self::Str(b)) => a == b,
			(Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
			(Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Unit => f.write_str("()"),
			Self::Nil => f.write_str("nil"),
			Self::Bool(b) => write!(f, "{b}"),
			Self::Int(i) => write!(f, "{i}"),
			Self::UInt(u) => write!(f, "{u}u"),
			Self::Float(x) => write!(f, "{x:?}"),
			Self::Str(s) => write!(f, "{s:?}"),
			Self::Object(o) => write!(f, "<{} {}>", o.class().name(), o.id()),
			Self::Opaque(_) => f.write_str("<opaque>"),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Self::Bool(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Self::Int(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Self::Int(v.into())
	}
}

impl From<u64> for Value {
	fn from(v: u64) -> Self {
		Self::UInt(v)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Self::Float(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Self::Str(Arc::from(v))
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Self::Str(Arc::from(v))
	}
}

impl From<ObjectRef> for Value {
	fn from(v: ObjectRef) -> Self {
		Self::Object(v)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(v: Option<T>) -> Self {
		v.map_or(Self::Nil, Into::into)
	}
}
