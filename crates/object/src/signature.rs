//! Method shapes and protocol declarations.
//!
//! Argument counts come from the selector itself, so a [`Signature`] only has
//! to describe what comes back.

use rustc_hash::FxHashMap;

use crate::selector::Selector;
use crate::value::Value;

#[cfg(test)]
mod tests;

/// Calling-convention class of a method's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnShape {
	Void,
	Bool,
	Int,
	UInt,
	Float,
	Object,
	/// By-value aggregate wider than a register pair.
	Aggregate {
		/// Size in bytes.
		size: usize,
	},
}

impl ReturnShape {
	pub const fn is_void(self) -> bool {
		matches!(self, Self::Void)
	}

	/// Returns true when the value travels in registers and can be forwarded
	/// without knowing its layout.
	pub const fn is_transparent(self) -> bool {
		!matches!(self, Self::Aggregate { .. })
	}

	/// Value returned when a message of this shape is swallowed.
	pub fn default_value(self) -> Value {
		match self {
			Self::Void => Value::Unit,
			Self::Bool => Value::Bool(false),
			Self::Int => Value::Int(0),
			Self::UInt => Value::UInt(0),
			Self::Float => Value::Float(0.0),
			Self::Object | Self::Aggregate { .. } => Value::Nil,
		}
	}
}

/// Reflection data for one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
	pub returns: ReturnShape,
}

impl Signature {
	pub const VOID: Self = Self::new(ReturnShape::Void);
	pub const OBJECT: Self = Self::new(ReturnShape::Object);
	pub const BOOL: Self = Self::new(ReturnShape::Bool);
	pub const INT: Self = Self::new(ReturnShape::Int);

	pub const fn new(returns: ReturnShape) -> Self {
		Self { returns }
	}

	pub const fn is_void(&self) -> bool {
		self.returns.is_void()
	}
}

/// A named set of method declarations a receiver may implement.
///
/// Delegate proxies use protocols to learn the shape of messages they have no
/// implementation for.
#[derive(Debug, Clone, Default)]
pub struct Protocol {
	name: Box<str>,
	methods: FxHashMap<Selector, Signature>,
	order: Vec<Selector>,
}

impl Protocol {
	pub fn new(name: &str) -> Self {
		Self {
			name: Box::from(name),
			..Self::default()
		}
	}

	/// Declares a method, replacing an earlier declaration of the same selector.
	pub fn method(mut self, selector: impl Into<Selector>, signature: Signature) -> Self {
		let selector = selector.into();
		if self.methods.insert(selector.clone(), signature).is_none() {
			self.order.push(selector);
		}
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn signature(&self, selector: &Selector) -> Option<Signature> {
		self.methods.get(selector).copied()
	}

	pub fn declares(&self, selector: &Selector) -> bool {
		self.methods.contains_key(selector)
	}

	/// Returns true if `selector` is declared with a void return.
	pub fn declares_void(&self, selector: &Selector) -> bool {
		self.signature(selector).is_some_and(|sig| sig.is_void())
	}

	/// Declared selectors in declaration order.
	pub fn selectors(&self) -> impl Iterator<Item = &Selector> {
		self.order.iter()
	}
}
