//! Dynamic object model for message interception.
//!
//! Objects here are reached only through messages: a [`Selector`] plus a
//! positional list of [`Value`]s. Dispatch is resolved at send time through a
//! per-instance override map, the class chain, and an optional forwarder, so
//! behavior can be redirected for one instance without touching its class.
//!
//! The crate also provides the hooks an observation layer needs that are not
//! message sends: property change notifications ([`properties`]) and teardown
//! hooks ([`teardown`]).

/// Classes and method tables.
pub mod class;
/// Error types.
pub mod error;
/// Fallback handling for unrecognized messages.
pub mod forward;
/// Method implementations with identity.
pub mod imp;
/// Object instances and dispatch.
pub mod object;
/// Properties and change notification.
pub mod properties;
/// Message names.
pub mod selector;
/// Return shapes and protocols.
pub mod signature;
/// Weak-or-owning references.
pub mod target;
/// Teardown hooks.
pub mod teardown;
/// Message values.
pub mod value;

pub use class::{Class, ClassBuilder, ClassId, ClassOrigin, KEY_VALUE_OBSERVING};
pub use error::{SendError, SlotConflict};
pub use forward::Forwarder;
pub use imp::{ImpId, ImpKind, Implementation, Method, MethodBody};
pub use object::{ObjectId, ObjectRef, WeakObject};
pub use properties::{ObservationToken, ObservingOptions, PropertyCallback, PropertyChange};
pub use selector::{DEALLOC, INTERNAL_PREFIX, Selector};
pub use signature::{Protocol, ReturnShape, Signature};
pub use target::TargetRef;
pub use teardown::{TeardownPhase, TeardownToken};
pub use value::Value;
