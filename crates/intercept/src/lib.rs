//! Message interception runtime for `hookwire-object`.
//!
//! Lets unrelated parties observe an object without subclassing it:
//!
//! - [`MessageInterceptor`] notifies observers before and after a selector
//!   runs on a specific instance, through a per-instance shim installed by
//!   [`DispatchRewriter`].
//! - [`PropertyObserver`] wraps property change notifications in a
//!   disposable handle.
//! - [`DeallocationObserver`] fires once when an object is torn down.
//! - [`DelegateProxy`] stands in for a delegate, forwarding to a real target
//!   and reporting every message it receives.
//!
//! Observer callbacks run synchronously on the thread that sent the message.

/// Process-wide hazard policy.
pub mod config;
/// Deallocation observation.
pub mod dealloc;
/// Error types.
pub mod error;
/// Subscriptions and active records.
pub mod interceptor;
/// Observer traits and lists.
pub mod observer;
/// Disposable property observation.
pub mod property;
/// Delegate proxy.
pub mod proxy;
/// Per-(object, selector) interception state.
pub mod record;
/// Dispatch slot rewriting.
pub mod rewriter;

pub use config::{
	ABORT_ON_HAZARD_ENV, HazardPolicy, hazard_policy, init_from_env, set_abort_on_threading_hazard,
	set_hazard_policy,
};
pub use dealloc::DeallocationObserver;
pub use error::{ForeignMechanism, InterceptError, Result};
pub use interceptor::{MessageInterceptor, Subscription};
pub use observer::{FnObserver, MessageObserver, Phase, SubscriptionId, observer_fn};
pub use property::PropertyObserver;
pub use proxy::{DelegateProxy, DelegateProxyBuilder, ProxySubscription, WiredCall, WiredHandler};
pub use record::{InterceptionRecord, RecordKey};
pub use rewriter::{DispatchRewriter, ShimHandle};
