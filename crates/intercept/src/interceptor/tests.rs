use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hookwire_object::{Class, ObjectRef, Selector, Signature, TeardownPhase, Value};
use pretty_assertions::assert_eq;

use super::*;

fn button() -> ObjectRef {
	let class = Class::builder("Button")
		.method("tap", Signature::VOID, |_, _| Value::Unit)
		.method("isEnabled", Signature::BOOL, |_, _| Value::Bool(true))
		.build();
	ObjectRef::new(&class)
}

#[derive(Default)]
struct Completion(AtomicUsize);

impl MessageObserver for Completion {
	fn completed(&self) {
		self.0.fetch_add(1, Ordering::SeqCst);
	}
}

#[test]
fn last_unsubscribe_retires_record_but_keeps_shim() {
	let interceptor = MessageInterceptor::new();
	let obj = button();
	let tap = Selector::new("tap");

	let sub = interceptor.observe_fn(&obj, &tap, Phase::Before, |_| {}).unwrap();
	let shim = sub.shim_id();
	assert_eq!(interceptor.active_records().len(), 1);

	assert!(sub.unsubscribe());
	assert!(interceptor.active_records().is_empty());
	assert_eq!(obj.resolve(&tap).map(|m| m.id()), shim);
	assert_eq!(obj.send(&tap, &[]), Ok(Value::Unit));
}

#[test]
fn resubscribing_revives_the_same_shim() {
	let interceptor = MessageInterceptor::new();
	let obj = button();
	let tap = Selector::new("tap");

	let first = interceptor.observe_fn(&obj, &tap, Phase::After, |_| {}).unwrap();
	let shim = first.shim_id();
	drop(first);

	let second = interceptor.observe_fn(&obj, &tap, Phase::After, |_| {}).unwrap();
	assert_eq!(second.shim_id(), shim);
	assert!(interceptor.shim(&obj, &tap).is_some());
}

#[test]
fn teardown_hook_is_added_once_per_object() {
	let interceptor = MessageInterceptor::new();
	let obj = button();
	let _a = interceptor.observe_fn(&obj, &Selector::new("tap"), Phase::Before, |_| {}).unwrap();
	let _b = interceptor
		.observe_fn(&obj, &Selector::new("isEnabled"), Phase::Before, |_| {})
		.unwrap();
	assert_eq!(obj.teardown_hook_count(TeardownPhase::Early), 1);
}

#[test]
fn teardown_completes_each_observer_once() {
	let interceptor = MessageInterceptor::new();
	let obj = button();
	let observer = Arc::new(Completion::default());

	let before = interceptor
		.observe(&obj, &Selector::new("tap"), observer.clone(), Phase::Before)
		.unwrap();
	let after = interceptor
		.observe(&obj, &Selector::new("tap"), observer.clone(), Phase::After)
		.unwrap();
	let other = interceptor
		.observe(&obj, &Selector::new("isEnabled"), observer.clone(), Phase::Before)
		.unwrap();

	drop(obj);
	assert_eq!(observer.0.load(Ordering::SeqCst), 2);
	assert!(interceptor.active_records().is_empty());
	assert!(!before.is_active() && !after.is_active() && !other.is_active());
	assert!(!before.unsubscribe());
}

#[test]
fn subscriptions_outliving_the_interceptor_still_detach() {
	let interceptor = MessageInterceptor::new();
	let obj = button();
	let tap = Selector::new("tap");
	let sub = interceptor.observe_fn(&obj, &tap, Phase::Before, |_| {}).unwrap();
	drop(interceptor);

	assert!(sub.is_active());
	assert!(sub.unsubscribe());
}
