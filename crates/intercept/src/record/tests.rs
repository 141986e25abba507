use std::sync::atomic::{AtomicUsize, Ordering};

use hookwire_object::{Class, Signature};
use parking_lot::Mutex;

use super::*;
use crate::observer::observer_fn;

fn record_for(selector: &str, signature: Signature, calls: Arc<AtomicUsize>) -> (ObjectRef, Arc<InterceptionRecord>) {
	let class = Class::builder("Target")
		.method(selector, signature, move |_, _| {
			calls.fetch_add(1, Ordering::SeqCst);
			Value::Int(5)
		})
		.build();
	let object = ObjectRef::new(&class);
	let selector = Selector::new(selector);
	let original = object.resolve(&selector).unwrap();
	let key = RecordKey {
		object: object.id(),
		selector,
	};
	(object, Arc::new(InterceptionRecord::new(key, original)))
}

#[test]
fn shim_binds_its_identity_and_cookie() {
	let (_, record) = record_for("ping", Signature::INT, Arc::default());
	let shim = InterceptionRecord::build_shim(&record);
	assert_eq!(record.shim_id(), Some(shim.id()));

	let cookie = shim.imp.cookie_as::<InterceptionRecord>().unwrap();
	assert!(Arc::ptr_eq(&cookie, &record));
}

#[test]
fn empty_record_passes_through() {
	let calls = Arc::new(AtomicUsize::new(0));
	let (object, record) = record_for("ping", Signature::INT, calls.clone());
	let shim = InterceptionRecord::build_shim(&record);

	assert_eq!(shim.invoke(&object, &[]), Value::Int(5));
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert!(record.is_empty());
}

#[test]
fn missing_arguments_are_captured_as_nil() {
	let (object, record) = record_for("move:to:", Signature::VOID, Arc::default());
	let shim = InterceptionRecord::build_shim(&record);
	let seen = Arc::new(Mutex::new(Vec::new()));

	let sink = seen.clone();
	record
		.observers(Phase::Before)
		.add(observer_fn(move |args| sink.lock().push(args.to_vec())));

	assert_eq!(shim.invoke(&object, &[Value::Int(1)]), Value::Unit);
	assert_eq!(*seen.lock(), vec![vec![Value::Int(1), Value::Nil]]);
}

#[test]
fn after_observers_only_run_for_void_originals() {
	let (object, record) = record_for("count", Signature::INT, Arc::default());
	let shim = InterceptionRecord::build_shim(&record);
	let hits = Arc::new(AtomicUsize::new(0));

	let counter = hits.clone();
	record.observers(Phase::After).add(observer_fn(move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
	}));

	assert_eq!(shim.invoke(&object, &[]), Value::Int(5));
	assert_eq!(hits.load(Ordering::SeqCst), 0);
}
