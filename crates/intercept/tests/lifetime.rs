use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hookwire_intercept::{DeallocationObserver, MessageInterceptor, MessageObserver, Phase, PropertyObserver};
use hookwire_object::{Class, ObjectRef, ObservingOptions, Selector, Signature, TeardownPhase, Value};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

fn model() -> ObjectRef {
	let class = Class::builder("Model")
		.method("save", Signature::VOID, |_, _| Value::Unit)
		.build();
	ObjectRef::new(&class)
}

#[test]
fn deallocation_fires_exactly_once() {
	let obj = model();
	let id = obj.id();
	let fired = Arc::new(Mutex::new(Vec::new()));

	let sink = fired.clone();
	let handle = DeallocationObserver::observe_deallocation(&obj, false, move |seen| sink.lock().push(seen));
	assert_eq!(obj.teardown_hook_count(TeardownPhase::Final), 1);

	drop(obj);
	assert_eq!(*fired.lock(), [id]);
	assert!(handle.has_fired());

	handle.dispose();
	assert!(handle.has_fired());
	assert_eq!(fired.lock().len(), 1);
}

#[test]
fn dispose_before_deallocation_means_no_callback() {
	let obj = model();
	let fired = Arc::new(AtomicUsize::new(0));

	let counter = fired.clone();
	let handle = DeallocationObserver::observe_deallocation(&obj, false, move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
	});
	handle.dispose();
	handle.dispose();
	assert!(handle.is_disposed());
	assert_eq!(obj.teardown_hook_count(TeardownPhase::Final), 0);

	drop(obj);
	assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn retained_target_lives_until_the_handle_lets_go() {
	let obj = model();
	let weak = obj.downgrade();
	let fired = Arc::new(AtomicUsize::new(0));

	let counter = fired.clone();
	let handle = DeallocationObserver::observe_deallocation(&obj, true, move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
	});
	drop(obj);
	assert!(weak.is_alive());

	drop(handle);
	assert!(!weak.is_alive());
	assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn weak_target_is_not_extended() {
	let obj = model();
	let weak = obj.downgrade();
	let _handle = DeallocationObserver::observe_deallocation(&obj, false, |_| {});
	drop(obj);
	assert!(!weak.is_alive());
}

#[derive(Default)]
struct Order(Mutex<Vec<&'static str>>);

impl MessageObserver for Order {
	fn completed(&self) {
		self.0.lock().push("interceptor completed");
	}
}

#[test]
fn deallocation_runs_after_interceptor_cleanup() {
	let obj = model();
	let order = Arc::new(Order::default());
	let interceptor = MessageInterceptor::new();
	let _sub = interceptor
		.observe(&obj, &Selector::new("save"), order.clone(), Phase::Before)
		.unwrap();

	let sink = order.clone();
	let _handle = DeallocationObserver::observe_deallocation(&obj, false, move |_| {
		sink.0.lock().push("deallocated");
	});

	drop(obj);
	assert_eq!(*order.0.lock(), ["interceptor completed", "deallocated"]);
}

#[test]
fn property_observer_delivers_requested_values() {
	let obj = model();
	obj.set_property("name", Value::from("draft"));
	let seen = Arc::new(Mutex::new(Vec::new()));

	let sink = seen.clone();
	let observer = PropertyObserver::observe_property(
		&obj,
		false,
		"name",
		ObservingOptions::INITIAL | ObservingOptions::PRIOR | ObservingOptions::NEW | ObservingOptions::OLD,
		move |value| sink.lock().push(value),
	);
	obj.set_property("name", Value::from("final"));

	assert_eq!(
		*seen.lock(),
		[Value::from("draft"), Value::from("draft"), Value::from("final")]
	);
	assert_eq!(observer.key_path(), "name");
}

#[test]
fn property_observer_without_new_reports_nil() {
	let obj = model();
	let seen = Arc::new(Mutex::new(Vec::new()));

	let sink = seen.clone();
	let _observer =
		PropertyObserver::observe_property(&obj, false, "flag", ObservingOptions::empty(), move |value| {
			sink.lock().push(value)
		});
	obj.set_property("flag", Value::Bool(true));
	assert_eq!(*seen.lock(), [Value::Nil]);
}

#[test]
fn property_observer_follows_key_paths() {
	let owner = model();
	let child = model();
	child.set_property("title", Value::from("a"));
	owner.set_property("child", Value::Object(child.clone()));
	let seen = Arc::new(Mutex::new(Vec::new()));

	let sink = seen.clone();
	let _observer = PropertyObserver::observe_property(
		&owner,
		false,
		"child.title",
		ObservingOptions::NEW,
		move |value| sink.lock().push(value),
	);

	child.set_property("title", Value::from("b"));
	assert_eq!(*seen.lock(), [Value::from("b")]);

	let replacement = model();
	replacement.set_property("title", Value::from("c"));
	owner.set_property("child", Value::Object(replacement.clone()));
	assert_eq!(child.property_observer_count("title"), 0);
	assert_eq!(replacement.property_observer_count("title"), 1);

	child.set_property("title", Value::from("stale"));
	replacement.set_property("title", Value::from("d"));
	assert_eq!(
		*seen.lock(),
		[Value::from("b"), Value::from("c"), Value::from("d")]
	);
}

#[test]
fn key_path_through_a_non_object_reattaches_later() {
	let owner = model();
	let seen = Arc::new(Mutex::new(Vec::new()));

	let sink = seen.clone();
	let observer = PropertyObserver::observe_property(
		&owner,
		false,
		"child.title",
		ObservingOptions::INITIAL | ObservingOptions::NEW,
		move |value| sink.lock().push(value),
	);
	assert_eq!(*seen.lock(), [Value::Nil]);

	let child = model();
	owner.set_property("child", Value::Object(child.clone()));
	child.set_property("title", Value::from("late"));
	assert_eq!(*seen.lock(), [Value::Nil, Value::Nil, Value::from("late")]);

	observer.dispose();
	assert_eq!(owner.property_observer_count("child"), 0);
	assert_eq!(child.property_observer_count("title"), 0);
}

#[test]
fn dispose_stops_delivery_and_is_idempotent() {
	let obj = model();
	let seen = Arc::new(AtomicUsize::new(0));

	let counter = seen.clone();
	let observer = PropertyObserver::observe_property(&obj, false, "x", ObservingOptions::NEW, move |_| {
		counter.fetch_add(1, Ordering::SeqCst);
	});
	obj.set_property("x", Value::Int(1));
	observer.dispose();
	observer.dispose();
	obj.set_property("x", Value::Int(2));

	assert_eq!(seen.load(Ordering::SeqCst), 1);
	assert!(observer.is_disposed());
	assert_eq!(obj.property_observer_count("x"), 0);
}

#[test]
fn dropping_the_observer_unregisters() {
	let obj = model();
	let observer = PropertyObserver::observe_property(&obj, false, "x", ObservingOptions::NEW, |_| {});
	assert_eq!(obj.property_observer_count("x"), 1);
	drop(observer);
	assert_eq!(obj.property_observer_count("x"), 0);
}

#[test]
fn dispose_after_target_death_is_a_no_op() {
	let obj = model();
	let weak = obj.downgrade();
	let observer = PropertyObserver::observe_property(&obj, false, "x", ObservingOptions::NEW, |_| {});
	drop(obj);

	assert!(!weak.is_alive());
	observer.dispose();
	assert!(observer.is_disposed());
}

#[test]
fn retained_property_target_is_released_on_dispose() {
	let obj = model();
	let weak = obj.downgrade();
	let observer = PropertyObserver::observe_property(&obj, true, "x", ObservingOptions::NEW, |_| {});
	drop(obj);
	assert!(weak.is_alive());

	observer.dispose();
	assert!(!weak.is_alive());
}

#[test]
fn dispose_during_the_targets_own_teardown() {
	let obj = model();
	let observer = Arc::new(PropertyObserver::observe_property(
		&obj,
		false,
		"x",
		ObservingOptions::NEW,
		|_| {},
	));

	let early = observer.clone();
	obj.add_teardown_hook(TeardownPhase::Early, move |_| early.dispose());
	let last = observer.clone();
	let _handle = DeallocationObserver::observe_deallocation(&obj, false, move |_| {
		assert!(last.is_disposed());
		last.dispose();
	});

	drop(obj);
	assert!(observer.is_disposed());
}
