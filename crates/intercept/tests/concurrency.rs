use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use hookwire_intercept::{DispatchRewriter, MessageInterceptor, Phase, Subscription};
use hookwire_object::{Class, ObjectRef, Selector, Signature, Value};
use proptest::prelude::*;

fn counter() -> ObjectRef {
	let class = Class::builder("Counter")
		.method("tick", Signature::VOID, |this, _| {
			this.synchronized(|| {
				let n = this.property("ticks").as_int().unwrap_or(0);
				this.set_property("ticks", Value::Int(n + 1));
			});
			Value::Unit
		})
		.build();
	ObjectRef::new(&class)
}

#[test]
fn concurrent_installs_produce_one_shim() {
	let obj = counter();
	let sel = Selector::new("tick");
	let rewriter = DispatchRewriter::new();

	let handles: Vec<_> = thread::scope(|s| {
		let workers: Vec<_> = (0..8)
			.map(|_| s.spawn(|| rewriter.ensure_observing(&obj, &sel).unwrap()))
			.collect();
		workers.into_iter().map(|w| w.join().unwrap()).collect()
	});

	assert!(handles.windows(2).all(|pair| pair[0].same_shim(&pair[1])));
	assert_eq!(obj.send(&sel, &[]), Ok(Value::Unit));
}

#[test]
fn subscribe_and_unsubscribe_while_messages_flow() {
	let _ = tracing_subscriber::fmt::try_init();
	let interceptor = MessageInterceptor::new();
	let obj = counter();
	let sel = Selector::new("tick");
	let steady_hits = Arc::new(AtomicUsize::new(0));

	let hits = steady_hits.clone();
	let steady = interceptor
		.observe_fn(&obj, &sel, Phase::After, move |_| {
			hits.fetch_add(1, Ordering::SeqCst);
		})
		.unwrap();

	const SENDS: usize = 500;
	thread::scope(|s| {
		s.spawn(|| {
			for _ in 0..SENDS {
				obj.send(&sel, &[]).unwrap();
			}
		});
		for _ in 0..4 {
			s.spawn(|| {
				for _ in 0..100 {
					let sub = interceptor.observe_fn(&obj, &sel, Phase::Before, |_| {}).unwrap();
					assert!(sub.is_active());
					drop(sub);
				}
			});
		}
	});

	assert_eq!(steady_hits.load(Ordering::SeqCst), SENDS);
	assert_eq!(obj.property("ticks"), Value::Int(SENDS as i64));
	assert_eq!(interceptor.observer_count(obj.id(), &sel), 1);
	assert!(steady.unsubscribe());
	assert!(interceptor.active_records().is_empty());
}

#[test]
fn senders_on_many_threads_each_notify_once() {
	let interceptor = MessageInterceptor::new();
	let obj = counter();
	let sel = Selector::new("tick");
	let before = Arc::new(AtomicUsize::new(0));
	let after = Arc::new(AtomicUsize::new(0));

	let (b, a) = (before.clone(), after.clone());
	let _before = interceptor
		.observe_fn(&obj, &sel, Phase::Before, move |_| {
			b.fetch_add(1, Ordering::SeqCst);
		})
		.unwrap();
	let _after = interceptor
		.observe_fn(&obj, &sel, Phase::After, move |_| {
			a.fetch_add(1, Ordering::SeqCst);
		})
		.unwrap();

	thread::scope(|s| {
		for _ in 0..8 {
			s.spawn(|| {
				for _ in 0..50 {
					obj.send(&sel, &[]).unwrap();
				}
			});
		}
	});

	assert_eq!(before.load(Ordering::SeqCst), 400);
	assert_eq!(after.load(Ordering::SeqCst), 400);
}

#[derive(Debug, Clone)]
enum Step {
	Subscribe(Phase),
	Unsubscribe(usize),
	Send,
}

fn step() -> impl Strategy<Value = Step> {
	prop_oneof![
		Just(Step::Subscribe(Phase::Before)),
		Just(Step::Subscribe(Phase::After)),
		(0usize..8).prop_map(Step::Unsubscribe),
		Just(Step::Send),
	]
}

proptest! {
	#[test]
	fn prop_interleavings_keep_counts_consistent(steps in prop::collection::vec(step(), 1..48)) {
		let interceptor = MessageInterceptor::new();
		let obj = counter();
		let sel = Selector::new("tick");
		let hits = Arc::new(AtomicUsize::new(0));
		let mut live: Vec<Subscription> = Vec::new();
		let mut expected_hits = 0;

		for step in steps {
			match step {
				Step::Subscribe(phase) => {
					let hits = hits.clone();
					let sub = interceptor
						.observe_fn(&obj, &sel, phase, move |_| {
							hits.fetch_add(1, Ordering::SeqCst);
						})
						.unwrap();
					live.push(sub);
				}
				Step::Unsubscribe(i) if !live.is_empty() => {
					let sub = live.remove(i % live.len());
					prop_assert!(sub.unsubscribe());
				}
				Step::Unsubscribe(_) => {}
				Step::Send => {
					obj.send(&sel, &[]).unwrap();
					expected_hits += live.len();
				}
			}
			prop_assert_eq!(interceptor.observer_count(obj.id(), &sel), live.len());
			prop_assert_eq!(interceptor.is_observing(&obj, &sel), !live.is_empty());
		}

		prop_assert_eq!(hits.load(Ordering::SeqCst), expected_hits);
	}
}
