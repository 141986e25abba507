use hookwire_intercept::{
	ABORT_ON_HAZARD_ENV, HazardPolicy, hazard_policy, init_from_env, set_abort_on_threading_hazard,
	set_hazard_policy,
};

fn with_env(value: Option<&str>, f: impl FnOnce()) {
	let previous = std::env::var(ABORT_ON_HAZARD_ENV).ok();
	// SAFETY: serialized tests; nothing else in this binary reads the variable concurrently.
	unsafe {
		match value {
			Some(v) => std::env::set_var(ABORT_ON_HAZARD_ENV, v),
			None => std::env::remove_var(ABORT_ON_HAZARD_ENV),
		}
	}
	f();
	// SAFETY: as above.
	unsafe {
		match previous {
			Some(v) => std::env::set_var(ABORT_ON_HAZARD_ENV, v),
			None => std::env::remove_var(ABORT_ON_HAZARD_ENV),
		}
	}
}

#[test]
#[serial_test::serial]
fn env_flag_selects_abort() {
	let saved = set_hazard_policy(HazardPolicy::Report);
	with_env(Some("1"), || assert_eq!(init_from_env(), HazardPolicy::Abort));
	set_hazard_policy(saved);
}

#[test]
#[serial_test::serial]
fn unset_or_garbage_env_keeps_current_policy() {
	let saved = set_hazard_policy(HazardPolicy::Report);
	with_env(None, || assert_eq!(init_from_env(), HazardPolicy::Report));
	with_env(Some("sometimes"), || assert_eq!(init_from_env(), HazardPolicy::Report));
	set_hazard_policy(saved);
}

#[test]
#[serial_test::serial]
fn boolean_setter_round_trips() {
	let saved = hazard_policy();
	set_abort_on_threading_hazard(true);
	assert_eq!(hazard_policy(), HazardPolicy::Abort);
	set_abort_on_threading_hazard(false);
	assert_eq!(hazard_policy(), HazardPolicy::Report);
	set_hazard_policy(saved);
}
