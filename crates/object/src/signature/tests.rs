use proptest::prelude::*;

use super::*;

#[test]
fn default_values_match_shape() {
	assert_eq!(ReturnShape::Void.default_value(), Value::Unit);
	assert_eq!(ReturnShape::Bool.default_value(), Value::Bool(false));
	assert_eq!(ReturnShape::Int.default_value(), Value::Int(0));
	assert_eq!(ReturnShape::Object.default_value(), Value::Nil);
	assert!(!ReturnShape::Aggregate { size: 32 }.is_transparent());
	assert!(ReturnShape::Float.is_transparent());
}

#[test]
fn protocol_keeps_declaration_order() {
	let protocol = Protocol::new("ScrollDelegate")
		.method("scrollViewDidScroll:", Signature::VOID)
		.method("scrollViewShouldScrollToTop:", Signature::BOOL)
		.method("scrollViewDidScroll:", Signature::VOID);

	let names: Vec<_> = protocol.selectors().map(Selector::name).collect();
	assert_eq!(names, ["scrollViewDidScroll:", "scrollViewShouldScrollToTop:"]);
	assert!(protocol.declares_void(&Selector::new("scrollViewDidScroll:")));
	assert!(!protocol.declares_void(&Selector::new("scrollViewShouldScrollToTop:")));
	assert!(!protocol.declares(&Selector::new("other")));
}

proptest! {
	#[test]
	fn prop_arity_matches_colon_count(parts in prop::collection::vec("[a-z]{1,6}", 0..5)) {
		let name = if parts.is_empty() {
			"ping".to_string()
		} else {
			parts.iter().map(|p| format!("{p}:")).collect::<String>()
		};
		let selector = Selector::new(&name);
		prop_assert_eq!(selector.arity(), parts.len());
		prop_assert_eq!(selector.namespaced().arity(), parts.len());
	}
}
