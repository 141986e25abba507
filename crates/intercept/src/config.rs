//! Process-wide threading hazard policy.
//!
//! Races on a dispatch slot cannot happen while this runtime is the only
//! code rewriting dispatch, because every rewrite holds the object and class
//! locks. Code unaware of those locks can still change a slot between the
//! check and the commit. When that is detected the policy decides the
//! outcome:
//!
//! - [`HazardPolicy::Report`] (default) returns
//!   [`InterceptError::ThreadingHazard`](crate::InterceptError::ThreadingHazard).
//! - [`HazardPolicy::Abort`] logs and aborts the process, for
//!   crash-on-first-cause debugging.
//!
//! The policy is global. There is no per-object or per-interceptor override.

use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable read by [`init_from_env`].
pub const ABORT_ON_HAZARD_ENV: &str = "HOOKWIRE_ABORT_ON_THREADING_HAZARD";

/// What to do when a dispatch slot changes under a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HazardPolicy {
	/// Return an error and leave the slot alone.
	#[default]
	Report,
	/// Abort the process.
	Abort,
}

impl HazardPolicy {
	/// Parses a flag value. Accepts `1/true/yes/on/abort` and
	/// `0/false/no/off/report`, case-insensitively.
	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"1" | "true" | "yes" | "on" | "abort" => Some(Self::Abort),
			"0" | "false" | "no" | "off" | "report" => Some(Self::Report),
			_ => None,
		}
	}

	const fn to_bits(self) -> u8 {
		match self {
			Self::Report => 0,
			Self::Abort => 1,
		}
	}

	const fn from_bits(bits: u8) -> Self {
		match bits {
			1 => Self::Abort,
			_ => Self::Report,
		}
	}
}

static POLICY: AtomicU8 = AtomicU8::new(0);

/// Returns the current policy.
pub fn hazard_policy() -> HazardPolicy {
	HazardPolicy::from_bits(POLICY.load(Ordering::Acquire))
}

/// Sets the policy, returning the previous one.
pub fn set_hazard_policy(policy: HazardPolicy) -> HazardPolicy {
	HazardPolicy::from_bits(POLICY.swap(policy.to_bits(), Ordering::AcqRel))
}

/// Convenience for the common boolean form of the flag.
pub fn set_abort_on_threading_hazard(abort: bool) {
	set_hazard_policy(if abort {
		HazardPolicy::Abort
	} else {
		HazardPolicy::Report
	});
}

/// Applies [`ABORT_ON_HAZARD_ENV`] if it is set to a recognized value and
/// returns the resulting policy.
pub fn init_from_env() -> HazardPolicy {
	if let Ok(raw) = std::env::var(ABORT_ON_HAZARD_ENV) {
		match HazardPolicy::parse(&raw) {
			Some(policy) => {
				set_hazard_policy(policy);
				tracing::debug!(?policy, "hazard policy set from environment");
			}
			None => tracing::warn!(value = %raw, "ignoring unrecognized {ABORT_ON_HAZARD_ENV}"),
		}
	}
	hazard_policy()
}
