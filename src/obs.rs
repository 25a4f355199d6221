//! Optional observability helpers for vault flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `credvault.flow` with the `flow` and
//!   `stage` fields, plus retry/warning events from the executor and vault.
//! - Enable `metrics` to increment the `credvault_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and
//!   `credvault_call_retry_total` for each backoff retry, labeled by `flow`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Logical flows observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Link initiation (authorize URL construction).
	Link,
	/// Authorization callback handling (code exchange).
	Callback,
	/// Refresh of a stored credential.
	Refresh,
	/// Credential revocation or disconnect.
	Revoke,
	/// Outbound provider API call.
	ProviderCall,
	/// Background refresh sweep iteration.
	Sweep,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Link => "link",
			FlowKind::Callback => "callback",
			FlowKind::Refresh => "refresh",
			FlowKind::Revoke => "revoke",
			FlowKind::ProviderCall => "provider_call",
			FlowKind::Sweep => "sweep",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
