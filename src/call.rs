//! Classified retry execution for outbound provider calls.
//!
//! [`CallExecutor::execute`] wraps a single-attempt operation with rate-limit
//! admission, error classification, and exponential backoff. The policy is
//! provider-agnostic: the same shape runs metrics pulls, token exchanges, and
//! refreshes; only the request construction and the classification predicate
//! (via [`Error::is_retryable`]) differ per provider.

// self
use crate::{
	_prelude::*,
	limit::RateLimiter,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Backoff and retry-cap parameters for one call chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Maximum number of retries after the first attempt.
	pub max_retries: u32,
	/// Base delay doubled on every retry (base, 2x base, 4x base, ...).
	pub backoff_base: std::time::Duration,
}
impl RetryPolicy {
	/// Overrides the retry cap.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the backoff base delay.
	pub fn with_backoff_base(mut self, base: std::time::Duration) -> Self {
		self.backoff_base = base;

		self
	}

	fn delay_for(&self, attempt: u32) -> std::time::Duration {
		self.backoff_base.saturating_mul(2_u32.saturating_pow(attempt))
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_retries: 3, backoff_base: std::time::Duration::from_secs(1) }
	}
}

/// Executes single-attempt operations under admission control with classified retry.
#[derive(Clone)]
pub struct CallExecutor {
	limiter: Arc<RateLimiter>,
	policy: RetryPolicy,
}
impl CallExecutor {
	/// Creates an executor gated by the provided limiter.
	pub fn new(limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
		Self { limiter, policy }
	}

	/// Returns the limiter gating this executor.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	/// Runs `operation` until it succeeds, fails fatally, or exhausts the retry cap.
	///
	/// `operation` receives the zero-based attempt number and must perform exactly
	/// one remote call per invocation. Fatal errors and retry exhaustion propagate
	/// the final classified error; a fatal error is never masked as success.
	pub async fn execute<T, F, Fut>(&self, kind: FlowKind, mut operation: F) -> Result<T>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let span = FlowSpan::new(kind, "execute");

		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let mut attempt = 0_u32;

				loop {
					self.limiter.acquire().await;

					match operation(attempt).await {
						Ok(value) => return Ok(value),
						Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
							let delay = self.policy.delay_for(attempt);

							obs::record_retry(kind);
							obs::record_retry_event(kind, attempt, delay);
							tokio::time::sleep(delay).await;

							attempt += 1;
						},
						Err(err) => return Err(err),
					}
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
		}

		result
	}
}
impl Debug for CallExecutor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallExecutor")
			.field("policy", &self.policy)
			.field("limiter", &self.limiter.config())
			.finish()
	}
}
