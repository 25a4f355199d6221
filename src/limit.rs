//! Token-bucket admission control applied in front of every outbound provider call.
//!
//! Each provider owns its own [`RateLimiter`] so a burst against one provider never
//! throttles another; the bucket is the only in-memory state shared across
//! concurrent flows and is guarded by a sync mutex that is never held across an
//! await point. Refill math uses the monotonic clock so wall-clock adjustments
//! cannot drain or overfill the bucket.

// std
use std::time::Instant;
// self
use crate::_prelude::*;

/// Token-bucket parameters for one provider (or provider endpoint class).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
	/// Burst capacity; the bucket never holds more tokens than this.
	pub burst: f64,
	/// Sustained refill rate in tokens per second.
	pub refill_per_second: f64,
}
impl RateLimitConfig {
	/// Creates a config, clamping the burst to at least one token and the rate to
	/// a positive value so admission can always make progress.
	pub fn new(burst: f64, refill_per_second: f64) -> Self {
		// The floor keeps the computed wait representable as a std Duration.
		const MIN_REFILL: f64 = 1e-9;

		Self { burst: burst.max(1.), refill_per_second: refill_per_second.max(MIN_REFILL) }
	}
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		// Matches the quota envelope the reporting integrations were tuned for:
		// bursts of five requests refilling at two per second.
		Self { burst: 5., refill_per_second: 2. }
	}
}

#[derive(Debug)]
struct Bucket {
	tokens: f64,
	last_refill: Instant,
}
impl Bucket {
	fn refill(&mut self, config: RateLimitConfig, now: Instant) {
		let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();

		self.tokens = (self.tokens + elapsed * config.refill_per_second).min(config.burst);
		self.last_refill = now;
	}
}

/// Outcome of a single admission poll.
enum Admission {
	Admitted,
	Wait(std::time::Duration),
}

/// Per-provider token-bucket rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
	config: RateLimitConfig,
	bucket: Mutex<Bucket>,
}
impl RateLimiter {
	/// Creates a limiter with a full bucket.
	pub fn new(config: RateLimitConfig) -> Self {
		Self {
			config,
			bucket: Mutex::new(Bucket { tokens: config.burst, last_refill: Instant::now() }),
		}
	}

	/// Returns the configured parameters.
	pub fn config(&self) -> RateLimitConfig {
		self.config
	}

	/// Attempts to take one token without waiting.
	pub fn try_consume(&self) -> bool {
		self.try_consume_at(Instant::now())
	}

	/// Deterministic variant of [`try_consume`](Self::try_consume) driven by an
	/// explicit observation instant; used by tests and instrumentation.
	pub fn try_consume_at(&self, now: Instant) -> bool {
		matches!(self.poll(now), Admission::Admitted)
	}

	/// Suspends the calling flow until a token is available, then takes it.
	///
	/// The wait never blocks unrelated flows; only callers contending for this
	/// bucket are delayed.
	pub async fn acquire(&self) {
		loop {
			match self.poll(Instant::now()) {
				Admission::Admitted => return,
				Admission::Wait(delay) => tokio::time::sleep(delay).await,
			}
		}
	}

	/// Current token count after refilling to the present instant.
	pub fn available(&self) -> f64 {
		self.available_at(Instant::now())
	}

	/// Deterministic variant of [`available`](Self::available).
	pub fn available_at(&self, now: Instant) -> f64 {
		let mut bucket = self.bucket.lock();

		bucket.refill(self.config, now);

		bucket.tokens
	}

	fn poll(&self, now: Instant) -> Admission {
		let mut bucket = self.bucket.lock();

		bucket.refill(self.config, now);

		if bucket.tokens >= 1. {
			bucket.tokens -= 1.;

			Admission::Admitted
		} else {
			let deficit = 1. - bucket.tokens;
			let wait = deficit / self.config.refill_per_second;

			Admission::Wait(std::time::Duration::from_secs_f64(wait))
		}
	}
}
