// Token bucket rate limiter
//
// Buckets are created lazily per key, refilled continuously from elapsed time,
// and dropped by a periodic sweep once idle for longer than the configured TTL.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

/// Default idle time after which a bucket is swept.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy)]
struct Bucket {
	tokens: f64,
	last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
	rate_per_minute: f64,
	burst: f64,
	idle_ttl: Duration,
	buckets: RwLock<HashMap<String, Bucket>>,
}

impl RateLimiter {
	pub fn new(rate_per_minute: u32, burst: u32) -> Self {
		Self::with_idle_ttl(rate_per_minute, burst, DEFAULT_IDLE_TTL)
	}

	pub fn with_idle_ttl(rate_per_minute: u32, burst: u32, idle_ttl: Duration) -> Self {
		Self {
			rate_per_minute: rate_per_minute as f64,
			burst: burst as f64,
			idle_ttl,
			buckets: RwLock::new(HashMap::new()),
		}
	}

	pub fn allow(&self, key: &str) -> bool {
		self.allow_at(key, Instant::now())
	}

	/// Take one token for `key` at time `now`.
	pub fn allow_at(&self, key: &str, now: Instant) -> bool {
		let mut buckets = self.buckets.write();
		let Some(bucket) = buckets.get_mut(key) else {
			// first call consumes one token from a full bucket
			buckets.insert(
				key.to_string(),
				Bucket {
					tokens: (self.burst - 1.0).max(0.0),
					last_refill: now,
				},
			);
			return self.burst >= 1.0;
		};

		let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
		bucket.tokens = (bucket.tokens + elapsed * self.rate_per_minute / 60.0).clamp(0.0, self.burst);
		bucket.last_refill = now;

		if bucket.tokens >= 1.0 {
			bucket.tokens -= 1.0;
			true
		} else {
			false
		}
	}

	/// Forget a key, as if it had never been used.
	pub fn reset(&self, key: &str) {
		self.buckets.write().remove(key);
	}

	/// Drop buckets idle for longer than the TTL. Returns how many were removed.
	pub fn sweep_idle(&self, now: Instant) -> usize {
		let mut buckets = self.buckets.write();
		let before = buckets.len();
		buckets.retain(|_, b| now.saturating_duration_since(b.last_refill) <= self.idle_ttl);
		before - buckets.len()
	}

	pub fn len(&self) -> usize {
		self.buckets.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.buckets.read().is_empty()
	}
}
