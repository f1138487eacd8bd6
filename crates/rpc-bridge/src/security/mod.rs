//! Security gate: authentication, authorization, rate limiting and CSRF checks.
//!
//! Every check runs before a handler is invoked and fails with a structured
//! error, so rejected calls never reach the executor's panic isolation.

mod limiter;

pub use limiter::{DEFAULT_IDLE_TTL, RateLimiter};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, Method, header};
use parking_lot::RwLock;
use subtle::ConstantTimeEq;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::CsrfConfig;
use crate::context::CallContext;
use crate::error::RpcError;
use crate::registry::RegisteredFunction;

#[derive(Debug)]
pub struct SecurityGate {
	csrf: CsrfConfig,
	idle_ttl: Duration,
	/// One limiter per rate-limited function, tagged with the rate it was built for.
	limiters: RwLock<HashMap<String, (u32, Arc<RateLimiter>)>>,
}

impl Default for SecurityGate {
	fn default() -> Self {
		Self::new(CsrfConfig::default(), DEFAULT_IDLE_TTL)
	}
}

impl SecurityGate {
	pub fn new(csrf: CsrfConfig, idle_ttl: Duration) -> Self {
		Self {
			csrf,
			idle_ttl,
			limiters: RwLock::new(HashMap::new()),
		}
	}

	pub fn csrf_config(&self) -> &CsrfConfig {
		&self.csrf
	}

	/// Passes unless the function requires auth; then a user must be attached and,
	/// when roles are listed, hold at least one of them.
	pub fn check_auth(&self, ctx: &CallContext, function: &RegisteredFunction) -> Result<(), RpcError> {
		if !function.require_auth {
			return Ok(());
		}
		let Some(user) = &ctx.user else {
			debug!(target: "rpc_bridge", function = %function.name, "rejected unauthenticated call");
			return Err(RpcError::unauthorized());
		};
		if !function.require_roles.is_empty() && !user.has_any_role(&function.require_roles) {
			debug!(target: "rpc_bridge", function = %function.name, user = %user.id, "rejected call lacking role");
			return Err(RpcError::forbidden());
		}
		Ok(())
	}

	/// Take a token for the caller from the function's limiter. Zero means unlimited.
	pub fn check_rate_limit(&self, ctx: &CallContext, function: &RegisteredFunction) -> Result<(), RpcError> {
		let rate = function.rate_limit_per_minute;
		if rate == 0 {
			return Ok(());
		}
		let key = ctx.rate_limit_key();
		if self.limiter_for(&function.name, rate).allow(&key) {
			Ok(())
		} else {
			warn!(target: "rpc_bridge", function = %function.name, key = %key, "rate limit exceeded");
			Err(RpcError::rate_limited())
		}
	}

	fn limiter_for(&self, function: &str, rate: u32) -> Arc<RateLimiter> {
		let existing = self
			.limiters
			.read()
			.get(function)
			.filter(|(r, _)| *r == rate)
			.map(|(_, limiter)| limiter.clone());
		if let Some(limiter) = existing {
			return limiter;
		}
		let mut limiters = self.limiters.write();
		match limiters.get(function) {
			Some((r, limiter)) if *r == rate => limiter.clone(),
			_ => {
				let limiter = Arc::new(RateLimiter::with_idle_ttl(rate, rate, self.idle_ttl));
				limiters.insert(function.to_string(), (rate, limiter.clone()));
				limiter
			},
		}
	}

	/// Clear the caller's bucket for one function.
	pub fn reset_rate_limit(&self, function: &str, key: &str) {
		if let Some((_, limiter)) = self.limiters.read().get(function) {
			limiter.reset(key);
		}
	}

	/// Drop the limiter of a function that is no longer registered.
	pub fn forget_function(&self, function: &str) {
		if self.limiters.write().remove(function).is_some() {
			debug!(target: "rpc_bridge", function = %function, "dropped rate limiter");
		}
	}

	pub fn limiter_count(&self) -> usize {
		self.limiters.read().len()
	}

	/// Sweep idle buckets across all function limiters.
	pub fn sweep_idle(&self, now: Instant) -> usize {
		let limiters: Vec<Arc<RateLimiter>> = self.limiters.read().values().map(|(_, l)| l.clone()).collect();
		limiters.iter().map(|l| l.sweep_idle(now)).sum()
	}

	pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
		let gate = Arc::downgrade(&self);
		drop(self);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.tick().await;
			loop {
				ticker.tick().await;
				let Some(gate) = gate.upgrade() else {
					break;
				};
				let removed = gate.sweep_idle(Instant::now());
				if removed > 0 {
					debug!(target: "rpc_bridge", removed, "swept idle rate limit buckets");
				}
			}
		})
	}

	/// Double-submit CSRF check. Read-only verbs pass; anything else needs the
	/// header token to equal the cookie token.
	pub fn check_csrf(&self, method: &Method, headers: &HeaderMap) -> Result<(), RpcError> {
		if !self.csrf.enabled || matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
			return Ok(());
		}

		let header_token = headers
			.get(self.csrf.header_name.as_str())
			.and_then(|v| v.to_str().ok())
			.filter(|s| !s.is_empty());
		let cookie_token = cookie_value(headers, &self.csrf.cookie_name);

		match (header_token, cookie_token) {
			(Some(h), Some(c)) if bool::from(h.as_bytes().ct_eq(c.as_bytes())) => Ok(()),
			(None, _) | (_, None) => {
				warn!(target: "rpc_bridge", "missing CSRF token");
				Err(RpcError::bad_request("Missing CSRF token"))
			},
			_ => {
				warn!(target: "rpc_bridge", "CSRF token mismatch");
				Err(RpcError::bad_request("Invalid CSRF token"))
			},
		}
	}
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers
		.get_all(header::COOKIE)
		.iter()
		.filter_map(|v| v.to_str().ok())
		.flat_map(|v| v.split(';'))
		.filter_map(|pair| pair.trim().split_once('='))
		.find(|(k, _)| *k == name)
		.map(|(_, v)| v)
		.filter(|v| !v.is_empty())
}
