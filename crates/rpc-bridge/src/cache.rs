//! Result cache interface.
//!
//! Functions can be registered with a cache hint (`FunctionOptions::cache`), and
//! introspection reports it, but the executor never consults a cache. Embedding
//! applications that want result caching can use [`Cache`] from their handlers.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
	#[error("cache backend error: {0}")]
	Backend(String),
}

/// Async key/value cache with per-entry TTL.
#[async_trait]
pub trait Cache: Send + Sync {
	/// Returns `Ok(None)` when the key is absent or expired.
	async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

	/// Store a value. `None` never expires.
	async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError>;

	/// Succeeds whether or not the key existed.
	async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

struct Entry {
	value: Value,
	expires_at: Option<Instant>,
}

impl Entry {
	fn is_expired(&self, now: Instant) -> bool {
		self.expires_at.is_some_and(|exp| now >= exp)
	}
}

/// In-process [`Cache`]. Expired entries are dropped lazily on read or by [`MemoryCache::purge_expired`].
#[derive(Default)]
pub struct MemoryCache {
	entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn purge_expired(&self) -> usize {
		let now = Instant::now();
		let mut entries = self.entries.lock();
		let before = entries.len();
		entries.retain(|_, e| !e.is_expired(now));
		before - entries.len()
	}

	/// Number of stored entries, expired ones included.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

#[async_trait]
impl Cache for MemoryCache {
	async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
		let now = Instant::now();
		let mut entries = self.entries.lock();
		match entries.get(key) {
			Some(entry) if entry.is_expired(now) => {
				entries.remove(key);
				Ok(None)
			},
			Some(entry) => Ok(Some(entry.value.clone())),
			None => Ok(None),
		}
	}

	async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
		let entry = Entry {
			value,
			expires_at: ttl.map(|ttl| Instant::now() + ttl),
		};
		self.entries.lock().insert(key.to_string(), entry);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), CacheError> {
		self.entries.lock().remove(key);
		Ok(())
	}
}
