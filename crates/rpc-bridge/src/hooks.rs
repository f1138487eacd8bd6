// Hook bus
//
// Fire-and-forget lifecycle notifications:
// - Observers are registered per event kind and each runs in its own task
// - A panicking observer is discarded without affecting the caller or siblings
// - In-flight observer tasks are bounded; events past the bound are dropped

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::context::CallContext;
use crate::error::RpcError;

/// Default bound on concurrently running observer tasks.
pub const DEFAULT_HOOK_CONCURRENCY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
	BeforeCall,
	AfterCall,
	OnSuccess,
	OnError,
}

/// What an observer sees. `result`, `error` and `duration` are filled in once known.
#[derive(Debug, Clone)]
pub struct HookEvent {
	pub kind: HookKind,
	pub function: String,
	pub context: CallContext,
	pub params: Value,
	pub result: Option<Value>,
	pub error: Option<RpcError>,
	pub duration: Option<Duration>,
}

impl HookEvent {
	pub fn new(kind: HookKind, function: impl Into<String>, context: CallContext, params: Value) -> Self {
		Self {
			kind,
			function: function.into(),
			context,
			params,
			result: None,
			error: None,
			duration: None,
		}
	}

	/// The same call, re-tagged as another lifecycle point.
	pub fn with_kind(&self, kind: HookKind) -> Self {
		Self { kind, ..self.clone() }
	}
}

type Observer = Arc<dyn Fn(HookEvent) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct HookBus {
	observers: RwLock<HashMap<HookKind, Vec<Observer>>>,
	permits: Arc<Semaphore>,
	dropped: AtomicU64,
}

impl Default for HookBus {
	fn default() -> Self {
		Self::new(DEFAULT_HOOK_CONCURRENCY)
	}
}

impl std::fmt::Debug for HookBus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let counts: HashMap<HookKind, usize> = self.observers.read().iter().map(|(k, v)| (*k, v.len())).collect();
		f.debug_struct("HookBus")
			.field("observers", &counts)
			.field("available_permits", &self.permits.available_permits())
			.field("dropped", &self.dropped())
			.finish()
	}
}

impl HookBus {
	pub fn new(max_in_flight: usize) -> Self {
		Self {
			observers: RwLock::new(HashMap::new()),
			permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
			dropped: AtomicU64::new(0),
		}
	}

	/// Register a synchronous observer.
	pub fn register<F>(&self, kind: HookKind, observer: F)
	where
		F: Fn(&HookEvent) + Send + Sync + 'static,
	{
		let observer = Arc::new(observer);
		self.register_async(kind, move |event: HookEvent| {
			let observer = observer.clone();
			async move { observer(&event) }
		});
	}

	/// Register an observer that awaits. It runs on the runtime, never on the caller's task.
	pub fn register_async<F, Fut>(&self, kind: HookKind, observer: F)
	where
		F: Fn(HookEvent) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let observer: Observer = Arc::new(move |event| observer(event).boxed());
		self.observers.write().entry(kind).or_default().push(observer);
	}

	/// Notify every observer of `event.kind`. Never blocks and never fails.
	pub fn trigger(&self, event: HookEvent) {
		let observers = match self.observers.read().get(&event.kind) {
			Some(observers) if !observers.is_empty() => observers.clone(),
			_ => return,
		};

		let Ok(runtime) = tokio::runtime::Handle::try_current() else {
			self.drop_event(&event, "no async runtime");
			return;
		};

		for observer in observers {
			let Ok(permit) = self.permits.clone().try_acquire_owned() else {
				self.drop_event(&event, "observer concurrency exhausted");
				continue;
			};
			let event = event.clone();
			runtime.spawn(async move {
				let _permit = permit;
				let kind = event.kind;
				let function = event.function.clone();
				let run = AssertUnwindSafe(async move { observer(event).await });
				if run.catch_unwind().await.is_err() {
					debug!(target: "rpc_bridge", ?kind, function = %function, "hook observer panicked");
				}
			});
		}
	}

	fn drop_event(&self, event: &HookEvent, reason: &str) {
		self.dropped.fetch_add(1, Ordering::Relaxed);
		warn!(target: "rpc_bridge", kind = ?event.kind, function = %event.function, reason, "dropped hook event");
	}

	/// Remove every observer of one kind.
	pub fn clear(&self, kind: HookKind) {
		self.observers.write().remove(&kind);
	}

	pub fn clear_all(&self) {
		self.observers.write().clear();
	}

	pub fn observer_count(&self, kind: HookKind) -> usize {
		self.observers.read().get(&kind).map_or(0, Vec::len)
	}

	/// Observer invocations skipped because the bus was saturated or had no runtime.
	pub fn dropped(&self) -> u64 {
		self.dropped.load(Ordering::Relaxed)
	}
}
