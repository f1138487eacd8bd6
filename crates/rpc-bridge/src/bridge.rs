//! The bridge: one instance owns the registry, security gate, hook bus and
//! executor, and is handed by value (it is cheap to clone) to every transport.

use std::future::Future;
use std::sync::Arc;

use http::request::Parts;
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::BridgeConfig;
use crate::context::{Authenticator, AuthenticatorRef, CallContext, Transport};
use crate::error::{RegistryError, RpcError};
use crate::executor::{BatchCoordinator, Executor};
use crate::hooks::HookBus;
use crate::protocol::{Request, Response};
use crate::registry::{FunctionInfo, FunctionOptions, FunctionRegistry};
use crate::security::SecurityGate;

#[derive(Clone, Debug)]
pub struct Bridge {
	inner: Arc<Inner>,
}

struct Inner {
	config: BridgeConfig,
	registry: Arc<FunctionRegistry>,
	security: Arc<SecurityGate>,
	hooks: Arc<HookBus>,
	executor: Arc<Executor>,
	batch: BatchCoordinator,
	authenticator: RwLock<Option<AuthenticatorRef>>,
}

impl std::fmt::Debug for Inner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Bridge")
			.field("config", &self.config)
			.field("functions", &self.registry.len())
			.field("authenticator", &self.authenticator.read().is_some())
			.finish_non_exhaustive()
	}
}

impl Default for Bridge {
	fn default() -> Self {
		Self::new(BridgeConfig::default())
	}
}

impl Bridge {
	pub fn new(config: BridgeConfig) -> Self {
		let registry = Arc::new(FunctionRegistry::new());
		let security = Arc::new(SecurityGate::new(config.csrf.clone(), config.rate_limit_idle_ttl));
		let hooks = Arc::new(HookBus::new(config.hook_concurrency));
		let executor = Arc::new(Executor::new(
			registry.clone(),
			security.clone(),
			hooks.clone(),
			config.default_timeout,
		));
		let batch = BatchCoordinator::new(executor.clone(), config.max_batch_size);
		Self {
			inner: Arc::new(Inner {
				config,
				registry,
				security,
				hooks,
				executor,
				batch,
				authenticator: RwLock::new(None),
			}),
		}
	}

	/// Attach an authenticator, run once per HTTP request, SSE request or WebSocket upgrade.
	pub fn with_authenticator(self, authenticator: impl Authenticator + 'static) -> Self {
		self.set_authenticator(authenticator);
		self
	}

	pub fn set_authenticator(&self, authenticator: impl Authenticator + 'static) {
		*self.inner.authenticator.write() = Some(Arc::new(authenticator));
	}

	pub fn config(&self) -> &BridgeConfig {
		&self.inner.config
	}

	pub fn registry(&self) -> &Arc<FunctionRegistry> {
		&self.inner.registry
	}

	pub fn security(&self) -> &Arc<SecurityGate> {
		&self.inner.security
	}

	pub fn hooks(&self) -> &Arc<HookBus> {
		&self.inner.hooks
	}

	/// See [`FunctionRegistry::register`].
	pub fn register<I, O, F, Fut>(
		&self,
		name: impl Into<String>,
		handler: F,
		options: FunctionOptions,
	) -> Result<(), RegistryError>
	where
		I: DeserializeOwned + JsonSchema + Send + 'static,
		O: Serialize + JsonSchema + Send + 'static,
		F: Fn(CallContext, I) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
	{
		self.inner.registry.register(name, handler, options)
	}

	/// Remove a function along with its rate-limit state.
	pub fn unregister(&self, name: &str) -> Result<(), RegistryError> {
		self.inner.registry.unregister(name)?;
		self.inner.security.forget_function(name);
		Ok(())
	}

	pub fn functions(&self) -> Vec<FunctionInfo> {
		self.inner.registry.describe()
	}

	/// Call a function in-process.
	pub async fn call(&self, ctx: &CallContext, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
		self.inner.executor.execute(ctx, method, params).await
	}

	pub async fn call_request(&self, ctx: &CallContext, request: Request) -> Response {
		self.inner.executor.handle(ctx, request).await
	}

	pub async fn call_batch(&self, ctx: &CallContext, requests: Vec<Request>) -> Vec<Response> {
		self.inner.batch.call_batch(ctx, requests).await
	}

	/// Build the call context for an inbound request, resolving the caller.
	pub async fn context_for(&self, transport: Transport, parts: &Parts) -> CallContext {
		let mut ctx = CallContext::from_parts(transport, parts);
		let authenticator = self.inner.authenticator.read().clone();
		if let Some(authenticator) = authenticator {
			ctx.user = authenticator.authenticate(parts).await;
		}
		ctx
	}

	/// HTTP, WebSocket, SSE and introspection routes, per the configured paths.
	pub fn router(&self) -> axum::Router {
		crate::transport::router(self.clone())
	}

	/// Spawn the rate-limit sweeper. The tasks stop once the bridge is dropped.
	pub fn start_background_tasks(&self) -> Vec<JoinHandle<()>> {
		let interval = self.inner.config.rate_limit_sweep_interval;
		info!(target: "rpc_bridge", interval_ms = interval.as_millis() as u64, "starting rate limit sweeper");
		vec![self.inner.security.clone().spawn_sweeper(interval)]
	}
}
