// Call executor
//
// Runs one call through its lifecycle:
// - Lookup, then the BeforeCall hook
// - Security gate (auth, roles, rate limit) and parameter validation
// - The handler, on its own task, under a deadline and with panics recovered
// - OnSuccess or OnError, then AfterCall with the elapsed time

mod batch;
mod panic;

pub use batch::{BatchCoordinator, DEFAULT_MAX_BATCH_SIZE};

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use crate::codec;
use crate::context::CallContext;
use crate::error::RpcError;
use crate::hooks::{HookBus, HookEvent, HookKind};
use crate::protocol::{Request, Response};
use crate::registry::{FunctionRegistry, RegisteredFunction};
use crate::security::SecurityGate;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct Executor {
	registry: Arc<FunctionRegistry>,
	security: Arc<SecurityGate>,
	hooks: Arc<HookBus>,
	default_timeout: Duration,
}

impl Executor {
	pub fn new(
		registry: Arc<FunctionRegistry>,
		security: Arc<SecurityGate>,
		hooks: Arc<HookBus>,
		default_timeout: Duration,
	) -> Self {
		Self {
			registry,
			security,
			hooks,
			default_timeout,
		}
	}

	pub fn default_timeout(&self) -> Duration {
		self.default_timeout
	}

	/// Answer one request envelope. Always produces a response.
	pub async fn handle(&self, ctx: &CallContext, request: Request) -> Response {
		if !request.is_valid() {
			return Response::failure(request.id, RpcError::invalid_request("Invalid request: method is required"));
		}
		let result = self.execute(ctx, &request.method, request.params).await;
		Response::from_result(request.id, result)
	}

	/// Execute `method` with untyped `params` on behalf of the caller in `ctx`.
	///
	/// Handler failures, panics and deadline expiry all come back as an
	/// `RpcError`; nothing a handler does can unwind into the caller.
	pub async fn execute(&self, ctx: &CallContext, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
		let function = self.registry.get(method)?;
		let ctx = ctx.for_call();
		let params = codec::normalize(params);

		let event = HookEvent::new(HookKind::BeforeCall, method, ctx.clone(), params.clone());
		self.hooks.trigger(event.clone());

		let started = Instant::now();
		let result = self.run(ctx, &function, params).await;
		let elapsed = started.elapsed();

		let mut done = event.with_kind(HookKind::AfterCall);
		done.duration = Some(elapsed);
		match &result {
			Ok(value) => {
				debug!(target: "rpc_bridge", function = %method, elapsed_ms = elapsed.as_millis() as u64, "call succeeded");
				done.result = Some(value.clone());
				self.hooks.trigger(done.with_kind(HookKind::OnSuccess));
			},
			Err(err) => {
				debug!(target: "rpc_bridge", function = %method, code = ?err.code, elapsed_ms = elapsed.as_millis() as u64, "call failed");
				done.error = Some(err.clone());
				self.hooks.trigger(done.with_kind(HookKind::OnError));
			},
		}
		self.hooks.trigger(done);
		result
	}

	async fn run(&self, ctx: CallContext, function: &Arc<RegisteredFunction>, params: Value) -> Result<Value, RpcError> {
		self.security.check_auth(&ctx, function)?;
		self.security.check_rate_limit(&ctx, function)?;
		codec::validate(&params, function)?;
		self.invoke(ctx, function, params).await
	}

	/// Run the handler on its own task so a panic or an overrun stays contained.
	///
	/// On deadline expiry the call's cancellation token fires and the task is
	/// detached; whatever it eventually returns is dropped.
	async fn invoke(&self, ctx: CallContext, function: &Arc<RegisteredFunction>, params: Value) -> Result<Value, RpcError> {
		let deadline = function.effective_timeout(self.default_timeout);
		let cancel = ctx.cancellation().clone();
		let task = tokio::spawn(panic::catch_panic(function.invoke(ctx, params)));

		match tokio::time::timeout(deadline, task).await {
			Ok(Ok(Ok(result))) => result,
			Ok(Ok(Err(panicked))) => {
				warn!(target: "rpc_bridge", function = %function.name, panic = %panicked.message, "handler panicked");
				Err(panicked.into_error())
			},
			Ok(Err(join_err)) => Err(RpcError::internal(format!("handler task failed: {join_err}"))),
			Err(_) => {
				cancel.cancel();
				warn!(target: "rpc_bridge", function = %function.name, timeout_ms = deadline.as_millis() as u64, "handler timed out");
				Err(RpcError::timeout(deadline.as_millis()))
			},
		}
	}
}
