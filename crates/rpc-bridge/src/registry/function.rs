// Registered function descriptor and registration options

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use super::introspect::Shape;
use crate::codec::FieldRule;
use crate::context::CallContext;
use crate::error::RpcError;

pub(crate) type HandlerFuture = BoxFuture<'static, Result<Value, RpcError>>;

/// Type-erased handler: decodes its typed input, runs, and encodes its output.
pub(crate) type ErasedHandler = Arc<dyn Fn(CallContext, Value) -> HandlerFuture + Send + Sync>;

/// Per-function policy applied at registration time.
#[derive(Debug, Clone, Default)]
pub struct FunctionOptions {
	pub(crate) description: Option<String>,
	pub(crate) require_auth: bool,
	pub(crate) require_roles: HashSet<String>,
	pub(crate) timeout: Option<Duration>,
	pub(crate) rate_limit_per_minute: u32,
	pub(crate) cacheable: bool,
	pub(crate) cache_ttl: Option<Duration>,
	pub(crate) validators: Vec<(String, FieldRule)>,
}

impl FunctionOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn require_auth(mut self) -> Self {
		self.require_auth = true;
		self
	}

	/// Callers must hold at least one of `roles`. Implies `require_auth`.
	pub fn require_roles<I, S>(mut self, roles: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.require_auth = true;
		self.require_roles.extend(roles.into_iter().map(Into::into));
		self
	}

	/// Override the process-wide default deadline. A zero duration keeps the default.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = (!timeout.is_zero()).then_some(timeout);
		self
	}

	/// Per-caller limit for this function. Zero means unlimited.
	pub fn rate_limit(mut self, per_minute: u32) -> Self {
		self.rate_limit_per_minute = per_minute;
		self
	}

	/// Cache hint reported through introspection. The executor does not consult a cache.
	pub fn cache(mut self, ttl: Duration) -> Self {
		self.cacheable = true;
		self.cache_ttl = (!ttl.is_zero()).then_some(ttl);
		self
	}

	/// Attach an extra validator to an input field (wire name).
	pub fn validate_field(mut self, field: impl Into<String>, rule: FieldRule) -> Self {
		self.validators.push((field.into(), rule));
		self
	}
}

/// One exposed callable, owned by the registry.
pub struct RegisteredFunction {
	pub name: String,
	pub description: Option<String>,
	pub input: Shape,
	pub output: Shape,
	pub require_auth: bool,
	pub require_roles: HashSet<String>,
	pub timeout: Option<Duration>,
	pub rate_limit_per_minute: u32,
	pub cacheable: bool,
	pub cache_ttl: Option<Duration>,
	pub validators: Vec<(String, FieldRule)>,
	pub(crate) handler: ErasedHandler,
}

impl RegisteredFunction {
	pub(crate) fn new(
		name: String,
		input: Shape,
		output: Shape,
		options: FunctionOptions,
		handler: ErasedHandler,
	) -> Self {
		let FunctionOptions {
			description,
			require_auth,
			require_roles,
			timeout,
			rate_limit_per_minute,
			cacheable,
			cache_ttl,
			validators,
		} = options;
		Self {
			name,
			description,
			input,
			output,
			require_auth,
			require_roles,
			timeout,
			rate_limit_per_minute,
			cacheable,
			cache_ttl,
			validators,
			handler,
		}
	}

	/// The deadline for one call: the override, or `default` when unset.
	pub fn effective_timeout(&self, default: Duration) -> Duration {
		self.timeout.unwrap_or(default)
	}

	pub(crate) fn invoke(&self, ctx: CallContext, params: Value) -> HandlerFuture {
		(self.handler)(ctx, params)
	}

	/// Serializable summary for the introspection endpoint.
	pub fn info(&self) -> FunctionInfo {
		let mut roles: Vec<String> = self.require_roles.iter().cloned().collect();
		roles.sort();
		FunctionInfo {
			name: self.name.clone(),
			description: self.description.clone(),
			require_auth: self.require_auth,
			roles,
			timeout_ms: self.timeout.map(|d| d.as_millis() as u64),
			rate_limit_per_minute: (self.rate_limit_per_minute > 0).then_some(self.rate_limit_per_minute),
			cacheable: self.cacheable,
			cache_ttl_ms: self.cache_ttl.map(|d| d.as_millis() as u64),
			input: self.input.clone(),
			output: self.output.clone(),
		}
	}
}

impl fmt::Debug for RegisteredFunction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RegisteredFunction")
			.field("name", &self.name)
			.field("input", &self.input.type_name)
			.field("output", &self.output.type_name)
			.field("require_auth", &self.require_auth)
			.field("require_roles", &self.require_roles)
			.field("timeout", &self.timeout)
			.field("rate_limit_per_minute", &self.rate_limit_per_minute)
			.finish_non_exhaustive()
	}
}

/// Introspection view of a registered function.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInfo {
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	pub require_auth: bool,
	pub roles: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timeout_ms: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rate_limit_per_minute: Option<u32>,
	pub cacheable: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cache_ttl_ms: Option<u64>,
	pub input: Shape,
	pub output: Shape,
}
