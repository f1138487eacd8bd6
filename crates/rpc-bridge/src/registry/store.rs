// Function registry: named callables behind a single reader/writer lock

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use super::function::{ErasedHandler, FunctionInfo, FunctionOptions, RegisteredFunction};
use super::introspect;
use crate::codec;
use crate::context::CallContext;
use crate::error::{RegistryError, RpcError};

/// Thread-safe map of registered functions.
///
/// Reads take the shared lock, registration and removal take the exclusive lock.
/// Nothing is awaited while a lock is held.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
	functions: RwLock<HashMap<String, Arc<RegisteredFunction>>>,
}

impl FunctionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a typed handler `(CallContext, I) -> Result<O>`.
	///
	/// The input type must describe a structured object; the handler's shapes are
	/// captured for validation and introspection. Fails without touching the
	/// registry when the name is taken or the signature is unusable.
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
		let name = name.into();
		if name.trim().is_empty() {
			return Err(RegistryError::InvalidName);
		}

		let input = introspect::describe_input::<I>(&name)?;
		let output = introspect::describe_output::<O>(&name)?;

		let handler = Arc::new(handler);
		let erased: ErasedHandler = Arc::new(move |ctx, params| {
			let handler = handler.clone();
			Box::pin(async move {
				let input: I = codec::decode(params)?;
				let output = (*handler)(ctx, input).await.map_err(RpcError::from_handler)?;
				serde_json::to_value(output)
					.map_err(|e| RpcError::internal(format!("failed to encode result: {e}")))
			})
		});

		let function = RegisteredFunction::new(name.clone(), input, output, options, erased);
		self.insert(function)?;
		info!(target: "rpc_bridge", function = %name, "registered function");
		Ok(())
	}

	fn insert(&self, function: RegisteredFunction) -> Result<(), RegistryError> {
		let mut functions = self.functions.write();
		if functions.contains_key(&function.name) {
			return Err(RegistryError::DuplicateName(function.name));
		}
		functions.insert(function.name.clone(), Arc::new(function));
		Ok(())
	}

	pub fn unregister(&self, name: &str) -> Result<(), RegistryError> {
		let removed = self.functions.write().remove(name);
		match removed {
			Some(_) => {
				info!(target: "rpc_bridge", function = %name, "unregistered function");
				Ok(())
			},
			None => Err(RegistryError::NotFound(name.to_string())),
		}
	}

	pub fn get(&self, name: &str) -> Result<Arc<RegisteredFunction>, RegistryError> {
		self
			.functions
			.read()
			.get(name)
			.cloned()
			.ok_or_else(|| RegistryError::NotFound(name.to_string()))
	}

	pub fn contains(&self, name: &str) -> bool {
		self.functions.read().contains_key(name)
	}

	/// Snapshot of registered names, in no particular order.
	pub fn list(&self) -> Vec<String> {
		self.functions.read().keys().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.functions.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.functions.read().is_empty()
	}

	/// Introspection view of every function, sorted by name.
	pub fn describe(&self) -> Vec<FunctionInfo> {
		let snapshot: Vec<Arc<RegisteredFunction>> = self.functions.read().values().cloned().collect();
		let mut infos: Vec<FunctionInfo> = snapshot.iter().map(|f| f.info()).collect();
		infos.sort_by(|a, b| a.name.cmp(&b.name));
		infos
	}
}
