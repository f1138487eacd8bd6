// Batch coordinator
//
// Fans a batch out concurrently and answers in request order.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use super::Executor;
use crate::context::CallContext;
use crate::error::RpcError;
use crate::protocol::{Request, Response};

pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct BatchCoordinator {
	executor: Arc<Executor>,
	max_batch_size: usize,
}

impl BatchCoordinator {
	pub fn new(executor: Arc<Executor>, max_batch_size: usize) -> Self {
		Self {
			executor,
			max_batch_size,
		}
	}

	pub fn max_batch_size(&self) -> usize {
		self.max_batch_size
	}

	/// Run every request concurrently and return one response per request, by index.
	///
	/// An oversized batch is answered with a single `BadRequest` response instead.
	/// An empty batch is answered with a single `InvalidRequest` response.
	pub async fn call_batch(&self, ctx: &CallContext, requests: Vec<Request>) -> Vec<Response> {
		if requests.is_empty() {
			return vec![Response::failure(None, RpcError::invalid_request("Invalid request: empty batch"))];
		}
		if requests.len() > self.max_batch_size {
			warn!(target: "rpc_bridge", size = requests.len(), max = self.max_batch_size, "batch too large");
			return vec![Response::failure(
				None,
				RpcError::bad_request(format!(
					"Batch size {} exceeds maximum of {}",
					requests.len(),
					self.max_batch_size
				)),
			)];
		}

		debug!(target: "rpc_bridge", size = requests.len(), "dispatching batch");
		let calls = requests.into_iter().map(|request| self.executor.handle(ctx, request));
		join_all(calls).await
	}
}
