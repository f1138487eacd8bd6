// Transport adapters
//
// HTTP, WebSocket and SSE front ends. All of them build a `CallContext` from
// the inbound request and funnel into the bridge's executor or batch coordinator.

mod introspection;
mod post;
mod sse;
mod ws;

use axum::Router;
use axum::routing::{any, get};
use tracing::debug;

pub use post::cors_layer;
use crate::bridge::Bridge;

pub(crate) fn router(bridge: Bridge) -> Router {
	let config = bridge.config().clone();

	let mut router = Router::new()
		.route(&config.path, any(post::handle))
		.route(&config.ws_path, get(ws::handle))
		.route(&config.sse_path, get(sse::handle).post(sse::handle));

	if let Some(path) = &config.introspection_path {
		router = router
			.route(path, get(introspection::functions))
			.route(&format!("{path}.ts"), get(introspection::typescript));
	}

	debug!(
		target: "rpc_bridge",
		path = %config.path,
		ws_path = %config.ws_path,
		sse_path = %config.sse_path,
		introspection_path = ?config.introspection_path,
		"built bridge router"
	);

	let router = router.with_state(bridge);
	match cors_layer(&config) {
		Some(cors) => router.layer(cors),
		None => router,
	}
}
