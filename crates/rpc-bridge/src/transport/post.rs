// HTTP adapter
//
// One endpoint, POST only. Protocol-level failures are JSON-RPC error bodies
// with status 200, never bare HTTP errors.

use axum::Json;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, warn};

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::context::{Transport, USER_ID_HEADER, USER_ROLES_HEADER};
use crate::error::RpcError;
use crate::protocol::{self, Incoming};

fn error_response(error: RpcError) -> Response {
	Json(protocol::Response::failure(None, error)).into_response()
}

pub(super) async fn handle(State(bridge): State<Bridge>, request: Request) -> Response {
	let (parts, body) = request.into_parts();

	if parts.method != Method::POST {
		debug!(target: "rpc_bridge", method = %parts.method, "rejected non-POST request");
		return error_response(RpcError::invalid_request(format!(
			"Invalid request: method {} not allowed, use POST",
			parts.method
		)));
	}

	if let Err(err) = bridge.security().check_csrf(&parts.method, &parts.headers) {
		return error_response(err);
	}

	let body = match axum::body::to_bytes(body, bridge.config().max_body_bytes).await {
		Ok(body) => body,
		Err(e) => {
			warn!(target: "rpc_bridge", error = %e, "failed to read request body");
			return error_response(RpcError::invalid_request("Invalid request: body unreadable or too large"));
		},
	};

	let ctx = bridge.context_for(Transport::Http, &parts).await;
	match Incoming::parse(&body) {
		Ok(Incoming::Single(request)) => Json(bridge.call_request(&ctx, request).await).into_response(),
		Ok(Incoming::Batch(requests)) => Json(bridge.call_batch(&ctx, requests).await).into_response(),
		Err(err) => error_response(err),
	}
}

/// CORS for the bridge routes, or `None` when disabled.
///
/// Only allow-listed origins are echoed back; preflight requests are answered
/// by the layer itself.
pub fn cors_layer(config: &BridgeConfig) -> Option<CorsLayer> {
	if !config.cors.enabled {
		return None;
	}

	let origins: Vec<HeaderValue> = config
		.cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match HeaderValue::from_str(origin) {
			Ok(v) if v != "*" => Some(v),
			_ => {
				warn!(target: "rpc_bridge", origin = %origin, "ignoring invalid CORS origin");
				None
			},
		})
		.collect();

	let mut headers = vec![
		header::CONTENT_TYPE,
		header::AUTHORIZATION,
		HeaderName::from_static(USER_ID_HEADER),
		HeaderName::from_static(USER_ROLES_HEADER),
	];
	if let Ok(name) = HeaderName::from_bytes(config.csrf.header_name.as_bytes()) {
		headers.push(name);
	}

	Some(
		CorsLayer::new()
			.allow_origin(AllowOrigin::list(origins))
			.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
			.allow_headers(headers)
			.allow_credentials(true),
	)
}
