// SSE adapter
//
// Delivers one call's outcome as a single terminal event `{data?, error?, done: true}`.
// The stream opens immediately and carries keep-alive comments until the call ends.

use std::convert::Infallible;

use axum::extract::{Query, Request, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::bridge::Bridge;
use crate::context::Transport;
use crate::error::RpcError;
use crate::protocol;

/// `GET <ssePath>?method=<name>&params=<json>`
#[derive(Debug, Deserialize)]
struct CallQuery {
	method: Option<String>,
	params: Option<String>,
}

#[derive(Debug, Serialize)]
struct Outcome {
	#[serde(skip_serializing_if = "Option::is_none")]
	data: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<RpcError>,
	done: bool,
}

impl From<Result<Value, RpcError>> for Outcome {
	fn from(result: Result<Value, RpcError>) -> Self {
		let (data, error) = match result {
			Ok(data) => (Some(data), None),
			Err(error) => (None, Some(error)),
		};
		Outcome { data, error, done: true }
	}
}

impl Outcome {
	fn into_event(self) -> Event {
		Event::default().json_data(&self).unwrap_or_else(|e| {
			error!(target: "rpc_bridge", error = %e, "failed to encode SSE event");
			Event::default().data(r#"{"error":{"code":-32603,"message":"failed to encode result"},"done":true}"#)
		})
	}
}

pub(super) async fn handle(State(bridge): State<Bridge>, request: Request) -> Response {
	let (parts, body) = request.into_parts();

	let call = if parts.method == Method::GET {
		from_query(&parts.uri)
	} else {
		match axum::body::to_bytes(body, bridge.config().max_body_bytes).await {
			Ok(body) => from_body(&body),
			Err(_) => Err(RpcError::invalid_request("Invalid request: body unreadable or too large")),
		}
	};

	let ctx = bridge.context_for(Transport::Sse, &parts).await;
	let outcome = stream::once(async move {
		let result = match call {
			Ok((method, params)) => bridge.call(&ctx, &method, params).await,
			Err(err) => Err(err),
		};
		Ok::<_, Infallible>(Outcome::from(result).into_event())
	});

	Sse::new(outcome).keep_alive(KeepAlive::default()).into_response()
}

fn from_query(uri: &http::Uri) -> Result<(String, Option<Value>), RpcError> {
	let Query(query) = Query::<CallQuery>::try_from_uri(uri)
		.map_err(|e| RpcError::invalid_request(format!("Invalid request: {e}")))?;
	let method = query
		.method
		.filter(|m| !m.is_empty())
		.ok_or_else(|| RpcError::invalid_request("Invalid request: method is required"))?;
	let params = query
		.params
		.map(|p| serde_json::from_str::<Value>(&p))
		.transpose()
		.map_err(|e| RpcError::invalid_params("Invalid params").with_data(serde_json::json!({ "error": e.to_string() })))?;
	Ok((method, params))
}

fn from_body(body: &[u8]) -> Result<(String, Option<Value>), RpcError> {
	let request: protocol::Request = serde_json::from_slice(body).map_err(RpcError::parse_error)?;
	if !request.is_valid() {
		return Err(RpcError::invalid_request("Invalid request: method is required"));
	}
	Ok((request.method, request.params))
}
