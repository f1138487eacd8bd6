// HTTP adapter end to end, through the axum router

use std::time::{Duration, Instant};

use axum::body::Body;
use http::{Method, Request, StatusCode, header};
use rpc_bridge::config::{CorsConfig, CsrfConfig};
use rpc_bridge::{BridgeConfig, HookKind};
use serde_json::json;
use tokio::sync::mpsc;

use crate::common::{bridge, bridge_with, get, post, send};

#[tokio::test]
async fn test_echo_round_trip() -> anyhow::Result<()> {
	let router = bridge().router();
	let (status, body) = post(
		&router,
		"/rpc",
		r#"{"jsonrpc":"2.0","id":"1","method":"echo","params":{"name":"World"}}"#,
		&[],
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, json!({"jsonrpc": "2.0", "id": "1", "result": {"message": "Hello, World"}}));
	assert!(body.get("error").is_none());
	Ok(())
}

#[tokio::test]
async fn test_unknown_method() {
	let router = bridge().router();
	let (_, body) = post(&router, "/rpc", r#"{"jsonrpc":"2.0","id":2,"method":"nope"}"#, &[]).await;
	assert_eq!(body["error"]["code"], -32601);
	assert_eq!(body["id"], 2);
	assert!(body.get("result").is_none());
}

#[tokio::test]
async fn test_missing_required_field_names_it() {
	let router = bridge().router();
	let (_, body) = post(
		&router,
		"/rpc",
		r#"{"jsonrpc":"2.0","id":3,"method":"echo","params":{}}"#,
		&[],
	)
	.await;
	assert_eq!(body["error"]["code"], -32602);
	assert_eq!(body["error"]["data"]["field"], "name");
}

#[tokio::test]
async fn test_field_validator() {
	let router = bridge().router();
	let (_, body) = post(
		&router,
		"/rpc",
		r#"{"jsonrpc":"2.0","id":4,"method":"signup","params":{"email":"nope"}}"#,
		&[],
	)
	.await;
	assert_eq!(body["error"]["code"], -32602);
	assert_eq!(body["error"]["data"], json!({"field": "email", "rule": "email"}));

	let (_, body) = post(
		&router,
		"/rpc",
		r#"{"jsonrpc":"2.0","id":5,"method":"signup","params":{"email":"ada@example.com"}}"#,
		&[],
	)
	.await;
	assert_eq!(body["result"], "ada@example.com");
}

#[tokio::test]
async fn test_get_is_invalid_request_with_200() {
	let router = bridge().router();
	let (status, _, body) = get(&router, "/rpc").await;
	assert_eq!(status, StatusCode::OK);
	let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
	assert_eq!(body["error"]["code"], -32600);
}

#[tokio::test]
async fn test_malformed_bodies() {
	let router = bridge().router();

	let (status, body) = post(&router, "/rpc", "{not json", &[]).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["error"]["code"], -32700);

	let (_, body) = post(&router, "/rpc", r#"{"jsonrpc":"2.0","id":1}"#, &[]).await;
	assert_eq!(body["error"]["code"], -32600);

	let (_, body) = post(&router, "/rpc", "42", &[]).await;
	assert_eq!(body["error"]["code"], -32600);
}

#[tokio::test]
async fn test_batch_preserves_order() {
	let router = bridge().router();
	let (_, body) = post(
		&router,
		"/rpc",
		r#"[
			{"jsonrpc":"2.0","id":1,"method":"slow"},
			{"jsonrpc":"2.0","id":2,"method":"add","params":{"a":2,"b":3}},
			{"jsonrpc":"2.0","id":3,"method":"missing"},
			{"jsonrpc":"2.0","id":4,"method":"echo","params":{"name":"B"}}
		]"#,
		&[],
	)
	.await;

	let responses = body.as_array().unwrap();
	assert_eq!(responses.len(), 4);
	assert_eq!(responses[0]["error"]["code"], -32003);
	assert_eq!(responses[1]["result"], 5);
	assert_eq!(responses[2]["error"]["code"], -32601);
	assert_eq!(responses[3]["result"]["message"], "Hello, B");
	for (i, response) in responses.iter().enumerate() {
		assert_eq!(response["id"], i + 1);
	}
}

#[tokio::test]
async fn test_oversized_batch_yields_one_response() {
	let router = bridge_with(BridgeConfig {
		max_batch_size: 2,
		..BridgeConfig::default()
	})
	.router();
	let batch = json!([
		{"jsonrpc": "2.0", "id": 1, "method": "add", "params": {"a": 1, "b": 1}},
		{"jsonrpc": "2.0", "id": 2, "method": "add", "params": {"a": 1, "b": 1}},
		{"jsonrpc": "2.0", "id": 3, "method": "add", "params": {"a": 1, "b": 1}},
	]);
	let (_, body) = post(&router, "/rpc", &batch.to_string(), &[]).await;
	let responses = body.as_array().unwrap();
	assert_eq!(responses.len(), 1);
	assert_eq!(responses[0]["error"]["code"], -32004);
}

#[tokio::test]
async fn test_timeout_over_http() {
	let router = bridge().router();
	let started = Instant::now();
	let (_, body) = post(&router, "/rpc", r#"{"jsonrpc":"2.0","id":1,"method":"slow"}"#, &[]).await;
	assert_eq!(body["error"]["code"], -32003);
	assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test]
async fn test_roles_from_headers() {
	let router = bridge().router();
	let call = r#"{"jsonrpc":"2.0","id":1,"method":"admin_echo","params":{"name":"root"}}"#;

	let (_, body) = post(&router, "/rpc", call, &[]).await;
	assert_eq!(body["error"]["code"], -32001);

	let (_, body) = post(&router, "/rpc", call, &[("x-user-id", "u1"), ("x-user-roles", "user")]).await;
	assert_eq!(body["error"]["code"], -32005);

	let (_, body) = post(
		&router,
		"/rpc",
		call,
		&[("x-user-id", "u2"), ("x-user-roles", "user,admin")],
	)
	.await;
	assert_eq!(body["result"]["message"], "Hello, root");
}

#[tokio::test]
async fn test_rate_limit_per_user() {
	let router = bridge().router();
	let call = r#"{"jsonrpc":"2.0","id":1,"method":"limited","params":{"name":"x"}}"#;
	let alice = [("x-user-id", "alice")];

	for _ in 0..2 {
		let (_, body) = post(&router, "/rpc", call, &alice).await;
		assert!(body.get("result").is_some(), "{body}");
	}
	let (_, body) = post(&router, "/rpc", call, &alice).await;
	assert_eq!(body["error"]["code"], -32002);

	let (_, body) = post(&router, "/rpc", call, &[("x-user-id", "bob")]).await;
	assert!(body.get("result").is_some());
}

#[tokio::test]
async fn test_csrf_double_submit() {
	let router = bridge_with(BridgeConfig {
		csrf: CsrfConfig {
			enabled: true,
			..CsrfConfig::default()
		},
		..BridgeConfig::default()
	})
	.router();
	let call = r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":{"name":"csrf"}}"#;

	let (status, body) = post(&router, "/rpc", call, &[]).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["error"]["code"], -32004);

	let (_, body) = post(
		&router,
		"/rpc",
		call,
		&[("X-CSRF-Token", "t0k3n"), ("cookie", "csrf_token=other")],
	)
	.await;
	assert_eq!(body["error"]["code"], -32004);

	let (_, body) = post(
		&router,
		"/rpc",
		call,
		&[("X-CSRF-Token", "t0k3n"), ("cookie", "theme=dark; csrf_token=t0k3n")],
	)
	.await;
	assert_eq!(body["result"]["message"], "Hello, csrf");
}

#[tokio::test]
async fn test_cors_preflight() {
	let router = bridge_with(BridgeConfig {
		cors: CorsConfig {
			enabled: true,
			allowed_origins: vec!["https://app.example.com".to_string()],
		},
		..BridgeConfig::default()
	})
	.router();

	let preflight = |origin: &str| {
		Request::builder()
			.method(Method::OPTIONS)
			.uri("/rpc")
			.header(header::ORIGIN, origin)
			.header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
			.header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
			.body(Body::empty())
			.unwrap()
	};

	let (status, headers, _) = send(&router, preflight("https://app.example.com")).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(
		headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
		"https://app.example.com"
	);

	let (_, headers, _) = send(&router, preflight("https://evil.example.com")).await;
	assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_hooks_observe_http_calls() {
	let bridge = bridge();
	let (tx, mut rx) = mpsc::unbounded_channel();
	bridge.hooks().register(HookKind::AfterCall, move |event| {
		tx.send((event.function.clone(), event.duration.is_some())).unwrap();
	});
	let router = bridge.router();

	post(
		&router,
		"/rpc",
		r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":{"name":"hook"}}"#,
		&[],
	)
	.await;

	// observers run after the response may already be written
	let (function, timed) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
		.await
		.unwrap()
		.unwrap();
	assert_eq!(function, "echo");
	assert!(timed);
}
