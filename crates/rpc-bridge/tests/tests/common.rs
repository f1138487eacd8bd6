// Shared fixtures for the integration tests

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use http::{Method, Request, StatusCode};
use rpc_bridge::{Bridge, BridgeConfig, CallContext, FieldRule, FunctionOptions, HeaderAuthenticator};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::ServiceExt;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EchoInput {
	pub name: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct EchoOutput {
	pub message: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddInput {
	pub a: i64,
	pub b: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SignupInput {
	pub email: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct Empty {}

pub async fn echo(_ctx: CallContext, input: EchoInput) -> anyhow::Result<EchoOutput> {
	Ok(EchoOutput {
		message: format!("Hello, {}", input.name),
	})
}

async fn add(_ctx: CallContext, input: AddInput) -> anyhow::Result<i64> {
	Ok(input.a + input.b)
}

async fn slow(_ctx: CallContext, _: Empty) -> anyhow::Result<bool> {
	tokio::time::sleep(Duration::from_millis(500)).await;
	Ok(true)
}

async fn signup(_ctx: CallContext, input: SignupInput) -> anyhow::Result<String> {
	Ok(input.email)
}

/// A bridge with the demo functions every test file uses.
pub fn bridge_with(config: BridgeConfig) -> Bridge {
	let bridge = Bridge::new(config).with_authenticator(HeaderAuthenticator);
	bridge
		.register("echo", echo, FunctionOptions::new().description("Greets the given name"))
		.unwrap();
	bridge.register("add", add, FunctionOptions::default()).unwrap();
	bridge
		.register("slow", slow, FunctionOptions::new().timeout(Duration::from_millis(50)))
		.unwrap();
	bridge
		.register("admin_echo", echo, FunctionOptions::new().require_roles(["admin"]))
		.unwrap();
	bridge
		.register("limited", echo, FunctionOptions::new().rate_limit(2))
		.unwrap();
	bridge
		.register(
			"signup",
			signup,
			FunctionOptions::new().validate_field("email", FieldRule::Email),
		)
		.unwrap();
	bridge
}

pub fn bridge() -> Bridge {
	bridge_with(BridgeConfig::default())
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, http::HeaderMap, bytes::Bytes) {
	let response = router.clone().oneshot(request).await.unwrap();
	let status = response.status();
	let headers = response.headers().clone();
	let body = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
	(status, headers, body)
}

/// POST `body` to `path` and decode the JSON reply.
pub async fn post(router: &Router, path: &str, body: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
	let mut builder = Request::builder()
		.method(Method::POST)
		.uri(path)
		.header(http::header::CONTENT_TYPE, "application/json");
	for (name, value) in headers {
		builder = builder.header(*name, *value);
	}
	let (status, _, body) = send(router, builder.body(Body::from(body.to_string())).unwrap()).await;
	(status, serde_json::from_slice(&body).unwrap())
}

pub async fn get(router: &Router, path: &str) -> (StatusCode, http::HeaderMap, bytes::Bytes) {
	let request = Request::builder().method(Method::GET).uri(path).body(Body::empty()).unwrap();
	send(router, request).await
}

/// Serve the bridge on an ephemeral local port, for clients that need a real socket.
pub async fn serve(bridge: Bridge) -> SocketAddr {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let app = bridge.router().into_make_service_with_connect_info::<SocketAddr>();
	tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
	addr
}
