// SSE adapter: one terminal event per call

use axum::body::Body;
use http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};

use crate::common::{bridge, get, send};

/// The JSON payload of the single `data:` line in an SSE body.
fn terminal_event(body: &[u8]) -> Value {
	let text = std::str::from_utf8(body).unwrap();
	let events: Vec<&str> = text.lines().filter_map(|l| l.strip_prefix("data:")).collect();
	assert_eq!(events.len(), 1, "expected one event in {text:?}");
	serde_json::from_str(events[0].trim()).unwrap()
}

#[tokio::test]
async fn test_sse_get_with_query() {
	let router = bridge().router();
	let (status, headers, body) = get(
		&router,
		"/rpc/sse?method=echo&params=%7B%22name%22%3A%22stream%22%7D",
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert!(
		headers
			.get(header::CONTENT_TYPE)
			.unwrap()
			.to_str()
			.unwrap()
			.starts_with("text/event-stream")
	);
	assert_eq!(
		terminal_event(&body),
		json!({"data": {"message": "Hello, stream"}, "done": true})
	);
}

#[tokio::test]
async fn test_sse_post_body() {
	let router = bridge().router();
	let request = Request::builder()
		.method(Method::POST)
		.uri("/rpc/sse")
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(r#"{"jsonrpc":"2.0","method":"add","params":{"a":40,"b":2}}"#))
		.unwrap();
	let (_, _, body) = send(&router, request).await;
	assert_eq!(terminal_event(&body), json!({"data": 42, "done": true}));
}

#[tokio::test]
async fn test_sse_errors_are_terminal_events() {
	let router = bridge().router();

	let (status, _, body) = get(&router, "/rpc/sse?method=missing").await;
	assert_eq!(status, StatusCode::OK);
	let event = terminal_event(&body);
	assert_eq!(event["error"]["code"], -32601);
	assert_eq!(event["done"], true);
	assert!(event.get("data").is_none());

	let (_, _, body) = get(&router, "/rpc/sse?method=slow").await;
	assert_eq!(terminal_event(&body)["error"]["code"], -32003);

	let (_, _, body) = get(&router, "/rpc/sse").await;
	assert_eq!(terminal_event(&body)["error"]["code"], -32600);
}
