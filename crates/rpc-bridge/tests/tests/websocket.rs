// WebSocket adapter over a real socket: framing, keepalive pings and shutdown

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rpc_bridge::BridgeConfig;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::common::{bridge, bridge_with, serve};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(addr: SocketAddr) -> Client {
	let (socket, _) = connect_async(format!("ws://{addr}/rpc/ws")).await.unwrap();
	socket
}

async fn next_frame(socket: &mut Client) -> Message {
	tokio::time::timeout(Duration::from_secs(2), socket.next())
		.await
		.expect("frame within deadline")
		.expect("socket still open")
		.unwrap()
}

#[tokio::test]
async fn test_one_response_per_frame_matched_by_id() {
	let mut socket = connect(serve(bridge()).await).await;

	// the slow call times out after its siblings have answered
	let frames = [
		json!({"jsonrpc": "2.0", "id": 1, "method": "slow"}),
		json!({"jsonrpc": "2.0", "id": 2, "method": "echo", "params": {"name": "two"}}),
		json!({"jsonrpc": "2.0", "id": 3, "method": "add", "params": {"a": 1, "b": 2}}),
	];
	for frame in &frames {
		socket.send(Message::Text(frame.to_string().into())).await.unwrap();
	}

	let mut responses: HashMap<i64, Value> = HashMap::new();
	let mut order = Vec::new();
	while responses.len() < frames.len() {
		if let Message::Text(text) = next_frame(&mut socket).await {
			let response: Value = serde_json::from_str(text.as_str()).unwrap();
			let id = response["id"].as_i64().unwrap();
			assert!(responses.insert(id, response).is_none(), "duplicate response for id {id}");
			order.push(id);
		}
	}

	assert_eq!(responses[&1]["error"]["code"], -32003);
	assert_eq!(responses[&2]["result"], json!({"message": "Hello, two"}));
	assert_eq!(responses[&3]["result"], json!(3));
	assert_eq!(order.last(), Some(&1));
}

#[tokio::test]
async fn test_keepalive_ping() {
	let bridge = bridge_with(BridgeConfig {
		ws_ping_interval: Duration::from_millis(50),
		..BridgeConfig::default()
	});
	let mut socket = connect(serve(bridge).await).await;

	let ping = tokio::time::timeout(Duration::from_secs(1), async {
		loop {
			if let Message::Ping(_) = next_frame(&mut socket).await {
				return;
			}
		}
	})
	.await;
	assert!(ping.is_ok(), "no ping within a second");
}

#[tokio::test]
async fn test_connection_ends_after_client_closes() {
	let addr = serve(bridge()).await;
	let mut socket = connect(addr).await;
	socket.close(None).await.unwrap();

	let ended = tokio::time::timeout(Duration::from_secs(2), async {
		loop {
			match socket.next().await {
				Some(Ok(_)) => continue,
				Some(Err(_)) | None => return,
			}
		}
	})
	.await;
	assert!(ended.is_ok(), "server kept the connection open");

	// the server keeps accepting new connections
	let mut socket = connect(addr).await;
	let frame = json!({"jsonrpc": "2.0", "id": 9, "method": "echo", "params": {"name": "again"}});
	socket.send(Message::Text(frame.to_string().into())).await.unwrap();
	let Message::Text(text) = next_frame(&mut socket).await else {
		panic!("expected a text frame");
	};
	let response: Value = serde_json::from_str(text.as_str()).unwrap();
	assert_eq!(response["id"], 9);
	assert_eq!(response["result"], json!({"message": "Hello, again"}));
}

#[tokio::test]
async fn test_batch_frames_are_rejected() {
	let mut socket = connect(serve(bridge()).await).await;
	let batch = json!([{"jsonrpc": "2.0", "id": 1, "method": "echo", "params": {"name": "x"}}]);
	socket.send(Message::Text(batch.to_string().into())).await.unwrap();

	let Message::Text(text) = next_frame(&mut socket).await else {
		panic!("expected a text frame");
	};
	let response: Value = serde_json::from_str(text.as_str()).unwrap();
	assert_eq!(response["error"]["code"], -32600);
}
