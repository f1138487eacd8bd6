// WebSocket adapter
//
// One text frame in, one text frame out. Frames are answered as their calls
// finish, so responses may interleave; clients match them by id.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Request, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::bridge::Bridge;
use crate::context::{CallContext, Transport};
use crate::error::RpcError;
use crate::protocol;

/// Outbound frames buffered per connection before call tasks wait on the writer.
const OUTBOUND_BUFFER: usize = 64;

pub(super) async fn handle(State(bridge): State<Bridge>, request: Request) -> Response {
	let (mut parts, _body) = request.into_parts();
	let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &bridge).await {
		Ok(upgrade) => upgrade,
		Err(rejection) => return rejection.into_response(),
	};
	let ctx = bridge.context_for(Transport::WebSocket, &parts).await;
	upgrade.on_upgrade(move |socket| serve(bridge, ctx, socket))
}

async fn serve(bridge: Bridge, ctx: CallContext, socket: WebSocket) {
	let (mut sink, mut stream) = socket.split();
	let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);
	let ping_interval = bridge.config().ws_ping_interval;

	let mut writer = tokio::spawn(async move {
		let mut ticker = tokio::time::interval(ping_interval);
		ticker.tick().await;
		loop {
			let message = tokio::select! {
				message = rx.recv() => match message {
					Some(message) => message,
					None => break,
				},
				_ = ticker.tick() => Message::Ping(Bytes::new()),
			};
			if let Err(e) = sink.send(message).await {
				error!(target: "rpc_bridge", error = %e, "websocket write failed, closing");
				break;
			}
		}
		let _ = sink.close().await;
	});

	debug!(target: "rpc_bridge", request_id = %ctx.request_id, "websocket connected");
	loop {
		let frame = tokio::select! {
			frame = stream.next() => frame,
			_ = &mut writer => break,
		};
		match frame {
			Some(Ok(Message::Text(text))) => {
				let bridge = bridge.clone();
				let ctx = ctx.clone();
				let tx = tx.clone();
				tokio::spawn(async move {
					let response = answer(&bridge, &ctx, text.as_str()).await;
					match serde_json::to_string(&response) {
						Ok(json) => {
							// a closed channel means the connection is going away
							let _ = tx.send(Message::Text(json.into())).await;
						},
						Err(e) => error!(target: "rpc_bridge", error = %e, "failed to encode websocket response"),
					}
				});
			},
			Some(Ok(Message::Close(_))) | None => break,
			// Pings are answered by the socket itself; binary frames are not part of the protocol.
			Some(Ok(_)) => {},
			Some(Err(e)) => {
				warn!(target: "rpc_bridge", error = %e, "websocket read failed");
				break;
			},
		}
	}

	writer.abort();
	debug!(target: "rpc_bridge", request_id = %ctx.request_id, "websocket disconnected");
}

/// Decode one frame as a single request and run it. Batches are not accepted here.
async fn answer(bridge: &Bridge, ctx: &CallContext, text: &str) -> protocol::Response {
	let value: Value = match serde_json::from_str(text) {
		Ok(value) => value,
		Err(e) => return protocol::Response::failure(None, RpcError::parse_error(e)),
	};
	if !value.is_object() {
		return protocol::Response::failure(
			None,
			RpcError::invalid_request("Invalid request: expected a single request object"),
		);
	}
	match serde_json::from_value::<protocol::Request>(value) {
		Ok(request) => bridge.call_request(ctx, request).await,
		Err(e) => protocol::Response::failure(None, RpcError::invalid_request(format!("Invalid request: {e}"))),
	}
}
