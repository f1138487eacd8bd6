mod common;
mod introspection;
mod rpc_http;
mod streaming;
mod websocket;
