// JSON-RPC 2.0 envelope types and body probing

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

fn default_version() -> String {
	JSONRPC_VERSION.to_string()
}

/// Keeps an explicit `null` id distinct from an absent one.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
	D: Deserializer<'de>,
{
	Value::deserialize(deserializer).map(Some)
}

/// A single call request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	#[serde(default = "default_version")]
	pub jsonrpc: String,
	#[serde(
		default,
		deserialize_with = "deserialize_present",
		skip_serializing_if = "Option::is_none"
	)]
	pub id: Option<Value>,
	#[serde(default)]
	pub method: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<Value>,
}

impl Request {
	pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
		Self {
			jsonrpc: default_version(),
			id: Some(id.into()),
			method: method.into(),
			params,
		}
	}

	/// A request is dispatchable once it names a method.
	pub fn is_valid(&self) -> bool {
		!self.method.is_empty()
	}
}

/// A single call response; exactly one of `result` / `error` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	pub jsonrpc: String,
	#[serde(
		default,
		deserialize_with = "deserialize_present",
		skip_serializing_if = "Option::is_none"
	)]
	pub id: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<RpcError>,
}

impl Response {
	pub fn success(id: Option<Value>, result: Value) -> Self {
		Self {
			jsonrpc: default_version(),
			id,
			result: Some(result),
			error: None,
		}
	}

	pub fn failure(id: Option<Value>, error: RpcError) -> Self {
		Self {
			jsonrpc: default_version(),
			id,
			result: None,
			error: Some(error),
		}
	}

	pub fn from_result(id: Option<Value>, result: Result<Value, RpcError>) -> Self {
		match result {
			Ok(value) => Self::success(id, value),
			Err(err) => Self::failure(id, err),
		}
	}

	pub fn is_error(&self) -> bool {
		self.error.is_some()
	}
}

/// What an inbound HTTP body turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
	Single(Request),
	Batch(Vec<Request>),
}

impl Incoming {
	/// Probe a body: first as one request object with a non-empty method,
	/// then as a batch array. Anything else is an invalid request.
	pub fn parse(body: &[u8]) -> Result<Incoming, RpcError> {
		let value: Value = serde_json::from_slice(body).map_err(RpcError::parse_error)?;

		if value.is_object()
			&& let Ok(request) = serde_json::from_value::<Request>(value.clone())
			&& request.is_valid()
		{
			return Ok(Incoming::Single(request));
		}

		if value.is_array() {
			return serde_json::from_value::<Vec<Request>>(value)
				.map(Incoming::Batch)
				.map_err(|e| RpcError::invalid_request(format!("Invalid batch request: {e}")));
		}

		Err(RpcError::invalid_request("Invalid request"))
	}
}
