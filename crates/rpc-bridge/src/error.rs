// Bridge error types
//
// Two layers of errors live here:
// - RegistryError: failures of the registration API, returned to the embedding application
// - RpcError: the structured, numeric-coded error that crosses every transport boundary

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};
use thiserror::Error;

/// JSON-RPC error codes, standard and bridge-private.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
	ParseError,
	InvalidRequest,
	MethodNotFound,
	InvalidParams,
	Internal,
	Unauthorized,
	RateLimited,
	Timeout,
	BadRequest,
	Forbidden,
	/// Any code outside the known set, kept verbatim when decoding responses.
	Other(i32),
}

impl ErrorCode {
	pub const fn code(self) -> i32 {
		match self {
			ErrorCode::ParseError => -32700,
			ErrorCode::InvalidRequest => -32600,
			ErrorCode::MethodNotFound => -32601,
			ErrorCode::InvalidParams => -32602,
			ErrorCode::Internal => -32603,
			ErrorCode::Unauthorized => -32001,
			ErrorCode::RateLimited => -32002,
			ErrorCode::Timeout => -32003,
			ErrorCode::BadRequest => -32004,
			ErrorCode::Forbidden => -32005,
			ErrorCode::Other(c) => c,
		}
	}

	pub const fn from_code(code: i32) -> Self {
		match code {
			-32700 => ErrorCode::ParseError,
			-32600 => ErrorCode::InvalidRequest,
			-32601 => ErrorCode::MethodNotFound,
			-32602 => ErrorCode::InvalidParams,
			-32603 => ErrorCode::Internal,
			-32001 => ErrorCode::Unauthorized,
			-32002 => ErrorCode::RateLimited,
			-32003 => ErrorCode::Timeout,
			-32004 => ErrorCode::BadRequest,
			-32005 => ErrorCode::Forbidden,
			other => ErrorCode::Other(other),
		}
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.code())
	}
}

impl Serialize for ErrorCode {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_i32(self.code())
	}
}

impl<'de> Deserialize<'de> for ErrorCode {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		i32::deserialize(deserializer).map(ErrorCode::from_code)
	}
}

/// Structured error carried in the `error` member of a response.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message} ({code})")]
pub struct RpcError {
	pub code: ErrorCode,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl RpcError {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			data: None,
		}
	}

	pub fn with_data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}

	pub fn parse_error(detail: impl fmt::Display) -> Self {
		Self::new(ErrorCode::ParseError, "Parse error").with_data(json!(detail.to_string()))
	}

	pub fn invalid_request(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::InvalidRequest, message)
	}

	pub fn method_not_found(method: &str) -> Self {
		Self::new(ErrorCode::MethodNotFound, format!("Method not found: {method}"))
	}

	pub fn invalid_params(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::InvalidParams, message)
	}

	/// A required or validated field failed; `data` names the wire field.
	pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
		Self::new(ErrorCode::InvalidParams, message).with_data(json!({ "field": field }))
	}

	pub fn internal(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::Internal, message)
	}

	pub fn unauthorized() -> Self {
		Self::new(ErrorCode::Unauthorized, "Unauthorized")
	}

	pub fn forbidden() -> Self {
		Self::new(ErrorCode::Forbidden, "Forbidden: insufficient permissions")
	}

	pub fn rate_limited() -> Self {
		Self::new(ErrorCode::RateLimited, "Rate limit exceeded")
	}

	pub fn timeout(after_ms: u128) -> Self {
		Self::new(ErrorCode::Timeout, format!("Request timeout after {after_ms}ms"))
	}

	pub fn bad_request(message: impl Into<String>) -> Self {
		Self::new(ErrorCode::BadRequest, message)
	}

	/// Convert a handler failure into a wire error.
	///
	/// An `RpcError` raised by the handler is passed through unchanged; any other
	/// error becomes `Internal` with its display chain as the message.
	pub fn from_handler(err: anyhow::Error) -> Self {
		match err.downcast::<RpcError>() {
			Ok(rpc) => rpc,
			Err(other) => Self::internal(format!("{other:#}")),
		}
	}
}

/// Errors returned by the registration API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
	#[error("function '{0}' is already registered")]
	DuplicateName(String),

	#[error("function '{0}' not found")]
	NotFound(String),

	#[error("function name must not be empty")]
	InvalidName,

	#[error("invalid signature for '{name}': {reason}")]
	InvalidSignature { name: String, reason: String },
}

impl RegistryError {
	pub fn invalid_signature(name: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::InvalidSignature {
			name: name.into(),
			reason: reason.into(),
		}
	}
}

impl From<RegistryError> for RpcError {
	fn from(err: RegistryError) -> Self {
		match err {
			RegistryError::NotFound(name) => RpcError::method_not_found(&name),
			other => RpcError::internal(other.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_codes_serialize_as_integers() {
		let err = RpcError::timeout(50);
		let value = serde_json::to_value(&err).unwrap();
		assert_eq!(value["code"], -32003);
		assert!(value.get("data").is_none());

		let back: RpcError = serde_json::from_value(value).unwrap();
		assert_eq!(back.code, ErrorCode::Timeout);
	}

	#[test]
	fn test_unknown_code_is_preserved() {
		let err: RpcError = serde_json::from_value(json!({"code": -31000, "message": "custom"})).unwrap();
		assert_eq!(err.code, ErrorCode::Other(-31000));
		assert_eq!(err.code.code(), -31000);
	}

	#[test]
	fn test_handler_rpc_error_passes_through() {
		let original = RpcError::forbidden().with_data(json!({"why": "nope"}));
		let converted = RpcError::from_handler(anyhow::Error::new(original.clone()));
		assert_eq!(converted, original);
	}

	#[test]
	fn test_handler_other_error_is_internal() {
		let converted = RpcError::from_handler(anyhow::anyhow!("disk on fire"));
		assert_eq!(converted.code, ErrorCode::Internal);
		assert_eq!(converted.message, "disk on fire");
	}

	#[test]
	fn test_registry_not_found_maps_to_method_not_found() {
		let rpc: RpcError = RegistryError::NotFound("missing".into()).into();
		assert_eq!(rpc.code, ErrorCode::MethodNotFound);
	}
}
