// Parameter codec
//
// Turns the untyped `params` member of a request into a handler's typed input:
// - absent / null params decode as an empty object
// - required fields must be present and non-zero
// - declared field validators run after the required pass

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::error::RpcError;
use crate::registry::RegisteredFunction;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("email pattern compiles")
});

/// Extra per-field validation declared at registration.
#[derive(Clone)]
pub enum FieldRule {
	Email,
	MinLength(usize),
	MaxLength(usize),
	Pattern(Regex),
}

impl FieldRule {
	pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
		Regex::new(pattern).map(FieldRule::Pattern)
	}

	pub fn name(&self) -> &'static str {
		match self {
			FieldRule::Email => "email",
			FieldRule::MinLength(_) => "minLength",
			FieldRule::MaxLength(_) => "maxLength",
			FieldRule::Pattern(_) => "pattern",
		}
	}

	fn check(&self, field: &str, value: &Value) -> Result<(), RpcError> {
		let ok = match self {
			FieldRule::Email => value.as_str().is_some_and(|s| EMAIL.is_match(s)),
			FieldRule::MinLength(min) => length(value).is_some_and(|len| len >= *min),
			FieldRule::MaxLength(max) => length(value).is_some_and(|len| len <= *max),
			FieldRule::Pattern(re) => value.as_str().is_some_and(|s| re.is_match(s)),
		};
		if ok {
			return Ok(());
		}
		let message = match self {
			FieldRule::Email => format!("Field '{field}' must be a valid email address"),
			FieldRule::MinLength(min) => format!("Field '{field}' must have length of at least {min}"),
			FieldRule::MaxLength(max) => format!("Field '{field}' must have length of at most {max}"),
			FieldRule::Pattern(re) => format!("Field '{field}' must match pattern {}", re.as_str()),
		};
		Err(RpcError::invalid_params(message).with_data(json!({ "field": field, "rule": self.name() })))
	}
}

impl fmt::Debug for FieldRule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FieldRule::Email => write!(f, "Email"),
			FieldRule::MinLength(n) => write!(f, "MinLength({n})"),
			FieldRule::MaxLength(n) => write!(f, "MaxLength({n})"),
			FieldRule::Pattern(re) => write!(f, "Pattern({:?})", re.as_str()),
		}
	}
}

fn length(value: &Value) -> Option<usize> {
	match value {
		Value::String(s) => Some(s.chars().count()),
		Value::Array(a) => Some(a.len()),
		_ => None,
	}
}

/// Absent or null params stand for the zero value of the input shape.
pub fn normalize(params: Option<Value>) -> Value {
	match params {
		None | Some(Value::Null) => Value::Object(Map::new()),
		Some(v) => v,
	}
}

/// Decode normalized params into the handler's input type.
pub fn decode<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
	serde_json::from_value(params).map_err(|e| {
		RpcError::invalid_params("Invalid params").with_data(json!({ "error": e.to_string() }))
	})
}

/// Whether a field counts as unset: absent, null, 0, false, or an empty string or collection.
///
/// A field explicitly sent as its zero value is indistinguishable from a missing one.
pub fn is_zero(value: Option<&Value>) -> bool {
	match value {
		None | Some(Value::Null) => true,
		Some(Value::Bool(b)) => !*b,
		Some(Value::Number(n)) => n.as_f64() == Some(0.0),
		Some(Value::String(s)) => s.is_empty(),
		Some(Value::Array(a)) => a.is_empty(),
		Some(Value::Object(o)) => o.is_empty(),
	}
}

/// Check normalized params against a function's input shape.
///
/// Required fields are checked first, in declaration order; the first violation
/// wins. Field validators run next, on present non-null values only.
pub fn validate(params: &Value, function: &RegisteredFunction) -> Result<(), RpcError> {
	let Some(object) = params.as_object() else {
		return Err(RpcError::invalid_params("Invalid params: expected an object"));
	};

	for field in function.input.required_fields() {
		if is_zero(object.get(&field.name)) {
			return Err(RpcError::invalid_field(
				&field.name,
				format!("Field '{}' is required", field.name),
			));
		}
	}

	let format_rules = function
		.input
		.fields
		.iter()
		.filter(|f| f.format.as_deref() == Some("email"))
		.map(|f| (f.name.as_str(), &FieldRule::Email));
	let declared = function.validators.iter().map(|(name, rule)| (name.as_str(), rule));

	for (field, rule) in format_rules.chain(declared) {
		match object.get(field) {
			None | Some(Value::Null) => continue,
			Some(value) => rule.check(field, value)?,
		}
	}
	Ok(())
}
