// Signature introspection
//
// Handler arity and the error-typed return are enforced by the generic bounds on
// `FunctionRegistry::register`. What remains to check at registration time is the
// structural shape of the input and output types, which is derived from their
// JSON Schema.

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::RegistryError;

/// One field of a structured shape, as seen on the wire.
///
/// Only the wire name is recorded. Descriptors come from the type's JSON Schema,
/// which has no trace of the Rust field name behind a serde rename, and every
/// consumer (validation, error data, clients) speaks wire names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
	/// Wire name of the field (after serde renames).
	pub name: String,
	#[serde(rename = "type")]
	pub type_name: String,
	/// False when the field is `Option<_>` or carries a serde default.
	pub required: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub format: Option<String>,
}

/// Structural descriptor of a handler's input or output type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shape {
	#[serde(rename = "type")]
	pub type_name: String,
	pub fields: Vec<FieldDescriptor>,
	/// Full JSON Schema, for client tooling.
	pub schema: Value,
}

impl Shape {
	pub fn is_object(&self) -> bool {
		schema_type(&self.schema).as_deref() == Some("object")
	}

	pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
		self.fields.iter().find(|f| f.name == name)
	}

	pub fn required_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
		self.fields.iter().filter(|f| f.required)
	}
}

/// Describe a type from its JSON Schema.
pub fn describe<T: JsonSchema>() -> Result<Shape, String> {
	let schema = schemars::schema_for!(T);
	let schema = serde_json::to_value(&schema).map_err(|e| format!("schema generation failed: {e}"))?;

	let type_name = schema
		.get("title")
		.and_then(Value::as_str)
		.map(str::to_string)
		.or_else(|| schema_type(&schema))
		.unwrap_or_else(|| "any".to_string());

	let required: Vec<&str> = schema
		.get("required")
		.and_then(Value::as_array)
		.map(|r| r.iter().filter_map(Value::as_str).collect())
		.unwrap_or_default();

	let fields = schema
		.get("properties")
		.and_then(Value::as_object)
		.map(|props| {
			props
				.iter()
				.map(|(name, prop)| FieldDescriptor {
					name: name.clone(),
					type_name: property_type(prop),
					required: required.contains(&name.as_str()),
					format: prop.get("format").and_then(Value::as_str).map(str::to_string),
				})
				.collect()
		})
		.unwrap_or_default();

	Ok(Shape {
		type_name,
		fields,
		schema,
	})
}

/// Describe a handler's input type; it must be a structured (object) type.
pub fn describe_input<T: JsonSchema>(function: &str) -> Result<Shape, RegistryError> {
	let shape = describe::<T>().map_err(|reason| RegistryError::invalid_signature(function, reason))?;
	if !shape.is_object() {
		return Err(RegistryError::invalid_signature(
			function,
			format!(
				"input parameter must be a structured type, got '{}'",
				schema_type(&shape.schema).unwrap_or_else(|| "any".to_string())
			),
		));
	}
	Ok(shape)
}

/// Describe a handler's output type. Any serializable type is accepted.
pub fn describe_output<T: JsonSchema>(function: &str) -> Result<Shape, RegistryError> {
	describe::<T>().map_err(|reason| RegistryError::invalid_signature(function, reason))
}

/// The primary (non-null) `type` of a schema, if declared.
pub(crate) fn schema_type(schema: &Value) -> Option<String> {
	match schema.get("type")? {
		Value::String(s) => Some(s.clone()),
		Value::Array(types) => types
			.iter()
			.filter_map(Value::as_str)
			.find(|t| *t != "null")
			.map(str::to_string),
		_ => None,
	}
}

fn ref_name(schema: &Map<String, Value>) -> Option<String> {
	schema
		.get("$ref")
		.and_then(Value::as_str)
		.and_then(|r| r.rsplit('/').next())
		.map(str::to_string)
}

pub(crate) fn property_type(prop: &Value) -> String {
	let Some(obj) = prop.as_object() else {
		return "any".to_string();
	};
	if let Some(name) = ref_name(obj) {
		return name;
	}
	if let Some(t) = schema_type(prop) {
		if t == "array"
			&& let Some(items) = obj.get("items")
		{
			return format!("array<{}>", property_type(items));
		}
		return t;
	}
	// Option<Struct> is rendered as anyOf [ref, null]
	for key in ["anyOf", "oneOf"] {
		if let Some(variants) = obj.get(key).and_then(Value::as_array) {
			let non_null: Vec<String> = variants
				.iter()
				.filter(|v| v.get("type").and_then(Value::as_str) != Some("null"))
				.map(property_type)
				.collect();
			if non_null.len() == 1 {
				return non_null[0].clone();
			}
		}
	}
	"any".to_string()
}
