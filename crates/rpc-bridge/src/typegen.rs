// TypeScript declarations for client stubs
//
// Renders one interface per named object type reachable from the registered
// functions, plus a `BridgeFunctions` map from method name to params/result.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

use serde_json::Value;
use tracing::warn;

use crate::registry::FunctionInfo;
use crate::registry::introspect::{property_type, schema_type};

/// Schema name to the interface name it was emitted under.
type Renames = HashMap<String, String>;

struct Interface {
	schema: Value,
	rendered: String,
}

/// Map a field type as reported by introspection to a TypeScript type.
fn ts_type(type_name: &str, renames: &Renames) -> String {
	if let Some(inner) = type_name.strip_prefix("array<").and_then(|t| t.strip_suffix('>')) {
		return format!("{}[]", ts_type(inner, renames));
	}
	match type_name {
		"string" => "string".to_string(),
		"integer" | "number" => "number".to_string(),
		"boolean" => "boolean".to_string(),
		"null" => "null".to_string(),
		"object" => "Record<string, unknown>".to_string(),
		"any" | "array" => "unknown".to_string(),
		named => renames.get(named).cloned().unwrap_or_else(|| named.to_string()),
	}
}

fn is_object(schema: &Value) -> bool {
	schema_type(schema).as_deref() == Some("object") && schema.get("properties").is_some()
}

/// The structure of a type, without the root-only keys and embedded definitions.
fn comparable(schema: &Value) -> Value {
	let mut schema = schema.clone();
	if let Some(obj) = schema.as_object_mut() {
		for key in ["$defs", "$schema", "title"] {
			obj.remove(key);
		}
	}
	schema
}

fn render_interface(name: &str, schema: &Value, renames: &Renames) -> String {
	let required: Vec<&str> = schema
		.get("required")
		.and_then(Value::as_array)
		.map(|r| r.iter().filter_map(Value::as_str).collect())
		.unwrap_or_default();

	let mut out = format!("export interface {name} {{\n");
	if let Some(props) = schema.get("properties").and_then(Value::as_object) {
		for (field, prop) in props {
			let optional = if required.contains(&field.as_str()) { "" } else { "?" };
			let _ = writeln!(out, "\t{field}{optional}: {};", ts_type(&property_type(prop), renames));
		}
	}
	out.push_str("}\n");
	out
}

/// `name`, or `name2`, `name3`, ... when a different type already took it.
fn unique_name(name: &str, schema: &Value, interfaces: &BTreeMap<String, Interface>) -> String {
	let mut candidate = name.to_string();
	let mut n = 1;
	loop {
		match interfaces.get(&candidate) {
			Some(existing) if existing.schema != *schema => {
				n += 1;
				candidate = format!("{name}{n}");
			},
			_ => return candidate,
		}
	}
}

/// Collect the top-level object type and its `$defs` into `interfaces`.
/// Returns the TypeScript type to reference for this shape.
fn collect(schema: &Value, type_name: &str, interfaces: &mut BTreeMap<String, Interface>) -> String {
	let mut named: Vec<(String, Value)> = Vec::new();
	if let Some(defs) = schema.get("$defs").and_then(Value::as_object) {
		for (name, def) in defs {
			if is_object(def) {
				named.push((name.clone(), comparable(def)));
			}
		}
	}
	let top_level = is_object(schema);
	if top_level {
		named.push((type_name.to_string(), comparable(schema)));
	}

	let mut renames = Renames::new();
	for (name, body) in &named {
		let unique = unique_name(name, body, interfaces);
		if unique != *name {
			warn!(target: "rpc_bridge", interface = %name, renamed = %unique, "distinct types share an interface name");
		}
		renames.insert(name.clone(), unique);
	}
	for (name, body) in named {
		let unique = renames.get(&name).cloned().unwrap_or(name);
		if !interfaces.contains_key(&unique) {
			let rendered = render_interface(&unique, &body, &renames);
			interfaces.insert(unique, Interface { schema: body, rendered });
		}
	}

	if top_level {
		return renames.get(type_name).cloned().unwrap_or_else(|| type_name.to_string());
	}
	ts_type(&property_type(schema), &renames)
}

/// TypeScript declarations for every function in `functions`.
pub fn typescript(functions: &[FunctionInfo]) -> String {
	let mut interfaces = BTreeMap::new();
	let mut methods = Vec::with_capacity(functions.len());
	for f in functions {
		let params = collect(&f.input.schema, &f.input.type_name, &mut interfaces);
		let result = collect(&f.output.schema, &f.output.type_name, &mut interfaces);
		methods.push((f.name.as_str(), params, result));
	}

	let mut out = String::from("// Generated from the bridge's registered functions.\n\n");
	for interface in interfaces.values() {
		out.push_str(&interface.rendered);
		out.push('\n');
	}
	out.push_str("export interface BridgeFunctions {\n");
	for (name, params, result) in methods {
		let _ = writeln!(out, "\t{name:?}: {{ params: {params}; result: {result} }};");
	}
	out.push_str("}\n");
	out
}
