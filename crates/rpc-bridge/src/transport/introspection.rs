// Introspection endpoints: JSON descriptors and generated TypeScript.
// Not authenticated here; gate them in the embedding application if needed.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use http::header;
use serde_json::{Value, json};

use crate::bridge::Bridge;
use crate::typegen;

pub(super) async fn functions(State(bridge): State<Bridge>) -> Json<Value> {
	Json(json!({ "functions": bridge.functions() }))
}

pub(super) async fn typescript(State(bridge): State<Bridge>) -> impl IntoResponse {
	(
		[(header::CONTENT_TYPE, "application/typescript; charset=utf-8")],
		typegen::typescript(&bridge.functions()),
	)
}
