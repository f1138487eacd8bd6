// Introspection and TypeScript endpoints

use http::StatusCode;
use rpc_bridge::BridgeConfig;
use serde_json::{Value, json};

use crate::common::{bridge, bridge_with, get};

#[tokio::test]
async fn test_lists_functions_sorted() -> anyhow::Result<()> {
	let router = bridge().router();
	let (status, _, body) = get(&router, "/rpc/functions").await;
	assert_eq!(status, StatusCode::OK);

	let body: Value = serde_json::from_slice(&body)?;
	let functions = body["functions"].as_array().unwrap();
	let names: Vec<&str> = functions.iter().map(|f| f["name"].as_str().unwrap()).collect();
	assert_eq!(names, vec!["add", "admin_echo", "echo", "limited", "signup", "slow"]);

	let echo = &functions[2];
	assert_eq!(echo["description"], "Greets the given name");
	assert_eq!(echo["requireAuth"], false);
	assert_eq!(echo["input"]["type"], "EchoInput");
	assert_eq!(
		echo["input"]["fields"],
		json!([{"name": "name", "type": "string", "required": true}])
	);
	assert_eq!(echo["output"]["fields"][0]["name"], "message");

	let admin = &functions[1];
	assert_eq!(admin["requireAuth"], true);
	assert_eq!(admin["roles"], json!(["admin"]));

	assert_eq!(functions[3]["rateLimitPerMinute"], 2);
	assert_eq!(functions[5]["timeoutMs"], 50);
	Ok(())
}

#[tokio::test]
async fn test_typescript_stubs() {
	let router = bridge().router();
	let (status, headers, body) = get(&router, "/rpc/functions.ts").await;
	assert_eq!(status, StatusCode::OK);
	assert!(
		headers
			.get(http::header::CONTENT_TYPE)
			.unwrap()
			.to_str()
			.unwrap()
			.starts_with("application/typescript")
	);
	let ts = String::from_utf8(body.to_vec()).unwrap();
	assert!(ts.contains("export interface EchoInput {"));
	assert!(ts.contains("\"echo\": { params: EchoInput; result: EchoOutput };"));
}

#[tokio::test]
async fn test_introspection_can_be_disabled() {
	let router = bridge_with(BridgeConfig {
		introspection_path: None,
		..BridgeConfig::default()
	})
	.router();
	let (status, _, _) = get(&router, "/rpc/functions").await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}
