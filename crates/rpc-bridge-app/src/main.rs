// Standalone bridge server with a couple of demo functions.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rpc_bridge::{Bridge, BridgeConfig, CallContext, FunctionOptions, HeaderAuthenticator, HookKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Serve registered functions over JSON-RPC (HTTP, WebSocket, SSE)
#[derive(Parser, Debug)]
#[command(name = "rpc-bridge")]
#[command(version, about, long_about = None)]
struct Args {
	/// YAML or JSON config file; defaults apply without one
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Address to listen on
	#[arg(short, long, default_value = "127.0.0.1:8080")]
	bind: SocketAddr,

	/// Emit logs as JSON lines
	#[arg(long)]
	log_json: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EchoInput {
	name: String,
}

#[derive(Debug, Serialize, JsonSchema)]
struct EchoOutput {
	message: String,
}

async fn echo(_ctx: CallContext, input: EchoInput) -> anyhow::Result<EchoOutput> {
	Ok(EchoOutput {
		message: format!("Hello, {}", input.name),
	})
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WhoAmIInput {}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct WhoAmIOutput {
	user_id: String,
	roles: Vec<String>,
}

async fn whoami(ctx: CallContext, _: WhoAmIInput) -> anyhow::Result<WhoAmIOutput> {
	let user = ctx.user.context("no user attached")?;
	let mut roles: Vec<String> = user.roles.into_iter().collect();
	roles.sort();
	Ok(WhoAmIOutput {
		user_id: user.id,
		roles,
	})
}

fn init_tracing(json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let layer = if json {
		fmt::layer().json().boxed()
	} else {
		fmt::layer().boxed()
	};
	tracing_subscriber::registry().with(layer.with_filter(filter)).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	init_tracing(args.log_json);

	let config = match &args.config {
		Some(path) => BridgeConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
		None => BridgeConfig::default(),
	};

	let bridge = Bridge::new(config).with_authenticator(HeaderAuthenticator);
	bridge.register(
		"echo",
		echo,
		FunctionOptions::new().description("Greets the given name"),
	)?;
	bridge.register(
		"whoami",
		whoami,
		FunctionOptions::new()
			.description("Reports the authenticated caller")
			.require_auth()
			.rate_limit(60),
	)?;
	bridge.hooks().register(HookKind::OnError, |event| {
		info!(function = %event.function, code = ?event.error.as_ref().map(|e| e.code), "call failed");
	});

	let _background = bridge.start_background_tasks();
	let app = bridge.router();

	let listener = tokio::net::TcpListener::bind(args.bind)
		.await
		.with_context(|| format!("binding {}", args.bind))?;
	info!(
		target: "rpc_bridge",
		addr = %args.bind,
		path = %bridge.config().path,
		functions = bridge.registry().len(),
		"bridge listening"
	);
	axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
	Ok(())
}
