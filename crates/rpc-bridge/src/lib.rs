//! JSON-RPC 2.0 function bridge.
//!
//! Register typed async functions on a [`Bridge`] and expose them over HTTP,
//! WebSocket and SSE, with per-function auth, rate limiting, deadlines, panic
//! isolation, batching and lifecycle hooks.

pub mod bridge;
pub mod cache;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod hooks;
pub mod protocol;
pub mod registry;
pub mod security;
pub mod transport;
pub mod typegen;

pub use bridge::Bridge;
pub use codec::FieldRule;
pub use config::BridgeConfig;
pub use context::{Authenticator, CallContext, HeaderAuthenticator, Transport, User};
pub use error::{ErrorCode, RegistryError, RpcError};
pub use hooks::{HookEvent, HookKind};
pub use protocol::{Request, Response};
pub use registry::{FunctionInfo, FunctionOptions};
