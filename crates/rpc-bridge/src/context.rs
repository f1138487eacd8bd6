// Request-scoped call context and caller authentication

use std::collections::HashSet;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ConnectInfo;
use http::request::Parts;
use http::{Extensions, HeaderMap};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Header names read by [`HeaderAuthenticator`].
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
	pub id: String,
	pub name: Option<String>,
	pub roles: HashSet<String>,
}

impl User {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: None,
			roles: HashSet::new(),
		}
	}

	pub fn with_roles<I, S>(mut self, roles: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.roles.extend(roles.into_iter().map(Into::into));
		self
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	/// True when the user holds at least one of `roles`.
	pub fn has_any_role<'a>(&self, roles: impl IntoIterator<Item = &'a String>) -> bool {
		roles.into_iter().any(|r| self.roles.contains(r))
	}
}

/// Which front end a call arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
	Http,
	WebSocket,
	Sse,
	Direct,
}

/// Request-scoped data handed to every handler as its first argument.
#[derive(Debug, Clone)]
pub struct CallContext {
	pub request_id: Uuid,
	pub transport: Transport,
	pub user: Option<User>,
	pub client_addr: Option<String>,
	pub headers: HeaderMap,
	pub extensions: Extensions,
	cancel: CancellationToken,
}

impl Default for CallContext {
	fn default() -> Self {
		Self::new(Transport::Direct)
	}
}

impl CallContext {
	pub fn new(transport: Transport) -> Self {
		Self {
			request_id: Uuid::new_v4(),
			transport,
			user: None,
			client_addr: None,
			headers: HeaderMap::new(),
			extensions: Extensions::new(),
			cancel: CancellationToken::new(),
		}
	}

	/// Build a context from the parts of an inbound HTTP request (also used for
	/// the upgrade request of a WebSocket and for SSE).
	pub fn from_parts(transport: Transport, parts: &Parts) -> Self {
		let client_addr = parts
			.extensions
			.get::<ConnectInfo<SocketAddr>>()
			.map(|ConnectInfo(addr)| addr.ip().to_string());
		Self {
			client_addr,
			headers: parts.headers.clone(),
			extensions: parts.extensions.clone(),
			..Self::new(transport)
		}
	}

	pub fn with_user(mut self, user: User) -> Self {
		self.user = Some(user);
		self
	}

	pub fn with_client_addr(mut self, addr: impl Into<String>) -> Self {
		self.client_addr = Some(addr.into());
		self
	}

	/// Identity used for rate limiting: the user when authenticated, else the client address.
	pub fn rate_limit_key(&self) -> String {
		match (&self.user, &self.client_addr) {
			(Some(user), _) => format!("user:{}", user.id),
			(None, Some(addr)) => format!("ip:{addr}"),
			(None, None) => "ip:unknown".to_string(),
		}
	}

	/// Cancelled when the call's deadline expires. Handlers may watch it to stop early.
	pub fn cancellation(&self) -> &CancellationToken {
		&self.cancel
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// A copy of this context for one call, with its own request id and cancellation token.
	pub(crate) fn for_call(&self) -> Self {
		Self {
			request_id: Uuid::new_v4(),
			cancel: CancellationToken::new(),
			..self.clone()
		}
	}
}

/// Resolves the caller of an inbound request.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
	async fn authenticate(&self, parts: &Parts) -> Option<User>;
}

#[async_trait::async_trait]
impl<F, Fut> Authenticator for F
where
	F: Fn(Parts) -> Fut + Send + Sync,
	Fut: Future<Output = Option<User>> + Send,
{
	async fn authenticate(&self, parts: &Parts) -> Option<User> {
		(self)(parts.clone()).await
	}
}

pub type AuthenticatorRef = Arc<dyn Authenticator>;

/// Trusts `X-User-Id` / `X-User-Roles` headers set by an upstream auth proxy.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderAuthenticator;

#[async_trait::async_trait]
impl Authenticator for HeaderAuthenticator {
	async fn authenticate(&self, parts: &Parts) -> Option<User> {
		let id = parts
			.headers
			.get(USER_ID_HEADER)
			.and_then(|v| v.to_str().ok())
			.map(str::trim)
			.filter(|s| !s.is_empty())?;

		let roles = parts
			.headers
			.get(USER_ROLES_HEADER)
			.and_then(|v| v.to_str().ok())
			.map(|s| {
				s.split(',')
					.map(str::trim)
					.filter(|r| !r.is_empty())
					.map(str::to_string)
					.collect::<Vec<_>>()
			})
			.unwrap_or_default();

		Some(User::new(id).with_roles(roles))
	}
}
