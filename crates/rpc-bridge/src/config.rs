// Bridge configuration
//
// Loaded from YAML or JSON (picked by file extension). Every field has a
// default, so an empty document is a valid configuration. Durations are
// strings such as "500ms", "30s" or "5m".

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised while loading a configuration file.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("invalid YAML config: {0}")]
	Yaml(#[from] serde_yaml::Error),

	#[error("invalid JSON config: {0}")]
	Json(#[from] serde_json::Error),

	#[error("invalid duration {0:?}: {1}")]
	InvalidDuration(String, String),

	#[error("invalid config: {0}")]
	Invalid(String),
}

/// Parse a duration string such as "250ms" or "1h30m".
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
	let nanos = go_parse_duration::parse_duration(s.trim())
		.map_err(|e| ConfigError::InvalidDuration(s.to_string(), format!("{e:?}")))?;
	if nanos < 0 {
		return Err(ConfigError::InvalidDuration(
			s.to_string(),
			"duration must not be negative".to_string(),
		));
	}
	Ok(Duration::from_nanos(nanos as u64))
}

/// Render a duration back into the form accepted by [`parse_duration`].
fn format_duration(d: &Duration) -> String {
	let ms = d.as_millis();
	if ms > 0 && ms.is_multiple_of(60_000) {
		format!("{}m", ms / 60_000)
	} else if ms.is_multiple_of(1000) {
		format!("{}s", ms / 1000)
	} else {
		format!("{ms}ms")
	}
}

mod serde_dur {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&super::format_duration(duration))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		super::parse_duration(&s).map_err(serde::de::Error::custom)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CsrfConfig {
	pub enabled: bool,
	pub header_name: String,
	pub cookie_name: String,
}

impl Default for CsrfConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			header_name: "X-CSRF-Token".to_string(),
			cookie_name: "csrf_token".to_string(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CorsConfig {
	pub enabled: bool,
	/// Origins echoed back on preflight and simple requests. Others get no CORS headers.
	pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct BridgeConfig {
	pub path: String,
	pub ws_path: String,
	pub sse_path: String,
	/// `None` disables the introspection and TypeScript endpoints.
	pub introspection_path: Option<String>,
	#[serde(with = "serde_dur")]
	pub default_timeout: Duration,
	pub max_batch_size: usize,
	pub max_body_bytes: usize,
	#[serde(with = "serde_dur")]
	pub rate_limit_idle_ttl: Duration,
	#[serde(with = "serde_dur")]
	pub rate_limit_sweep_interval: Duration,
	#[serde(with = "serde_dur")]
	pub ws_ping_interval: Duration,
	pub hook_concurrency: usize,
	pub csrf: CsrfConfig,
	pub cors: CorsConfig,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			path: "/rpc".to_string(),
			ws_path: "/rpc/ws".to_string(),
			sse_path: "/rpc/sse".to_string(),
			introspection_path: Some("/rpc/functions".to_string()),
			default_timeout: Duration::from_secs(30),
			max_batch_size: 100,
			max_body_bytes: 1024 * 1024,
			rate_limit_idle_ttl: Duration::from_secs(5 * 60),
			rate_limit_sweep_interval: Duration::from_secs(60),
			ws_ping_interval: Duration::from_secs(30),
			hook_concurrency: 256,
			csrf: CsrfConfig::default(),
			cors: CorsConfig::default(),
		}
	}
}

impl BridgeConfig {
	/// Load and validate a config file. `.json` is parsed as JSON, anything else as YAML.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let contents = fs_err::read_to_string(path)?;
		let is_json = path
			.extension()
			.and_then(|e| e.to_str())
			.is_some_and(|e| e.eq_ignore_ascii_case("json"));
		let config: BridgeConfig = if is_json {
			serde_json::from_str(&contents)?
		} else {
			serde_yaml::from_str(&contents)?
		};
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		let mut seen = HashSet::new();
		for (field, path) in [
			("path", Some(&self.path)),
			("wsPath", Some(&self.ws_path)),
			("ssePath", Some(&self.sse_path)),
			("introspectionPath", self.introspection_path.as_ref()),
		] {
			let Some(path) = path else {
				continue;
			};
			if !path.starts_with('/') {
				return Err(ConfigError::Invalid(format!("{field} must start with '/': {path:?}")));
			}
			if !seen.insert(path) {
				return Err(ConfigError::Invalid(format!("{field} reuses path {path:?}")));
			}
		}
		if self.default_timeout.is_zero() {
			return Err(ConfigError::Invalid("defaultTimeout must be positive".to_string()));
		}
		if self.max_batch_size == 0 {
			return Err(ConfigError::Invalid("maxBatchSize must be at least 1".to_string()));
		}
		if self.hook_concurrency == 0 {
			return Err(ConfigError::Invalid("hookConcurrency must be at least 1".to_string()));
		}
		if self.rate_limit_sweep_interval.is_zero() || self.ws_ping_interval.is_zero() {
			return Err(ConfigError::Invalid(
				"rateLimitSweepInterval and wsPingInterval must be positive".to_string(),
			));
		}
		Ok(())
	}
}
