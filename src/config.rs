//! Configuration types for factsheet-loader

use crate::error::{Error, Result};
use crate::types::PageSize;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Host connection configuration
///
/// Used by [`HttpExecutor`](crate::executor::HttpExecutor). Authentication is the
/// host's concern; the token is only forwarded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostConfig {
    /// GraphQL endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token sent as `Authorization` header (None = no header)
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Per-request timeout in whole seconds (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Send a `{ __typename }` probe during the init handshake (default: true)
    #[serde(default = "default_true")]
    pub probe_on_init: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            bearer_token: None,
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            probe_on_init: true,
        }
    }
}

/// Pagination and telemetry configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Initial page size (default: 100, `null` = unbounded)
    #[serde(default)]
    pub page_size: PageSize,

    /// Interval between throughput events while a run is active (default: 1000 ms)
    #[serde(default = "default_tick_interval", with = "millis_serde")]
    pub tick_interval: Duration,

    /// Drop items whose `id` was already accepted in the current run (default: false)
    ///
    /// The endpoint is expected to never repeat a node across pages. Enable this
    /// when that guarantee is in doubt.
    #[serde(default)]
    pub dedup_by_id: bool,

    /// Extra node fields to request next to `id` (e.g. `["name", "type"]`)
    #[serde(default)]
    pub node_fields: Vec<String>,

    /// Capacity of the event broadcast channel (default: 256)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            tick_interval: default_tick_interval(),
            dedup_by_id: false,
            node_fields: Vec::new(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Main configuration for FactSheetLoader
///
/// - [`host`](HostConfig): endpoint, token, timeouts
/// - [`loader`](LoaderConfig): page size, ticker interval, dedup, extra fields
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Host connection settings
    #[serde(default)]
    pub host: HostConfig,

    /// Pagination settings
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl Config {
    /// Parse a configuration from JSON, filling in defaults and validating
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let endpoint = url::Url::parse(&self.host.endpoint).map_err(|e| {
            Error::config(
                "host.endpoint",
                format!("invalid endpoint URL '{}': {}", self.host.endpoint, e),
            )
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::config(
                "host.endpoint",
                format!("unsupported scheme '{}'", endpoint.scheme()),
            ));
        }

        if self.host.request_timeout.is_zero() {
            return Err(Error::config("host.request_timeout", "must be non-zero"));
        }
        // Serialized in whole seconds
        if self.host.request_timeout.subsec_nanos() != 0 {
            return Err(Error::config(
                "host.request_timeout",
                format!(
                    "must be a whole number of seconds, got {:?}",
                    self.host.request_timeout
                ),
            ));
        }
        if self.loader.tick_interval.is_zero() {
            return Err(Error::config("loader.tick_interval", "must be non-zero"));
        }
        if self.loader.event_buffer == 0 {
            return Err(Error::config("loader.event_buffer", "must be non-zero"));
        }

        if let Some(field) = self
            .loader
            .node_fields
            .iter()
            .find(|field| !is_graphql_name(field))
        {
            return Err(Error::config(
                "loader.node_fields",
                format!("'{}' is not a valid GraphQL field name", field),
            ));
        }

        Ok(())
    }
}

/// `/[_A-Za-z][_0-9A-Za-z]*/`
fn is_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn default_endpoint() -> String {
    "http://localhost:8080/graphql".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("factsheet-loader/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_event_buffer() -> usize {
    256
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
