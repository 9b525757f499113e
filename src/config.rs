//! Run configuration
//!
//! The tap is configured by a single JSON document. Credentials and the
//! Service Layer location are global; query-backed streams read their
//! parameters from the `queries` map keyed by stream name.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default Service Layer base URL
pub const DEFAULT_API_URL: &str = "https://localhost:50000/b1s/v1";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete tap configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Service Layer base URL (e.g. `https://host:50000/b1s/v1`)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Service Layer user
    #[serde(default)]
    pub username: String,

    /// Service Layer password
    #[serde(default)]
    pub password: String,

    /// Company database identifier
    #[serde(default)]
    pub dbname: String,

    /// Global lower bound for incremental streams without a bookmark
    #[serde(default)]
    pub start_date: Option<String>,

    /// Custom user agent
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Verify the server TLS certificate
    #[serde(default = "default_true")]
    pub verify_ssl: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Transport retries for throttled or failed requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Page size requested through `Prefer: odata.maxpagesize`
    #[serde(default)]
    pub page_size: Option<u32>,

    /// Optional client-side request rate cap
    #[serde(default)]
    pub requests_per_second: Option<u32>,

    /// Options for query-backed streams, keyed by stream name
    #[serde(default)]
    pub queries: HashMap<String, QueryStreamOptions>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

impl TapConfig {
    /// Parse a config from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    /// Check required fields and the base URL
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("username", &self.username),
            ("password", &self.password),
            ("dbname", &self.dbname),
        ] {
            if value.trim().is_empty() {
                return Err(Error::missing_field(field));
            }
        }

        url::Url::parse(&self.api_url)
            .map_err(|e| Error::invalid_value("api_url", e.to_string()))?;

        if let Some(start) = &self.start_date {
            if crate::types::parse_date(start).is_none() {
                return Err(Error::invalid_value(
                    "start_date",
                    format!("'{start}' is not an ISO-8601 date"),
                ));
            }
        }

        Ok(())
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Options for a query-backed stream
    pub fn query_options(&self, stream: &str) -> Option<&QueryStreamOptions> {
        self.queries.get(stream)
    }

    /// Non-secret values exposed to path templates as `config.*`
    pub fn template_values(&self) -> Value {
        serde_json::json!({
            "api_url": self.api_url,
            "dbname": self.dbname,
            "start_date": self.start_date,
        })
    }
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            username: String::new(),
            password: String::new(),
            dbname: String::new(),
            start_date: None,
            user_agent: None,
            verify_ssl: true,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            page_size: None,
            requests_per_second: None,
            queries: HashMap::new(),
        }
    }
}

impl fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapConfig")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("dbname", &self.dbname)
            .field("start_date", &self.start_date)
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("page_size", &self.page_size)
            .field("queries", &self.queries)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Query Stream Options
// ============================================================================

/// Raw parameters of a query-backed stream.
///
/// Values are kept as written in the config and validated when the stream
/// resolves its request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryStreamOptions {
    /// Item group code (integer, given as a string or a number)
    #[serde(default, deserialize_with = "string_or_number")]
    pub group_code: Option<String>,

    /// Start of the document date window
    #[serde(default)]
    pub start_date: Option<String>,

    /// End of the document date window
    #[serde(default)]
    pub end_date: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}
