//! Session authenticator implementation
//!
//! Handles the Service Layer login and caches the resulting session.

use crate::config::TapConfig;
use crate::error::{Error, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Cookie name Service Layer expects the session id in
pub const SESSION_COOKIE: &str = "B1SESSION";

/// Login path relative to the base URL
const LOGIN_PATH: &str = "Login";

/// Logout path relative to the base URL
const LOGOUT_PATH: &str = "Logout";

/// Login request body
#[derive(Clone, Serialize)]
pub struct Credentials {
    /// Company database
    #[serde(rename = "CompanyDB")]
    pub company_db: String,
    /// Service Layer user
    #[serde(rename = "UserName")]
    pub username: String,
    /// Password
    #[serde(rename = "Password")]
    pub password: String,
}

impl Credentials {
    /// Build credentials from the run configuration
    pub fn from_config(config: &TapConfig) -> Self {
        Self {
            company_db: config.dbname.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("company_db", &self.company_db)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// An established Service Layer session.
///
/// The id may be absent: some deployments track the session through cookies
/// set by a proxy in front of Service Layer, and requests proceed without one.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    id: Option<String>,
    /// Idle timeout reported by the server, in minutes
    pub timeout_minutes: Option<u64>,
}

impl Session {
    /// Create a session from an id
    pub fn new(id: Option<String>) -> Self {
        Self {
            id,
            timeout_minutes: None,
        }
    }

    /// The raw session id
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Value for the `Cookie` header, if there is a session id
    pub fn cookie_header(&self) -> Option<String> {
        self.id
            .as_deref()
            .map(|id| format!("{SESSION_COOKIE}={id}"))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id.as_ref().map(|_| "***"))
            .field("timeout_minutes", &self.timeout_minutes)
            .finish()
    }
}

/// Obtains and caches the Service Layer session for one run
pub struct SessionAuthenticator {
    /// Base URL of the Service Layer
    base_url: String,
    /// Login credentials
    credentials: Credentials,
    /// Cached session
    session: Arc<RwLock<Option<Session>>>,
    /// HTTP client for login requests
    http_client: Client,
}

impl SessionAuthenticator {
    /// Create an authenticator with its own HTTP client
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self::with_client(base_url, credentials, Client::new())
    }

    /// Create an authenticator sharing an existing HTTP client
    pub fn with_client(
        base_url: impl Into<String>,
        credentials: Credentials,
        http_client: Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
            session: Arc::new(RwLock::new(None)),
            http_client,
        }
    }

    /// Get the session, logging in on first use
    pub async fn acquire(&self) -> Result<Session> {
        {
            let cached = self.session.read().await;
            if let Some(session) = cached.as_ref() {
                return Ok(session.clone());
            }
        }

        let mut cached = self.session.write().await;

        // Another caller may have logged in while we waited for the lock
        if let Some(session) = cached.as_ref() {
            return Ok(session.clone());
        }

        let session = self.login().await?;
        *cached = Some(session.clone());
        Ok(session)
    }

    /// Perform the login request
    async fn login(&self) -> Result<Session> {
        let url = join_url(&self.base_url, LOGIN_PATH);
        let response = self
            .http_client
            .post(&url)
            .json(&self.credentials)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        info!(
            "Made login request. Response={} {}",
            status.as_u16(),
            redact_session(&body)
        );

        if !status.is_success() {
            return Err(Error::auth(format!(
                "Login request failed with status {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) => {
                warn!("Login response is not JSON ({e}); continuing without a session id");
                Value::Null
            }
        };

        let id = parsed
            .get("SessionId")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);
        if id.is_none() {
            debug!("Login response carried no SessionId");
        }

        Ok(Session {
            id,
            timeout_minutes: parsed.get("SessionTimeout").and_then(Value::as_u64),
        })
    }

    /// End the session on the server, if one was established.
    ///
    /// Failures are logged and ignored: the session expires on its own.
    pub async fn logout(&self) {
        let session = self.session.write().await.take();
        let Some(cookie) = session.and_then(|s| s.cookie_header()) else {
            return;
        };

        let url = join_url(&self.base_url, LOGOUT_PATH);
        match self
            .http_client
            .post(&url)
            .header(reqwest::header::COOKIE, cookie)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => debug!("Logged out"),
            Ok(response) => warn!("Logout returned HTTP {}", response.status().as_u16()),
            Err(e) => warn!("Logout failed: {e}"),
        }
    }

    /// Drop the cached session so the next `acquire` logs in again
    pub async fn clear_cache(&self) {
        let mut cached = self.session.write().await;
        *cached = None;
    }

    /// Check whether a session has been established
    pub async fn has_session(&self) -> bool {
        self.session.read().await.is_some()
    }
}

impl std::fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Mask the `SessionId` of a login response body for logging.
///
/// Bodies that are not JSON objects are returned unchanged.
pub fn redact_session(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(mut map)) => {
            if map.contains_key("SessionId") {
                map.insert("SessionId".to_string(), Value::String("***".to_string()));
            }
            Value::Object(map).to_string()
        }
        _ => body.to_string(),
    }
}
