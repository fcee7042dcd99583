//! MongoDB connection configuration.

use std::time::Duration;

use mongodb::options::ClientOptions;
use serde::{Deserialize, Serialize};

use crate::error::{MongoError, MongoResult};

/// URL scheme used when the URL is assembled from its parts.
pub const SCHEME: &str = "mongodb";

/// Connect deadline applied when the configured timeout is zero.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Name of the blob bucket bound on connect unless configured otherwise.
pub const DEFAULT_BUCKET: &str = "fs";

/// Settings describing how to reach the database.
///
/// The password is never serialized, so a config can be logged or written
/// back out without leaking credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Username, used together with `password`.
    pub username: String,
    /// Password, used together with `username`.
    #[serde(skip_serializing)]
    pub password: String,
    /// Database bound on connect.
    pub database: String,
    /// Explicit connection URL. Overrides host and credentials when non-empty.
    pub url: Option<String>,
    /// Deadline for dial and ping together. Zero means [`DEFAULT_TIMEOUT`].
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// When false, `connect` reports the database as unavailable without dialing.
    pub enabled: bool,
    /// Log the resolved configuration and connection target.
    pub debug_mode: bool,
    /// Serialize concurrent initial connects so only one dial happens.
    pub allow_conn_sync: bool,
    /// Application name (shown in server logs).
    pub app_name: Option<String>,
    /// Name of the blob bucket bound on connect.
    pub bucket_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 27017,
            username: String::new(),
            password: String::new(),
            database: String::new(),
            url: None,
            timeout: DEFAULT_TIMEOUT,
            enabled: true,
            debug_mode: false,
            allow_conn_sync: false,
            app_name: None,
            bucket_name: DEFAULT_BUCKET.to_string(),
        }
    }
}

impl ConnectionConfig {
    /// Create a configuration that connects through an explicit URL.
    pub fn from_url(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new()
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> MongoResult<Self> {
        toml::from_str(content).map_err(|e| MongoError::config(format!("invalid config: {}", e)))
    }

    /// Resolve the connection URL.
    ///
    /// An explicit URL wins. Otherwise the URL is assembled from host, port and
    /// database, with credentials only when both username and password are set.
    pub fn resolve_url(&self) -> String {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }

        if !self.username.is_empty() && !self.password.is_empty() {
            return format!(
                "{}://{}:{}@{}:{}/{}",
                SCHEME, self.username, self.password, self.host, self.port, self.database
            );
        }

        format!("{}://{}:{}/{}", SCHEME, self.host, self.port, self.database)
    }

    /// The timeout to use, substituting [`DEFAULT_TIMEOUT`] for zero.
    pub fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }

    /// A copy of this configuration with the default timeout applied.
    pub fn with_default_timeout(mut self) -> Self {
        self.timeout = self.effective_timeout();
        self
    }

    /// JSON rendering for logs, with the URL password masked.
    pub fn describe(&self) -> String {
        let mut shown = self.clone();
        shown.url = shown.url.as_deref().map(redact_url);
        serde_json::to_string(&shown).unwrap_or_default()
    }

    /// Convert to MongoDB ClientOptions for the given URL.
    pub async fn to_client_options(&self, url: &str) -> MongoResult<ClientOptions> {
        let mut options = ClientOptions::parse(url)
            .await
            .map_err(|e| MongoError::config(format!("failed to parse URI: {}", e)))?;

        if let Some(ref app_name) = self.app_name {
            options.app_name = Some(app_name.clone());
        }

        let timeout = self.effective_timeout();
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        Ok(options)
    }
}

/// Mask the password component of a connection URL.
///
/// Multi-host seed lists (`mongodb://u:p@h1:27017,h2:27017/db`) are not
/// valid URLs to the `url` parser, so their userinfo is masked by hand.
pub fn redact_url(raw: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(raw) else {
        return mask_userinfo(raw);
    };
    if parsed.password().is_none() {
        return raw.to_string();
    }
    match parsed.set_password(Some("****")) {
        Ok(()) => parsed.to_string(),
        Err(()) => mask_userinfo(raw),
    }
}

/// Replace everything after the first `:` of the userinfo with `****`.
fn mask_userinfo(raw: &str) -> String {
    let Some(scheme_end) = raw.find("://") else {
        return raw.to_string();
    };
    let authority_start = scheme_end + 3;
    let rest = &raw[authority_start..];
    let authority = &rest[..rest.find(['/', '?']).unwrap_or(rest.len())];

    let Some(at) = authority.rfind('@') else {
        return raw.to_string();
    };
    let Some(colon) = authority[..at].find(':') else {
        return raw.to_string();
    };

    format!(
        "{}{}:****{}",
        &raw[..authority_start],
        &authority[..colon],
        &rest[at..]
    )
}

/// Builder for connection configuration.
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    database: Option<String>,
    url: Option<String>,
    timeout: Option<Duration>,
    enabled: Option<bool>,
    debug_mode: Option<bool>,
    allow_conn_sync: Option<bool>,
    app_name: Option<String>,
    bucket_name: Option<String>,
}

impl ConnectionConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set username and password.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set an explicit connection URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the connect timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Enable or disable the connection.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Enable or disable debug logging of the connection target.
    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = Some(enabled);
        self
    }

    /// Serialize concurrent initial connects.
    pub fn allow_conn_sync(mut self, enabled: bool) -> Self {
        self.allow_conn_sync = Some(enabled);
        self
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the blob bucket name.
    pub fn bucket_name(mut self, name: impl Into<String>) -> Self {
        self.bucket_name = Some(name.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> MongoResult<ConnectionConfig> {
        let database = self
            .database
            .ok_or_else(|| MongoError::config("database name is required"))?;

        let defaults = ConnectionConfig::default();

        Ok(ConnectionConfig {
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            username: self.username.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
            database,
            url: self.url,
            timeout: self.timeout.unwrap_or(defaults.timeout),
            enabled: self.enabled.unwrap_or(defaults.enabled),
            debug_mode: self.debug_mode.unwrap_or(defaults.debug_mode),
            allow_conn_sync: self.allow_conn_sync.unwrap_or(defaults.allow_conn_sync),
            app_name: self.app_name,
            bucket_name: self.bucket_name.unwrap_or(defaults.bucket_name),
        })
    }
}

/// Timeouts in seconds. Whole values stay integers; fractions are floats.
mod duration_secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if value.subsec_nanos() == 0 {
            serializer.serialize_u64(value.as_secs())
        } else {
            serializer.serialize_f64(value.as_secs_f64())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| D::Error::custom(format!("invalid timeout {}: {}", secs, e)))
    }
}
