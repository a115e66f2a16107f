//! Client configuration.
//!
//! [`StorageOptions`] carries everything needed to construct a client. The four
//! required options are kept as `Option`s so that configuration can be loaded
//! from serde sources or the environment and validated in one place; see
//! [`StorageOptions::validate`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::StorageError;

/// Environment variable holding the secret key.
pub const SECRET_KEY_VAR: &str = "HP_SECRET_KEY";
/// Environment variable holding the account id.
pub const ACCOUNT_ID_VAR: &str = "HP_ACCOUNT_ID";
/// Environment variable holding the tenant id.
pub const TENANT_ID_VAR: &str = "HP_TENANT_ID";
/// Environment variable holding the availability zone.
pub const AVAILABILITY_ZONE_VAR: &str = "HP_AVL_ZONE";
/// Environment variable holding the identity service URI.
pub const AUTH_URI_VAR: &str = "HP_AUTH_URI";
/// Environment variable holding the CDN URI.
pub const CDN_URI_VAR: &str = "HP_CDN_URI";
/// Environment variable selecting the authentication version.
pub const AUTH_VERSION_VAR: &str = "HP_AUTH_VERSION";

/// Which identity flow resolves the client's credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthVersion {
    /// Legacy authentication. Endpoints come from configuration.
    V1,
    /// Control services authentication. Endpoints come from the service catalog.
    #[default]
    V2,
}

impl AuthVersion {
    /// The wire name of this version.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

impl fmt::Display for AuthVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthVersion {
    type Err = StorageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "v1" => Ok(Self::V1),
            "v2" => Ok(Self::V2),
            other => Err(StorageError::Configuration(format!(
                "auth version must be one of [v1, v2], got '{other}'"
            ))),
        }
    }
}

/// Settings for the underlying HTTP connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Total request timeout in seconds
    pub timeout_seconds: Option<u64>,
    /// Connect timeout in seconds
    pub connect_timeout_seconds: Option<u64>,
    /// Headers sent with every request, below the per-request headers
    pub headers: Vec<(String, String)>,
}

impl ConnectionOptions {
    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, seconds: u64) -> Self {
        self.connect_timeout_seconds = Some(seconds);
        self
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Construction options for a storage client.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// Secret key, also the temp URL signing secret (required)
    pub secret_key: Option<String>,
    /// Account id (required)
    pub account_id: Option<String>,
    /// Tenant id (required)
    pub tenant_id: Option<String>,
    /// Availability zone (required)
    pub availability_zone: Option<String>,
    /// Identity service URI. For v1 this is also the storage endpoint.
    pub auth_uri: Option<String>,
    /// Route storage traffic over the service network
    pub use_service_net: bool,
    /// Prefer SSL CDN URLs
    pub cdn_ssl: bool,
    /// CDN endpoint. Only consulted by v1 authentication.
    pub cdn_uri: Option<String>,
    /// Keep idle connections open between requests
    pub persistent: bool,
    /// Connection settings
    pub connection_options: ConnectionOptions,
    /// Authenticate with username/password instead of access keys
    pub use_upass_auth_style: bool,
    /// Identity flow, v2 unless stated otherwise
    pub auth_version: AuthVersion,
    /// User agent reported to the service
    pub user_agent: Option<String>,
}

/// Borrowed view of the required options, available once validation passed.
#[derive(Debug, Clone, Copy)]
pub struct RequiredOptions<'a> {
    /// Secret key
    pub secret_key: &'a str,
    /// Account id
    pub account_id: &'a str,
    /// Tenant id
    pub tenant_id: &'a str,
    /// Availability zone
    pub availability_zone: &'a str,
}

impl StorageOptions {
    /// Create options holding the four required values.
    pub fn new(
        secret_key: impl Into<String>,
        account_id: impl Into<String>,
        tenant_id: impl Into<String>,
        availability_zone: impl Into<String>,
    ) -> Self {
        Self {
            secret_key: Some(secret_key.into()),
            account_id: Some(account_id.into()),
            tenant_id: Some(tenant_id.into()),
            availability_zone: Some(availability_zone.into()),
            ..Default::default()
        }
    }

    /// Read options from `HP_*` environment variables.
    ///
    /// Missing variables are left unset; call [`validate`](Self::validate)
    /// to find out whether the result is usable.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, StorageError> {
        let auth_version = match var(AUTH_VERSION_VAR) {
            Some(version) => version.parse()?,
            None => AuthVersion::default(),
        };

        Ok(Self {
            secret_key: var(SECRET_KEY_VAR),
            account_id: var(ACCOUNT_ID_VAR),
            tenant_id: var(TENANT_ID_VAR),
            availability_zone: var(AVAILABILITY_ZONE_VAR),
            auth_uri: var(AUTH_URI_VAR),
            cdn_uri: var(CDN_URI_VAR),
            auth_version,
            ..Default::default()
        })
    }

    /// Check that every required option is present.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Configuration`] naming all missing options.
    pub fn validate(&self) -> Result<RequiredOptions<'_>, StorageError> {
        match (
            self.secret_key.as_deref(),
            self.account_id.as_deref(),
            self.tenant_id.as_deref(),
            self.availability_zone.as_deref(),
        ) {
            (Some(secret_key), Some(account_id), Some(tenant_id), Some(availability_zone)) => {
                Ok(RequiredOptions {
                    secret_key,
                    account_id,
                    tenant_id,
                    availability_zone,
                })
            }
            _ => {
                let missing: Vec<&str> = [
                    ("secret_key", self.secret_key.is_none()),
                    ("account_id", self.account_id.is_none()),
                    ("tenant_id", self.tenant_id.is_none()),
                    ("availability_zone", self.availability_zone.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();

                Err(StorageError::Configuration(format!(
                    "missing required options: {}",
                    missing.join(", ")
                )))
            }
        }
    }

    /// Set the identity service URI
    pub fn with_auth_uri(mut self, uri: impl Into<String>) -> Self {
        self.auth_uri = Some(uri.into());
        self
    }

    /// Set the CDN URI
    pub fn with_cdn_uri(mut self, uri: impl Into<String>) -> Self {
        self.cdn_uri = Some(uri.into());
        self
    }

    /// Select the identity flow
    pub fn with_auth_version(mut self, version: AuthVersion) -> Self {
        self.auth_version = version;
        self
    }

    /// Keep connections open between requests
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Prefer SSL CDN URLs
    pub fn with_cdn_ssl(mut self, cdn_ssl: bool) -> Self {
        self.cdn_ssl = cdn_ssl;
        self
    }

    /// Route traffic over the service network
    pub fn with_service_net(mut self, use_service_net: bool) -> Self {
        self.use_service_net = use_service_net;
        self
    }

    /// Use username/password authentication
    pub fn with_upass_auth_style(mut self, use_upass_auth_style: bool) -> Self {
        self.use_upass_auth_style = use_upass_auth_style;
        self
    }

    /// Set connection settings
    pub fn with_connection_options(mut self, connection_options: ConnectionOptions) -> Self {
        self.connection_options = connection_options;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

impl fmt::Debug for StorageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageOptions")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("account_id", &self.account_id)
            .field("tenant_id", &self.tenant_id)
            .field("availability_zone", &self.availability_zone)
            .field("auth_uri", &self.auth_uri)
            .field("use_service_net", &self.use_service_net)
            .field("cdn_ssl", &self.cdn_ssl)
            .field("cdn_uri", &self.cdn_uri)
            .field("persistent", &self.persistent)
            .field("connection_options", &self.connection_options)
            .field("use_upass_auth_style", &self.use_upass_auth_style)
            .field("auth_version", &self.auth_version)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
