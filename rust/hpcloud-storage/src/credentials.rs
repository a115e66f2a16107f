//! Credential resolution.
//!
//! A client authenticates exactly once, at construction. Two flows exist:
//!
//! - [`AuthScheme::Catalog`] (v2): the identity service returns a service
//!   catalog entry with the storage endpoint, the CDN endpoint if there is
//!   one, and a bearer token.
//! - [`AuthScheme::Legacy`] (v1): the identity service only hands out the
//!   token; storage and CDN endpoints come from configuration.
//!
//! Both flows produce the same [`Credentials`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::StorageError;
use crate::error::BoxError;
use crate::options::{AuthVersion, ConnectionOptions, RequiredOptions, StorageOptions};

/// Service type requested from the identity service catalog.
pub const SERVICE_TYPE: &str = "Object Storage";

/// The result of authentication. Immutable for the lifetime of a client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    endpoint_url: String,
    cdn_endpoint_url: Option<String>,
    auth_token: String,
}

impl Credentials {
    /// Create credentials directly, bypassing the identity service.
    pub fn new(
        endpoint_url: impl Into<String>,
        cdn_endpoint_url: Option<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            cdn_endpoint_url,
            auth_token: auth_token.into(),
        }
    }

    /// The storage endpoint URL.
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// The CDN endpoint URL, if any.
    pub fn cdn_endpoint_url(&self) -> Option<&str> {
        self.cdn_endpoint_url.as_deref()
    }

    /// The bearer token sent as `X-Auth-Token`.
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint_url", &self.endpoint_url)
            .field("cdn_endpoint_url", &self.cdn_endpoint_url)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// What an identity service call returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Storage endpoint from the service catalog
    pub endpoint_url: Option<String>,
    /// CDN endpoint from the service catalog
    pub cdn_endpoint_url: Option<String>,
    /// Bearer token
    pub auth_token: Option<String>,
}

/// Parameters of an identity service call.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    /// Validated required options
    pub required: RequiredOptions<'a>,
    /// Full options, for the optional settings
    pub options: &'a StorageOptions,
    /// Service type to look up in the catalog
    pub service_type: &'static str,
}

impl AuthRequest<'_> {
    /// Connection settings to use for the identity call.
    pub fn connection_options(&self) -> &ConnectionOptions {
        &self.options.connection_options
    }
}

/// The external identity service.
///
/// Implementations perform the wire-level authentication. Failures are
/// reported as is and never retried.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Legacy authentication. Endpoints in the result are ignored.
    async fn authenticate_v1(&self, request: &AuthRequest<'_>) -> Result<Identity, BoxError>;

    /// Catalog authentication.
    async fn authenticate_v2(&self, request: &AuthRequest<'_>) -> Result<Identity, BoxError>;
}

/// The authentication flow, decided once from the options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// v2: endpoints come from the service catalog.
    Catalog,
    /// v1: endpoints come from configuration.
    Legacy {
        /// Storage endpoint, taken from the auth URI option
        storage_uri: String,
        /// CDN endpoint, taken from the CDN URI option
        cdn_uri: Option<String>,
    },
}

impl AuthScheme {
    /// Decide the flow for `options`.
    ///
    /// # Errors
    ///
    /// Legacy authentication without an auth URI is a configuration error,
    /// since that URI doubles as the storage endpoint.
    pub fn from_options(options: &StorageOptions) -> Result<Self, StorageError> {
        match options.auth_version {
            AuthVersion::V2 => Ok(Self::Catalog),
            AuthVersion::V1 => {
                let storage_uri = options.auth_uri.clone().ok_or_else(|| {
                    StorageError::Configuration(
                        "auth_uri is required for v1 authentication".into(),
                    )
                })?;
                Ok(Self::Legacy {
                    storage_uri,
                    cdn_uri: options.cdn_uri.clone(),
                })
            }
        }
    }
}

/// Resolves options into [`Credentials`] through an [`IdentityService`].
#[derive(Debug, Clone)]
pub struct CredentialResolver<I> {
    identity: I,
}

impl<I: IdentityService> CredentialResolver<I> {
    /// Create a resolver using `identity`.
    pub fn new(identity: I) -> Self {
        Self { identity }
    }

    /// Authenticate once and normalize the result.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Configuration`] when required options are missing.
    /// - [`StorageError::Authentication`] when the identity call fails or
    ///   its result lacks a token or, for v2, a storage endpoint.
    pub async fn resolve(&self, options: &StorageOptions) -> Result<Credentials, StorageError> {
        let required = options.validate()?;
        let scheme = AuthScheme::from_options(options)?;
        let request = AuthRequest {
            required,
            options,
            service_type: SERVICE_TYPE,
        };

        debug!(
            account_id = required.account_id,
            tenant_id = required.tenant_id,
            auth_version = %options.auth_version,
            "Authenticating with identity service"
        );

        let credentials = match scheme {
            AuthScheme::Catalog => {
                let identity = self
                    .identity
                    .authenticate_v2(&request)
                    .await
                    .map_err(StorageError::Authentication)?;
                let endpoint_url = identity.endpoint_url.ok_or_else(|| {
                    StorageError::authentication(format!(
                        "service catalog has no {SERVICE_TYPE} endpoint"
                    ))
                })?;
                Credentials {
                    endpoint_url,
                    cdn_endpoint_url: identity.cdn_endpoint_url,
                    auth_token: require_token(identity.auth_token)?,
                }
            }
            AuthScheme::Legacy {
                storage_uri,
                cdn_uri,
            } => {
                let identity = self
                    .identity
                    .authenticate_v1(&request)
                    .await
                    .map_err(StorageError::Authentication)?;
                Credentials {
                    endpoint_url: storage_uri,
                    cdn_endpoint_url: cdn_uri,
                    auth_token: require_token(identity.auth_token)?,
                }
            }
        };

        debug!(
            endpoint_url = credentials.endpoint_url(),
            cdn = credentials.cdn_endpoint_url().is_some(),
            "Resolved storage credentials"
        );

        Ok(credentials)
    }
}

fn require_token(token: Option<String>) -> Result<String, StorageError> {
    token.ok_or_else(|| StorageError::authentication("identity service returned no auth token"))
}

#[async_trait]
impl<T: IdentityService + ?Sized> IdentityService for &T {
    async fn authenticate_v1(&self, request: &AuthRequest<'_>) -> Result<Identity, BoxError> {
        (**self).authenticate_v1(request).await
    }

    async fn authenticate_v2(&self, request: &AuthRequest<'_>) -> Result<Identity, BoxError> {
        (**self).authenticate_v2(request).await
    }
}
