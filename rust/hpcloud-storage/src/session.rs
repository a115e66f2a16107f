//! The connection target derived from the resolved storage endpoint.

use url::Url;

use crate::StorageError;
use crate::options::ConnectionOptions;

/// A storage endpoint split into the parts used to build request and
/// temporary URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    /// Parse an endpoint URL such as `https://objects.example.com/v1/12345`.
    ///
    /// The port falls back to the scheme default. A bare `/` path is treated
    /// as no path, so joined paths never start with `//`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidEndpoint`] if the URL does not parse or
    /// has no host or port.
    pub fn parse(endpoint: &str) -> Result<Self, StorageError> {
        let url = Url::parse(endpoint)
            .map_err(|e| StorageError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

        let host = url
            .host_str()
            .ok_or_else(|| StorageError::InvalidEndpoint(format!("{endpoint}: missing host")))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| StorageError::InvalidEndpoint(format!("{endpoint}: missing port")))?;
        let path = match url.path() {
            "/" => String::new(),
            path => path.to_string(),
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port,
            path,
        })
    }

    /// URL scheme, e.g. `https`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port, explicit or the scheme default.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base path, without a trailing `/` when empty.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `{scheme}://{host}:{port}`
    pub fn origin(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// `{scheme}://{host}:{port}{path}`
    pub fn url(&self) -> String {
        format!("{}{}", self.origin(), self.path)
    }
}

/// Everything the dispatcher needs to reach the storage service.
///
/// Built once from the resolved credentials and never modified.
#[derive(Debug, Clone)]
pub struct Session {
    endpoint: Endpoint,
    persistent: bool,
    connection_options: ConnectionOptions,
}

impl Session {
    /// Derive a session from the storage endpoint URL.
    pub fn new(
        endpoint_url: &str,
        persistent: bool,
        connection_options: ConnectionOptions,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            endpoint: Endpoint::parse(endpoint_url)?,
            persistent,
            connection_options,
        })
    }

    /// The storage endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether idle connections are kept open.
    pub fn persistent(&self) -> bool {
        self.persistent
    }

    /// Connection settings.
    pub fn connection_options(&self) -> &ConnectionOptions {
        &self.connection_options
    }

    /// Full request path for a path relative to the endpoint.
    pub fn path_for(&self, relative: &str) -> String {
        format!("{}/{}", self.endpoint.path, relative)
    }
}
